//! Archive ingestion: a zip carrying images plus a `manifest.csv` describing them.
//!
//! Each manifest row is its own unit of work; a failing row is reported and the
//! following rows still run. Validation reads the same archive without writing.

use std::{
    collections::HashMap,
    io::{Cursor, Read, Write},
    time::SystemTime,
};

use csv::{ReaderBuilder, StringRecord, Trim};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::FileOptions};

use crate::{
    dao::models::QuizItemEntity,
    dto::{
        batch::{BatchIngestResponse, BatchValidateResponse, FailedRow, ManifestRowPreview, SkippedRow},
        item::QuizItemResponse,
    },
    error::ServiceError,
    quiz_date::QuizDate,
    services::uploads::{UploadedFile, check_image, discard_files, store_file},
    state::SharedState,
};

const MANIFEST_SUFFIX: &str = "manifest.csv";
const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;
const MISSING_REPORT_LIMIT: usize = 100;
const SAMPLE_ROWS: usize = 10;

const FILENAME_COLUMNS: &[&str] = &["filename", "file", "image"];
const TITLE_COLUMNS: &[&str] = &["title"];
const ANIME_ID_COLUMNS: &[&str] = &["animeId", "anime_id"];
const SOURCE_ID_COLUMNS: &[&str] = &["sourceId", "source_id"];
const QUIZ_DATE_COLUMNS: &[&str] = &["quizDate", "quiz_date"];

/// One data row of a manifest, with every column already trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRow {
    /// Path of the image inside the archive; only its basename is matched.
    pub filename: String,
    /// Answer title.
    pub title: String,
    /// External anime identifier.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: Option<String>,
    /// Raw day of the row, parsed leniently at ingestion.
    pub quiz_date: Option<String>,
}

impl ManifestRow {
    /// Last path segment of the referenced file.
    fn basename(&self) -> &str {
        basename(&self.filename)
    }

    fn is_complete(&self) -> bool {
        !self.filename.is_empty() && !self.title.is_empty() && !self.anime_id.is_empty()
    }

    fn preview(&self) -> ManifestRowPreview {
        ManifestRowPreview {
            filename: self.filename.clone(),
            title: self.title.clone(),
            anime_id: self.anime_id.clone(),
            source_id: self.source_id.clone(),
            quiz_date: self.quiz_date.clone(),
        }
    }
}

/// Column positions of a manifest header, resolved through the accepted aliases.
struct ManifestColumns {
    filename: Option<usize>,
    title: Option<usize>,
    anime_id: Option<usize>,
    source_id: Option<usize>,
    quiz_date: Option<usize>,
}

impl ManifestColumns {
    fn resolve(header: &StringRecord) -> Self {
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| header.iter().position(|column| column == *alias))
        };
        Self {
            filename: find(FILENAME_COLUMNS),
            title: find(TITLE_COLUMNS),
            anime_id: find(ANIME_ID_COLUMNS),
            source_id: find(SOURCE_ID_COLUMNS),
            quiz_date: find(QUIZ_DATE_COLUMNS),
        }
    }

    fn row(&self, record: &StringRecord) -> ManifestRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|idx| record.get(idx))
                .map(str::trim)
                .unwrap_or_default()
                .to_owned()
        };
        let optional = |idx: Option<usize>| Some(cell(idx)).filter(|value| !value.is_empty());
        ManifestRow {
            filename: cell(self.filename),
            title: cell(self.title),
            anime_id: cell(self.anime_id),
            source_id: optional(self.source_id),
            quiz_date: optional(self.quiz_date),
        }
    }
}

/// Parse manifest text. Blank lines are ignored and `;` is accepted as a delimiter.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestRow>, ServiceError> {
    let normalized = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.replace(';', ","))
        .collect::<Vec<_>>()
        .join("\n");
    if normalized.is_empty() {
        return Err(ServiceError::InvalidInput("manifest.csv is empty".into()));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(normalized.as_bytes());
    let header = reader
        .headers()
        .map_err(|err| ServiceError::InvalidInput(format!("unreadable manifest header: {err}")))?
        .clone();
    let columns = ManifestColumns::resolve(&header);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|err| ServiceError::InvalidInput(format!("unreadable manifest row: {err}")))?;
        rows.push(columns.row(&record));
    }

    if rows.is_empty() {
        return Err(ServiceError::InvalidInput("manifest.csv has no rows".into()));
    }
    Ok(rows)
}

/// In-memory zip archive indexed by entry basename.
struct BatchArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    by_basename: HashMap<String, usize>,
    manifest: usize,
}

impl BatchArchive {
    fn open(bytes: Vec<u8>) -> Result<Self, ServiceError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(invalid_archive)?;

        let mut by_basename = HashMap::new();
        let mut manifest = None;
        for idx in 0..zip.len() {
            let entry = zip.by_index(idx).map_err(invalid_archive)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_owned();
            if manifest.is_none() && name.to_ascii_lowercase().ends_with(MANIFEST_SUFFIX) {
                manifest = Some(idx);
            }
            by_basename.entry(basename(&name).to_owned()).or_insert(idx);
        }

        let manifest = manifest.ok_or_else(|| {
            ServiceError::InvalidInput("manifest.csv not found in archive".into())
        })?;
        Ok(Self {
            zip,
            by_basename,
            manifest,
        })
    }

    fn manifest_rows(&mut self) -> Result<Vec<ManifestRow>, ServiceError> {
        let bytes = self.read(self.manifest, MAX_MANIFEST_BYTES)?;
        let text = String::from_utf8_lossy(&bytes);
        parse_manifest(text.trim_start_matches('\u{feff}'))
    }

    fn contains(&self, basename: &str) -> bool {
        self.by_basename.contains_key(basename)
    }

    /// Bytes of the entry whose basename is `basename`, if any.
    fn file(&mut self, basename: &str, max_bytes: u64) -> Result<Option<Vec<u8>>, ServiceError> {
        match self.by_basename.get(basename).copied() {
            Some(idx) => self.read(idx, max_bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Decompress one entry, refusing more than `max_bytes` whatever its header declares.
    fn read(&mut self, idx: usize, max_bytes: u64) -> Result<Vec<u8>, ServiceError> {
        let entry = self.zip.by_index(idx).map_err(invalid_archive)?;
        let hint = usize::try_from(entry.size().min(max_bytes)).unwrap_or(0);
        let mut bytes = Vec::with_capacity(hint);
        entry
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| ServiceError::InvalidInput(format!("corrupt archive entry: {err}")))?;
        if bytes.len() as u64 > max_bytes {
            return Err(ServiceError::InvalidInput(format!(
                "archive entry exceeds {max_bytes} bytes"
            )));
        }
        Ok(bytes)
    }
}

fn invalid_archive(err: ZipError) -> ServiceError {
    ServiceError::InvalidInput(format!("archive is not a readable zip: {err}"))
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn ensure_row_bound(rows: &[ManifestRow], max_rows: usize) -> Result<(), ServiceError> {
    if rows.len() > max_rows {
        return Err(ServiceError::InvalidInput(format!(
            "manifest has {} rows, at most {max_rows} are accepted",
            rows.len()
        )));
    }
    Ok(())
}

/// Report which manifest rows resolve to a file, without writing anything.
pub fn validate_archive(bytes: Vec<u8>, max_rows: usize) -> Result<BatchValidateResponse, ServiceError> {
    let mut archive = BatchArchive::open(bytes)?;
    let rows = archive.manifest_rows()?;
    ensure_row_bound(&rows, max_rows)?;

    let mut ok = 0;
    let mut missing = Vec::new();
    for row in &rows {
        if !row.filename.is_empty() && archive.contains(row.basename()) {
            ok += 1;
        } else if missing.len() < MISSING_REPORT_LIMIT {
            missing.push(if row.filename.is_empty() {
                "(empty)".to_owned()
            } else {
                row.filename.clone()
            });
        }
    }

    Ok(BatchValidateResponse {
        total: rows.len(),
        ok,
        missing,
        sample: rows.iter().take(SAMPLE_ROWS).map(ManifestRow::preview).collect(),
    })
}

#[derive(Default)]
struct BatchReport {
    items: Vec<QuizItemEntity>,
    skipped: Vec<SkippedRow>,
    failed: Vec<FailedRow>,
}

/// Ingest every resolvable manifest row of `bytes` as a quiz item.
///
/// Rows fall back to `default_quiz_date`, then to today, for their day. The whole run is
/// bounded by the configured deadline: when it elapses the rows handled so far are
/// reported with `timed_out` set and the remaining rows are left untouched.
pub async fn ingest_archive(
    state: &SharedState,
    owner_id: &str,
    bytes: Vec<u8>,
    default_quiz_date: Option<String>,
) -> Result<BatchIngestResponse, ServiceError> {
    let limits = state.config().batch;
    let mut archive = BatchArchive::open(bytes)?;
    let rows = archive.manifest_rows()?;
    ensure_row_bound(&rows, limits.max_rows)?;
    let store = state.require_quiz_store().await?;

    let default_quiz_date = default_quiz_date
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty());
    let max_image_bytes = state.config().max_image_bytes;
    let max_entry_bytes = u64::try_from(max_image_bytes).unwrap_or(u64::MAX);
    let mut report = BatchReport::default();

    let run = async {
        for (idx, row) in rows.into_iter().enumerate() {
            let row_number = idx + 1;
            if !row.is_complete() {
                report.skipped.push(SkippedRow {
                    row: row_number,
                    filename: row.filename,
                    reason: "filename, title and animeId are required".into(),
                });
                continue;
            }
            let bytes = match archive.file(row.basename(), max_entry_bytes) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    report.skipped.push(SkippedRow {
                        row: row_number,
                        filename: row.filename,
                        reason: "file not found in archive".into(),
                    });
                    continue;
                }
                Err(err) => {
                    warn!(row = row_number, error = %err, "batch row entry unreadable");
                    report.failed.push(FailedRow {
                        row: row_number,
                        filename: row.filename,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let upload = UploadedFile::new(row.basename(), bytes);
            if let Err(err) = check_image("image", &upload, max_image_bytes) {
                report.failed.push(FailedRow {
                    row: row_number,
                    filename: row.filename,
                    error: err.to_string(),
                });
                continue;
            }
            let image_ref = match store_file(state, upload).await {
                Ok(reference) => reference,
                Err(err) => {
                    warn!(row = row_number, error = %err, "batch row upload failed");
                    report.failed.push(FailedRow {
                        row: row_number,
                        filename: row.filename,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let quiz_date = QuizDate::parse_or_today(
                row.quiz_date.as_deref().or(default_quiz_date.as_deref()),
            );
            let item = QuizItemEntity {
                id: Uuid::new_v4(),
                owner_id: owner_id.to_owned(),
                image_ref: image_ref.clone(),
                title: row.title,
                anime_id: row.anime_id,
                source_id: row.source_id,
                quiz_date,
                hint1_ref: None,
                hint2_ref: None,
                created_at: SystemTime::now(),
            };
            match store.insert_item(item.clone()).await {
                Ok(()) => {
                    debug!(row = row_number, item_id = %item.id, "batch row ingested");
                    report.items.push(item);
                }
                Err(err) => {
                    warn!(row = row_number, error = %err, "batch row insert failed");
                    discard_files(state, vec![image_ref]).await;
                    report.failed.push(FailedRow {
                        row: row_number,
                        filename: row.filename,
                        error: err.to_string(),
                    });
                }
            }
        }
    };
    let timed_out = timeout(limits.deadline, run).await.is_err();

    if !report.items.is_empty() {
        state.cache().flush();
    }
    if timed_out {
        let created: Vec<String> = report.items.iter().map(|item| item.id.to_string()).collect();
        warn!(
            created = ?created,
            deadline_secs = limits.deadline.as_secs(),
            "batch ingestion exceeded its deadline; returning partial report"
        );
    } else {
        info!(
            created = report.items.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch ingested"
        );
    }

    Ok(BatchIngestResponse {
        created: report.items.len(),
        items: report.items.into_iter().map(QuizItemResponse::from).collect(),
        skipped: report.skipped,
        failed: report.failed,
        timed_out,
    })
}

/// Example archive with a two-row manifest dated `date` (today when absent or malformed).
pub fn sample_archive(date: Option<&str>) -> Result<Vec<u8>, ServiceError> {
    let date = QuizDate::parse_or_today(date);
    let manifest = [
        "filename,title,animeId,sourceId,quizDate".to_owned(),
        format!("01.jpg,Fullmetal Alchemist,12345,shikimori,{date}"),
        format!("02.png,Naruto,20,anilist,{date}"),
    ]
    .join("\n");
    let readme = "Add your own images 01.jpg and 02.png and update manifest.csv. \
                  Rows may use different dates.";

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let build = |writer: &mut ZipWriter<Cursor<Vec<u8>>>| -> Result<(), ZipError> {
        writer.start_file("manifest.csv", options)?;
        writer.write_all(manifest.as_bytes())?;
        writer.start_file("README.txt", options)?;
        writer.write_all(readme.as_bytes())?;
        Ok(())
    };
    build(&mut writer)
        .and_then(|()| writer.finish())
        .map(Cursor::into_inner)
        .map_err(|err| ServiceError::Internal(format!("failed to build sample archive: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn header_aliases_and_semicolons_are_accepted() {
        let rows = parse_manifest(
            "file;title;anime_id;source_id;quiz_date\r\n\r\n  imgs/01.jpg ; Naruto ; 20 ; ; 2024-01-07 \n",
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![ManifestRow {
                filename: "imgs/01.jpg".into(),
                title: "Naruto".into(),
                anime_id: "20".into(),
                source_id: None,
                quiz_date: Some("2024-01-07".into()),
            }]
        );
        assert_eq!(rows[0].basename(), "01.jpg");
    }

    #[test]
    fn short_rows_leave_missing_columns_empty() {
        let rows = parse_manifest("filename,title,animeId\n01.jpg,Naruto").unwrap();
        assert_eq!(rows[0].anime_id, "");
        assert!(!rows[0].is_complete());
    }

    #[test]
    fn empty_manifests_are_rejected() {
        assert!(parse_manifest("  \n\n").is_err());
        assert!(parse_manifest("filename,title,animeId\n").is_err());
    }

    #[test]
    fn manifest_is_found_in_any_directory_and_case() {
        let bytes = archive(&[
            ("pack/Manifest.CSV", b"filename,title,animeId\n01.jpg,Naruto,20\n02.jpg,Bleach,21"),
            ("pack/images/01.jpg", b"jpg"),
        ]);
        let report = validate_archive(bytes, 500).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.ok, 1);
        assert_eq!(report.missing, vec!["02.jpg".to_owned()]);
        assert_eq!(report.sample.len(), 2);
    }

    #[test]
    fn validation_reports_missing_files_and_empty_names() {
        let mut manifest = String::from("filename,title,animeId\n");
        for n in 1..=10 {
            manifest.push_str(&format!("{n:02}.jpg,Title {n},{n}\n"));
        }
        manifest.push_str(",No file,99\n");
        let mut files: Vec<(String, Vec<u8>)> = (1..=8)
            .map(|n| (format!("{n:02}.jpg"), vec![n as u8]))
            .collect();
        files.push(("manifest.csv".into(), manifest.into_bytes()));
        let entries: Vec<(&str, &[u8])> = files
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
            .collect();

        let report = validate_archive(archive(&entries), 500).unwrap();
        assert_eq!(report.total, 11);
        assert_eq!(report.ok, 8);
        assert_eq!(report.missing, vec!["09.jpg", "10.jpg", "(empty)"]);
        assert_eq!(report.sample.len(), SAMPLE_ROWS);
    }

    #[test]
    fn archives_without_manifest_or_over_the_bound_are_rejected() {
        assert!(matches!(
            validate_archive(archive(&[("01.jpg", b"x")]), 500),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(validate_archive(b"not a zip".to_vec(), 500).is_err());

        let bytes = archive(&[(
            "manifest.csv",
            b"filename,title,animeId\n01.jpg,A,1\n02.jpg,B,2\n03.jpg,C,3",
        )]);
        assert!(validate_archive(bytes, 2).is_err());
    }

    #[test]
    fn entries_larger_than_the_cap_are_refused() {
        let bytes = archive(&[
            ("manifest.csv", b"filename,title,animeId\nbig.jpg,A,1"),
            ("big.jpg", &[7u8; 64]),
        ]);
        let mut archive = BatchArchive::open(bytes).unwrap();

        assert!(matches!(
            archive.file("big.jpg", 63),
            Err(ServiceError::InvalidInput(message)) if message.contains("exceeds 63 bytes")
        ));
        assert_eq!(archive.file("big.jpg", 64).unwrap().map(|b| b.len()), Some(64));
        assert_eq!(archive.file("absent.jpg", 64).unwrap(), None);
    }

    #[test]
    fn sample_archive_round_trips_through_validation() {
        let bytes = sample_archive(Some("2024-01-07")).unwrap();
        let mut archive = BatchArchive::open(bytes).unwrap();
        let rows = archive.manifest_rows().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Fullmetal Alchemist");
        assert_eq!(rows[1].source_id.as_deref(), Some("anilist"));
        assert!(rows.iter().all(|r| r.quiz_date.as_deref() == Some("2024-01-07")));
        assert!(archive.contains("README.txt"));
    }
}
