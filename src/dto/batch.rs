//! Payloads of archive ingestion and validation.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dto::item::QuizItemResponse;

/// Multipart form carrying a zip archive with a `manifest.csv`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchArchiveForm {
    /// Zip archive.
    #[schema(value_type = String, format = Binary)]
    pub archive: Vec<u8>,
    /// Day used for rows without their own date; ignored by validation.
    pub quiz_date: Option<String>,
}

/// Manifest row that was not ingested.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedRow {
    /// 1-based data row number (the header is row 0).
    pub row: usize,
    /// File name as written in the manifest.
    pub filename: String,
    /// Why the row was left out.
    pub reason: String,
}

/// Manifest row whose upload or insert failed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedRow {
    /// 1-based data row number.
    pub row: usize,
    /// File name as written in the manifest.
    pub filename: String,
    /// Failure of the archive read, image check, upload or insert.
    pub error: String,
}

/// Outcome of an ingestion. Created items stay even when other rows failed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchIngestResponse {
    /// Number of items created.
    pub created: usize,
    /// Items created, in manifest order.
    pub items: Vec<QuizItemResponse>,
    /// Rows left out, with the reason.
    pub skipped: Vec<SkippedRow>,
    /// Rows that resolved but could not be stored.
    pub failed: Vec<FailedRow>,
    /// Set when the deadline elapsed; rows after the last reported one were not handled.
    pub timed_out: bool,
}

/// Normalised manifest row, as previewed by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRowPreview {
    /// Path of the image inside the archive.
    pub filename: String,
    /// Answer title.
    pub title: String,
    /// External anime identifier.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: Option<String>,
    /// Day of the row as written.
    pub quiz_date: Option<String>,
}

/// Dry-run report of an archive.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchValidateResponse {
    /// Number of manifest rows.
    pub total: usize,
    /// Rows whose file exists in the archive.
    pub ok: usize,
    /// File names referenced by the manifest but absent from the archive (first 100).
    pub missing: Vec<String>,
    /// First rows of the manifest (up to 10).
    pub sample: Vec<ManifestRowPreview>,
}

/// Query of the sample archive download.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SampleArchiveQuery {
    /// Date written in the sample rows; defaults to today.
    pub date: Option<String>,
}
