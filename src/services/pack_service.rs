//! Daily pack administration and listing: atomic replacement of a day's four items,
//! single uploads, deletions and the paginated, cached pack listing.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::QuizItemEntity,
    dto::item::{
        DeleteResponse, ItemListQuery, ItemListResponse, Pagination, QuizItemResponse,
        ReplacePackResponse,
    },
    error::ServiceError,
    quiz_date::QuizDate,
    services::{
        optional_date,
        uploads::{UploadedFile, check_image, discard_files, store_file},
    },
    state::SharedState,
};

/// Number of items in a daily pack.
pub const PACK_SIZE: usize = 4;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;
const MANUAL_SOURCE: &str = "manual";

/// One of the four slots of a pack replacement.
#[derive(Debug, Clone, Default)]
pub struct PackSlot {
    /// Main image; required.
    pub image: Option<UploadedFile>,
    /// Expected answer; required.
    pub title: String,
    /// External id; derived from the title when absent.
    pub anime_id: Option<String>,
    /// Catalogue name; `manual` when absent.
    pub source_id: Option<String>,
    /// First optional hint image.
    pub hint1: Option<UploadedFile>,
    /// Second optional hint image.
    pub hint2: Option<UploadedFile>,
}

/// Fully parsed pack replacement request.
#[derive(Debug, Clone, Default)]
pub struct ReplacePackInput {
    /// Targeted day, `YYYY-MM-DD`.
    pub quiz_date: String,
    /// Exactly four slots, in display order.
    pub slots: Vec<PackSlot>,
}

/// Single item upload outside of a pack replacement.
#[derive(Debug, Clone, Default)]
pub struct UploadItemInput {
    /// Main image; required.
    pub image: Option<UploadedFile>,
    /// Expected answer; required.
    pub title: String,
    /// External id; required.
    pub anime_id: String,
    /// Catalogue name; `manual` when absent.
    pub source_id: Option<String>,
    /// Day of the item; today when absent or malformed.
    pub quiz_date: Option<String>,
}

/// Check a replacement before any I/O and return the targeted day.
pub fn validate_pack(input: &ReplacePackInput, max_image_bytes: usize) -> Result<QuizDate, ServiceError> {
    let quiz_date = QuizDate::parse(input.quiz_date.trim())
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    if input.slots.len() != PACK_SIZE {
        return Err(ServiceError::InvalidInput(format!(
            "a pack needs exactly {PACK_SIZE} items, got {}",
            input.slots.len()
        )));
    }

    for (idx, slot) in input.slots.iter().enumerate() {
        let n = idx + 1;
        let image = slot
            .image
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidInput(format!("image{n} is required")))?;
        check_image(&format!("image{n}"), image, max_image_bytes)?;
        if slot.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput(format!("title{n} is required")));
        }
        if let Some(hint) = &slot.hint1 {
            check_image(&format!("hint1_{n}"), hint, max_image_bytes)?;
        }
        if let Some(hint) = &slot.hint2 {
            check_image(&format!("hint2_{n}"), hint, max_image_bytes)?;
        }
    }

    Ok(quiz_date)
}

/// Replace every item of the requested day with the four supplied slots.
///
/// Same-day replacements are serialized; readers see either the previous pack or the new one.
pub async fn replace_pack(
    state: &SharedState,
    owner_id: &str,
    input: ReplacePackInput,
) -> Result<ReplacePackResponse, ServiceError> {
    let quiz_date = validate_pack(&input, state.config().max_image_bytes)?;
    let store = state.require_quiz_store().await?;

    let _guard = state.pack_locks().lock(quiz_date).await;
    debug!(%quiz_date, "pack lock acquired");

    let mut stored = Vec::new();
    let mut items = Vec::with_capacity(PACK_SIZE);
    for slot in input.slots {
        match store_slot(state, owner_id, quiz_date, slot, &mut stored).await {
            Ok(item) => items.push(item),
            Err(err) => {
                discard_files(state, stored).await;
                return Err(err);
            }
        }
    }

    let removed = match store.replace_pack(quiz_date, items.clone()).await {
        Ok(removed) => removed,
        Err(err) => {
            warn!(%quiz_date, error = %err, "pack replacement rolled back");
            discard_files(state, stored).await;
            return Err(err.into());
        }
    };

    state.cache().flush();
    info!(%quiz_date, removed, created = items.len(), "pack replaced");

    Ok(ReplacePackResponse {
        success: true,
        created: items.len(),
        items: items.into_iter().map(QuizItemResponse::from).collect(),
        quiz_date,
    })
}

async fn store_slot(
    state: &SharedState,
    owner_id: &str,
    quiz_date: QuizDate,
    slot: PackSlot,
    stored: &mut Vec<String>,
) -> Result<QuizItemEntity, ServiceError> {
    let title = slot.title.trim().to_owned();
    let image = slot
        .image
        .ok_or_else(|| ServiceError::InvalidInput("image is required".into()))?;

    let image_ref = store_file(state, image).await?;
    stored.push(image_ref.clone());
    let hint1_ref = match slot.hint1 {
        Some(hint) => {
            let reference = store_file(state, hint).await?;
            stored.push(reference.clone());
            Some(reference)
        }
        None => None,
    };
    let hint2_ref = match slot.hint2 {
        Some(hint) => {
            let reference = store_file(state, hint).await?;
            stored.push(reference.clone());
            Some(reference)
        }
        None => None,
    };

    let created_at = SystemTime::now();
    let anime_id = non_empty(slot.anime_id).unwrap_or_else(|| manual_anime_id(&title, created_at));
    let source_id = non_empty(slot.source_id).unwrap_or_else(|| MANUAL_SOURCE.to_owned());

    Ok(QuizItemEntity {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_owned(),
        image_ref,
        title,
        anime_id,
        source_id: Some(source_id),
        quiz_date,
        hint1_ref,
        hint2_ref,
        created_at,
    })
}

/// Upload a single item into a day without touching the rest of its pack.
pub async fn upload_item(
    state: &SharedState,
    owner_id: &str,
    input: UploadItemInput,
) -> Result<QuizItemResponse, ServiceError> {
    let title = input.title.trim().to_owned();
    let anime_id = input.anime_id.trim().to_owned();
    if title.is_empty() {
        return Err(ServiceError::InvalidInput("title is required".into()));
    }
    if anime_id.is_empty() {
        return Err(ServiceError::InvalidInput("animeId is required".into()));
    }
    let image = input
        .image
        .ok_or_else(|| ServiceError::InvalidInput("image is required".into()))?;
    check_image("image", &image, state.config().max_image_bytes)?;

    let store = state.require_quiz_store().await?;
    let image_ref = store_file(state, image).await?;

    let item = QuizItemEntity {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_owned(),
        image_ref: image_ref.clone(),
        title,
        anime_id,
        source_id: non_empty(input.source_id),
        quiz_date: QuizDate::parse_or_today(input.quiz_date.as_deref()),
        hint1_ref: None,
        hint2_ref: None,
        created_at: SystemTime::now(),
    };

    if let Err(err) = store.insert_item(item.clone()).await {
        discard_files(state, vec![image_ref]).await;
        return Err(err.into());
    }

    state.cache().flush();
    info!(item_id = %item.id, quiz_date = %item.quiz_date, "quiz item uploaded");
    Ok(item.into())
}

/// Delete one item, its ledger rows and its stored images.
pub async fn delete_item(state: &SharedState, id: Uuid) -> Result<DeleteResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(item) = store.find_item(id).await? else {
        return Err(ServiceError::NotFound(format!("quiz item `{id}` not found")));
    };

    if !store.delete_item(id).await? {
        return Err(ServiceError::NotFound(format!("quiz item `{id}` not found")));
    }
    state.cache().flush();
    info!(item_id = %id, quiz_date = %item.quiz_date, "quiz item deleted");

    let references = std::iter::once(item.image_ref)
        .chain(item.hint1_ref)
        .chain(item.hint2_ref)
        .collect();
    discard_files(state, references).await;

    Ok(DeleteResponse {
        success: true,
        deleted: id,
    })
}

/// One page of a day's items.
///
/// Without an explicit date the listing targets today and falls back to the latest day
/// that has items.
pub async fn list_items(
    state: &SharedState,
    query: ItemListQuery,
) -> Result<ItemListResponse, ServiceError> {
    let requested = optional_date(query.date.as_deref())?;
    let limit = clamp_limit(query.limit);
    let page = query.page.unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;

    let today = QuizDate::today();
    let key = match requested {
        Some(date) => format!("items:{date}:{page}:{limit}"),
        None => format!("items:auto-{today}:{page}:{limit}"),
    };
    let ttl = state.config().cache.volatile;

    state
        .cache()
        .get_or_try_insert_with(&key, ttl, || async {
            let store = state.require_quiz_store().await?;

            let mut quiz_date = requested.unwrap_or(today);
            let mut total = store.count_items(quiz_date).await?;
            if total == 0
                && requested.is_none()
                && let Some(latest) = store.latest_quiz_date().await?
            {
                quiz_date = latest;
                total = store.count_items(quiz_date).await?;
            }

            let offset = u64::from(page - 1) * u64::from(limit);
            let entities = store.list_items(quiz_date, limit, offset).await?;
            let mut guessers = store
                .guessers(entities.iter().map(|item| item.id).collect())
                .await?;
            let items = entities
                .into_iter()
                .map(|item| {
                    let guessed_by = guessers.remove(&item.id).unwrap_or_default();
                    QuizItemResponse::from_entity(item, guessed_by)
                })
                .collect();

            Ok::<_, ServiceError>(ItemListResponse {
                items,
                pagination: Pagination {
                    page,
                    limit,
                    total,
                    total_pages: total.div_ceil(u64::from(limit)).max(1),
                },
                quiz_date,
            })
        })
        .await
}

/// Days that have at least one item, most recent first.
pub async fn list_dates(state: &SharedState) -> Result<Vec<QuizDate>, ServiceError> {
    let store = state.require_quiz_store().await?;
    Ok(store.list_dates().await?)
}

/// Page size requested by a client, clamped to the accepted range.
pub fn clamp_limit(limit: Option<i64>) -> u32 {
    match limit {
        Some(value) if value > 0 => value.min(i64::from(MAX_PAGE_SIZE)) as u32,
        _ => DEFAULT_PAGE_SIZE,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// External id for items created without one: `manual-<slug>-<millis>`.
fn manual_anime_id(title: &str, at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("manual-{}-{millis}", slug(title))
}

/// Lowercase `title` and collapse every run of characters outside `[a-z0-9]` into `-`.
fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_gap = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn slot(n: usize) -> PackSlot {
        PackSlot {
            image: Some(UploadedFile::new(format!("{n:02}.jpg"), vec![1, 2, 3])),
            title: format!("Title {n}"),
            ..PackSlot::default()
        }
    }

    fn input(date: &str, slots: usize) -> ReplacePackInput {
        ReplacePackInput {
            quiz_date: date.into(),
            slots: (1..=slots).map(slot).collect(),
        }
    }

    #[test]
    fn valid_pack_yields_its_date() {
        let date = validate_pack(&input("2024-01-07", 4), 1024).unwrap();
        assert_eq!(date.to_string(), "2024-01-07");
    }

    #[test]
    fn rejects_wrong_slot_counts_and_dates() {
        assert!(validate_pack(&input("2024-01-07", 3), 1024).is_err());
        assert!(validate_pack(&input("2024-01-07", 5), 1024).is_err());
        assert!(validate_pack(&input("2024-02-30", 4), 1024).is_err());
        assert!(validate_pack(&input("07.01.2024", 4), 1024).is_err());
    }

    #[test]
    fn rejects_blank_titles_and_missing_images() {
        let mut pack = input("2024-01-07", 4);
        pack.slots[2].title = "   ".into();
        assert!(matches!(
            validate_pack(&pack, 1024),
            Err(ServiceError::InvalidInput(msg)) if msg == "title3 is required"
        ));

        let mut pack = input("2024-01-07", 4);
        pack.slots[0].image = None;
        assert!(validate_pack(&pack, 1024).is_err());

        let mut pack = input("2024-01-07", 4);
        pack.slots[1].hint2 = Some(UploadedFile::new("hint.txt", vec![1]));
        assert!(validate_pack(&pack, 1024).is_err());
    }

    #[test]
    fn manual_ids_use_a_slug_of_the_title() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(
            manual_anime_id("Fullmetal Alchemist: Brotherhood", at),
            "manual-fullmetal-alchemist-brotherhood-1700000000123"
        );
        assert_eq!(slug("Re:Zero!"), "re-zero-");
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 50);
        assert_eq!(clamp_limit(Some(-3)), 50);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(10_000)), 200);
    }
}
