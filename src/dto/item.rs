//! DTOs for quiz items, daily packs and their listings.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{dao::models::QuizItemEntity, dto::format_system_time, quiz_date::QuizDate};

/// Quiz item as exposed to clients, with its derived guessed-by list.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizItemResponse {
    /// Identifier of the item.
    pub id: Uuid,
    /// Admin who uploaded the item.
    pub owner_id: String,
    /// Expected answer.
    pub title: String,
    /// Public reference of the main image.
    pub image_ref: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: Option<String>,
    /// Day the item belongs to.
    pub quiz_date: QuizDate,
    /// First hint image, if any.
    pub hint1_ref: Option<String>,
    /// Second hint image, if any.
    pub hint2_ref: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// Users credited for this item, oldest credit first.
    pub guessed_by: Vec<String>,
}

impl QuizItemResponse {
    /// Attach the users credited for the item.
    pub fn from_entity(entity: QuizItemEntity, guessed_by: Vec<String>) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            title: entity.title,
            image_ref: entity.image_ref,
            anime_id: entity.anime_id,
            source_id: entity.source_id,
            quiz_date: entity.quiz_date,
            hint1_ref: entity.hint1_ref,
            hint2_ref: entity.hint2_ref,
            created_at: format_system_time(entity.created_at),
            guessed_by,
        }
    }
}

impl From<QuizItemEntity> for QuizItemResponse {
    fn from(entity: QuizItemEntity) -> Self {
        Self::from_entity(entity, Vec::new())
    }
}

/// Result of a successful pack replacement.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePackResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of items in the new pack (always four).
    pub created: usize,
    /// Items of the new pack, in slot order.
    pub items: Vec<QuizItemResponse>,
    /// Day that was replaced.
    pub quiz_date: QuizDate,
}

/// Multipart form accepted by the pack replacement route.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePackForm {
    /// Day to replace, `YYYY-MM-DD`.
    pub quiz_date: String,
    /// Main image of slot 1. Slots 2..4 follow the same naming.
    #[schema(value_type = String, format = Binary)]
    pub image1: Vec<u8>,
    /// Answer of slot 1.
    pub title1: String,
    /// Optional external id; generated from the title when absent. Same for slots 2..4.
    pub anime_id1: Option<String>,
    /// Catalogue of `animeId1`. Same for slots 2..4.
    pub source_id1: Option<String>,
    /// First hint image of slot 1 (`hint2_1` is the second). Same for slots 2..4.
    #[serde(rename = "hint1_1")]
    #[schema(value_type = Option<String>, format = Binary)]
    pub hint1_1: Option<Vec<u8>>,
    /// Main image of slot 2.
    #[schema(value_type = String, format = Binary)]
    pub image2: Vec<u8>,
    /// Answer of slot 2.
    pub title2: String,
    /// Main image of slot 3.
    #[schema(value_type = String, format = Binary)]
    pub image3: Vec<u8>,
    /// Answer of slot 3.
    pub title3: String,
    /// Main image of slot 4.
    #[schema(value_type = String, format = Binary)]
    pub image4: Vec<u8>,
    /// Answer of slot 4.
    pub title4: String,
}

/// Multipart form accepted by the single item upload route.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadItemForm {
    /// Main image.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// Expected answer.
    pub title: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: Option<String>,
    /// Defaults to today (UTC) when absent or malformed.
    pub quiz_date: Option<String>,
}

/// Query parameters of the pack listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    /// Day to list; defaults to today, then to the latest day with items.
    pub date: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, clamped to 1..=200 (default 50).
    pub limit: Option<i64>,
}

/// Paging metadata attached to listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current 1-based page.
    pub page: u32,
    /// Page size after clamping.
    pub limit: u32,
    /// Number of matching entries.
    pub total: u64,
    /// Number of pages; at least 1.
    pub total_pages: u64,
}

/// One page of a day's items.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemListResponse {
    /// Items of the page, in insertion order.
    pub items: Vec<QuizItemResponse>,
    /// Paging metadata.
    pub pagination: Pagination,
    /// Day actually listed, after fallback.
    pub quiz_date: QuizDate,
}

/// Acknowledgement of a delete request.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// Always `true`.
    pub success: bool,
    /// Identifier of the deleted entry.
    pub deleted: Uuid,
}
