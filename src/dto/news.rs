//! DTOs for site announcements.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::dto::item::Pagination;

/// Longest announcement accepted, in characters, after trimming.
pub const MAX_NEWS_CHARS: usize = 280;

fn validate_news_text(value: &str) -> Result<(), ValidationError> {
    let text = value.trim();
    if text.is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("text must not be blank".into());
        return Err(err);
    }
    if text.chars().count() > MAX_NEWS_CHARS {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("text must be at most {MAX_NEWS_CHARS} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Body of the create and edit routes.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct NewsRequest {
    /// Announcement text; surrounding whitespace is dropped.
    #[validate(custom(function = "validate_news_text"))]
    pub text: String,
}

/// Author shown next to an announcement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NewsAuthor {
    /// User id of the author.
    pub id: String,
    /// Directory name, or `Administrator` when the author is unknown.
    pub username: String,
}

/// Announcement as listed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    /// Identifier of the announcement.
    pub id: Uuid,
    /// Announcement text.
    pub text: String,
    /// RFC 3339 timestamp of publication or of the latest edit.
    pub created_at: String,
    /// Who posted it.
    pub author: NewsAuthor,
}

/// One page of announcements, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NewsListResponse {
    /// Announcements of the page.
    pub items: Vec<NewsResponse>,
    /// Paging metadata.
    pub pagination: Pagination,
}

/// Paging of the announcements listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NewsQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, clamped to 1..=50 (default 12).
    pub limit: Option<i64>,
}
