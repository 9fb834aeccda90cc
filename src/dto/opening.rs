use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::OpeningEntity,
    dto::{format_system_time, validation::validate_quiz_date},
    quiz_date::QuizDate,
};

fn default_end_time() -> u32 {
    20
}

/// Opening clip scheduled by an administrator.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpeningRequest {
    /// Quiz day, `YYYY-MM-DD`.
    #[validate(custom(function = "validate_quiz_date"))]
    pub quiz_date: String,
    /// Anime title of the opening.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Link to the clip.
    #[serde(alias = "youtubeUrl")]
    #[validate(url)]
    pub video_url: String,
    /// Clip start, in seconds.
    #[serde(default)]
    #[validate(range(max = 100_000))]
    pub start_time: u32,
    /// Clip end, in seconds.
    #[serde(default = "default_end_time")]
    #[schema(default = 20)]
    #[validate(range(max = 100_000))]
    pub end_time: u32,
}

/// Opening as listed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpeningResponse {
    /// Identifier of the opening.
    pub id: Uuid,
    /// Anime title of the opening.
    pub title: String,
    /// Link to the clip.
    pub video_url: String,
    /// Clip start, in seconds.
    pub start_time: u32,
    /// Clip end, in seconds.
    pub end_time: u32,
    /// Quiz day of the opening.
    pub quiz_date: QuizDate,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Admin who scheduled it.
    pub created_by: Option<String>,
}

impl From<OpeningEntity> for OpeningResponse {
    fn from(entity: OpeningEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            video_url: entity.video_url,
            start_time: entity.start_time,
            end_time: entity.end_time,
            quiz_date: entity.quiz_date,
            created_at: format_system_time(entity.created_at),
            created_by: entity.created_by,
        }
    }
}

/// Response of the opening creation route.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOpeningResponse {
    /// Always `true`.
    pub success: bool,
    /// Stored opening.
    pub opening: OpeningResponse,
}

/// Optional day filter of the openings listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OpeningsQuery {
    /// Quiz day, `YYYY-MM-DD`; every opening when absent.
    pub date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_legacy_url_field() {
        let request: CreateOpeningRequest = serde_json::from_str(
            r#"{"quizDate":"2024-01-07","title":"Unravel","youtubeUrl":"https://youtu.be/abc"}"#,
        )
        .unwrap();
        assert_eq!(request.start_time, 0);
        assert_eq!(request.end_time, 20);
        assert_eq!(request.video_url, "https://youtu.be/abc");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_bad_urls_dates_and_offsets() {
        let request: CreateOpeningRequest = serde_json::from_str(
            r#"{"quizDate":"2024-02-30","title":"","videoUrl":"not a url","startTime":100001}"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 4);
    }
}
