use crate::{error::ServiceError, quiz_date::QuizDate};

/// Answer checking and guess crediting.
pub mod answer_service;
/// Archive ingestion and validation.
pub mod batch_service;
/// Battle packs and their contenders.
pub mod battle_pack_service;
/// Battle result submission and listing.
pub mod battle_service;
/// User directory synchronisation.
pub mod directory_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Per-user game history.
pub mod history_service;
/// Day, week and all-time rankings.
pub mod leaderboard_service;
/// Site announcements.
pub mod news_service;
/// Opening clip scheduling.
pub mod opening_service;
/// Daily pack replacement, uploads and listings.
pub mod pack_service;
/// Quiz-mode score submission.
pub mod score_service;
/// Per-user and global statistics.
pub mod stats_service;
/// Storage connection supervisor with backoff.
pub mod storage_supervisor;
/// Shared upload checks.
pub mod uploads;

/// Parse an optional `YYYY-MM-DD` query value; blank counts as absent.
pub(crate) fn optional_date(value: Option<&str>) -> Result<Option<QuizDate>, ServiceError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => QuizDate::parse(raw)
            .map(Some)
            .map_err(|err| ServiceError::InvalidInput(err.to_string())),
        None => Ok(None),
    }
}
