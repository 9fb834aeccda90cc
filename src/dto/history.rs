//! DTOs of the per-user game history.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::quiz_date::QuizDate;

/// Outcome of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// More battle wins than losses, or any score submission.
    Win,
    /// More battle losses than wins.
    Loss,
    /// As many battle wins as losses.
    Draw,
}

/// One played game: a score submission or a day of battles.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GameHistoryEntry {
    /// Stable identifier built from the source and its timestamp.
    pub id: String,
    /// Human readable mode name.
    pub mode: String,
    /// Outcome of the game.
    pub result: GameResult,
    /// Submitted score, or summed battle points.
    pub score: f64,
    /// Quiz day the game belongs to.
    pub date: QuizDate,
    /// RFC 3339 timestamp used for ordering.
    pub timestamp: String,
}

/// Size of the history listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameHistoryQuery {
    /// Entries returned, clamped to 1..=100 (default 50).
    pub limit: Option<i64>,
}
