//! Per-user and global statistics payloads.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

/// Streaks and per-day activity of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsResponse {
    /// Distinct quiz days with at least one credited guess.
    pub total_days: u32,
    /// Length of the run of consecutive days ending on the most recent active day.
    pub current_streak: u32,
    /// Longest run of consecutive active days.
    pub best_streak: u32,
    /// Whether today (UTC) is one of the active days.
    pub today_guessed: bool,
    /// Credited guesses per quiz day, keyed by `YYYY-MM-DD`.
    pub per_day_counts: BTreeMap<String, u32>,
}

/// A title and how many credits it received.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MostGuessedAnime {
    /// Item title.
    pub title: String,
    /// Credits received.
    pub guesses: u64,
}

/// A user ranked by summed score (or by credited guesses when nobody scored yet).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopPlayer {
    /// Player id.
    pub user_id: String,
    /// Directory name, or `user` when unknown.
    pub username: String,
    /// Summed score, or number of credited guesses.
    pub score: f64,
}

/// A quiz mode and how many scores were submitted for it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModePlays {
    /// Quiz mode name.
    pub mode: String,
    /// Score submissions for the mode.
    pub plays: u64,
}

/// Site-wide highlights.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatsResponse {
    /// Most credited titles.
    pub most_guessed_anime: Vec<MostGuessedAnime>,
    /// Best players.
    pub fastest_players: Vec<TopPlayer>,
    /// Most played modes.
    pub recent_modes: Vec<ModePlays>,
}
