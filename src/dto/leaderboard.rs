use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::quiz_date::QuizDate;

/// Query parameters of the leaderboard.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries, clamped to 1..=200 (default 50).
    pub limit: Option<i64>,
    /// `day`, `week` or `all` (default; also used for unknown values).
    pub period: Option<String>,
    /// Day ranked by the `day` period; defaults to the latest quiz day.
    pub date: Option<String>,
}

/// What the `count` of a leaderboard entry measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMetric {
    /// Credited guesses on one day.
    Guesses,
    /// Distinct active days.
    Days,
}

/// One ranked user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    /// Ranked user id.
    pub user_id: String,
    /// Directory name, or `user` when unknown.
    pub username: String,
    /// Value measured by `metric`.
    pub count: u32,
    /// What `count` measures.
    pub metric: LeaderboardMetric,
    /// Ranked day, for the `day` period only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<QuizDate>,
}
