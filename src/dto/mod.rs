use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod answer;
pub mod batch;
pub mod battle;
pub mod battle_pack;
pub mod health;
pub mod history;
pub mod item;
pub mod leaderboard;
pub mod news;
pub mod opening;
pub mod score;
pub mod stats;
pub mod user;
pub mod validation;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
