//! Per-user game history merged from score submissions and battle days.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    dao::models::{BattleDayEntity, ScoreEntity},
    dto::{
        format_system_time,
        history::{GameHistoryEntry, GameHistoryQuery, GameResult},
    },
    error::ServiceError,
    state::SharedState,
};

const DEFAULT_HISTORY_SIZE: i64 = 50;
const MAX_HISTORY_SIZE: i64 = 100;
const BATTLE_MODE: &str = "Anime battles";

/// History length requested by a client, clamped to 1..=100.
pub fn clamp_history_limit(limit: Option<i64>) -> u32 {
    let limit = limit
        .unwrap_or(DEFAULT_HISTORY_SIZE)
        .clamp(1, MAX_HISTORY_SIZE);
    u32::try_from(limit).unwrap_or(1)
}

/// Display name of a quiz mode; unknown modes are shown as submitted.
pub fn mode_name(quiz_type: &str) -> String {
    match quiz_type {
        "anime" => "Guess the anime".to_owned(),
        "opening" => "Guess the opening".to_owned(),
        "character" => "Guess the character".to_owned(),
        "battle" => BATTLE_MODE.to_owned(),
        other => other.to_owned(),
    }
}

/// Latest games of `user_id`, newest first.
pub async fn game_history(
    state: &SharedState,
    user_id: &str,
    query: GameHistoryQuery,
) -> Result<Vec<GameHistoryEntry>, ServiceError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ServiceError::InvalidInput("user id is required".into()));
    }
    let limit = clamp_history_limit(query.limit);

    let store = state.require_quiz_store().await?;
    let scores = store.recent_scores(user_id.to_owned(), limit).await?;
    let battle_days = store.battle_days(user_id.to_owned(), limit).await?;
    Ok(merge_history(scores, battle_days, limit))
}

/// Interleave both sources by timestamp, newest first, keeping at most `limit` entries.
pub fn merge_history(
    scores: Vec<ScoreEntity>,
    battle_days: Vec<BattleDayEntity>,
    limit: u32,
) -> Vec<GameHistoryEntry> {
    let mut timed: Vec<(SystemTime, GameHistoryEntry)> = scores
        .into_iter()
        .map(|score| {
            let entry = GameHistoryEntry {
                id: format!("score_{}_{}", millis(score.created_at), score.quiz_type),
                mode: mode_name(&score.quiz_type),
                // every stored score is a completed (won) game
                result: GameResult::Win,
                score: score.score,
                date: score.quiz_date,
                timestamp: format_system_time(score.created_at),
            };
            (score.created_at, entry)
        })
        .chain(battle_days.into_iter().map(|day| {
            let entry = GameHistoryEntry {
                id: format!("battle_{}_{}", millis(day.last_at), day.quiz_date),
                mode: BATTLE_MODE.to_owned(),
                result: battle_result(day.wins, day.losses),
                score: day.points as f64,
                date: day.quiz_date,
                timestamp: format_system_time(day.last_at),
            };
            (day.last_at, entry)
        }))
        .collect();

    timed.sort_by(|a, b| b.0.cmp(&a.0));
    timed.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    timed.into_iter().map(|(_, entry)| entry).collect()
}

fn battle_result(wins: u64, losses: u64) -> GameResult {
    match wins.cmp(&losses) {
        std::cmp::Ordering::Greater => GameResult::Win,
        std::cmp::Ordering::Less => GameResult::Loss,
        std::cmp::Ordering::Equal => GameResult::Draw,
    }
}

fn millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::quiz_date::QuizDate;

    fn at(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    fn score(quiz_type: &str, value: f64, millis: u64) -> ScoreEntity {
        ScoreEntity {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            quiz_type: quiz_type.into(),
            score: value,
            quiz_date: QuizDate::parse("2024-01-07").unwrap(),
            created_at: at(millis),
        }
    }

    fn day(wins: u64, losses: u64, points: i64, millis: u64) -> BattleDayEntity {
        BattleDayEntity {
            quiz_date: QuizDate::parse("2024-01-06").unwrap(),
            points,
            wins,
            losses,
            last_at: at(millis),
        }
    }

    #[test]
    fn entries_are_interleaved_newest_first() {
        let history = merge_history(
            vec![score("anime", 4.0, 3_000), score("quotes", 1.0, 1_000)],
            vec![day(3, 1, 7, 2_000)],
            10,
        );

        let modes: Vec<_> = history.iter().map(|entry| entry.mode.as_str()).collect();
        assert_eq!(modes, vec!["Guess the anime", "Anime battles", "quotes"]);
        assert_eq!(history[0].id, "score_3000_anime");
        assert_eq!(history[1].id, "battle_2000_2024-01-06");
        assert_eq!(history[1].score, 7.0);
    }

    #[test]
    fn battle_days_are_won_lost_or_drawn() {
        let history = merge_history(
            Vec::new(),
            vec![day(2, 1, 1, 3), day(1, 2, 0, 2), day(1, 1, 0, 1)],
            10,
        );
        let results: Vec<_> = history.iter().map(|entry| entry.result).collect();
        assert_eq!(results, vec![GameResult::Win, GameResult::Loss, GameResult::Draw]);
    }

    #[test]
    fn merged_history_is_truncated_to_the_limit() {
        let history = merge_history(
            vec![score("anime", 1.0, 1), score("anime", 1.0, 4)],
            vec![day(0, 0, 0, 2), day(0, 0, 0, 3)],
            3,
        );
        let stamps: Vec<_> = history.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(
            stamps,
            vec!["score_4_anime", "battle_3_2024-01-06", "battle_2_2024-01-06"]
        );
    }

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(clamp_history_limit(None), 50);
        assert_eq!(clamp_history_limit(Some(0)), 1);
        assert_eq!(clamp_history_limit(Some(1_000)), 100);
    }
}
