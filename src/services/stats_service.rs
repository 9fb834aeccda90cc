//! Per-user streaks and site-wide statistics, both derived from the guess ledger.

use std::collections::{BTreeMap, HashMap};

use crate::{
    dao::models::{GlobalStatsEntity, UserTotal},
    dto::stats::{GlobalStatsResponse, ModePlays, MostGuessedAnime, TopPlayer, UserStatsResponse},
    error::ServiceError,
    quiz_date::QuizDate,
    services::directory_service::UNKNOWN_USERNAME,
    state::SharedState,
};

/// Number of entries in each global statistics list.
const GLOBAL_TOP: u32 = 5;

/// Derive streaks from one quiz day per credited guess (days may repeat, in any order).
pub fn compute_streaks(guess_days: &[QuizDate], today: QuizDate) -> UserStatsResponse {
    let mut per_day: BTreeMap<QuizDate, u32> = BTreeMap::new();
    for day in guess_days {
        *per_day.entry(*day).or_default() += 1;
    }

    let mut best = 0;
    let mut current = 0;
    let mut previous: Option<QuizDate> = None;
    for day in per_day.keys().copied() {
        current = match previous {
            Some(prev) if day.is_day_after(prev) => current + 1,
            _ => 1,
        };
        best = best.max(current);
        previous = Some(day);
    }

    UserStatsResponse {
        total_days: per_day.len() as u32,
        current_streak: current,
        best_streak: best,
        today_guessed: per_day.contains_key(&today),
        per_day_counts: per_day
            .into_iter()
            .map(|(day, count)| (day.to_string(), count))
            .collect(),
    }
}

/// Streaks and per-day counts of `user_id`.
pub async fn user_stats(state: &SharedState, user_id: &str) -> Result<UserStatsResponse, ServiceError> {
    let today = QuizDate::today();
    let key = format!("stats:user:{user_id}:{today}");

    state
        .cache()
        .get_or_try_insert_with(&key, state.config().cache.volatile, || async {
            let store = state.require_quiz_store().await?;
            let days = store.user_guess_dates(user_id.to_owned()).await?;
            Ok::<_, ServiceError>(compute_streaks(&days, today))
        })
        .await
}

/// Most guessed titles, best players and most played quiz modes.
pub async fn global_stats(state: &SharedState) -> Result<GlobalStatsResponse, ServiceError> {
    state
        .cache()
        .get_or_try_insert_with("stats:global", state.config().cache.slow, || async {
            let store = state.require_quiz_store().await?;
            let stats = store.global_stats(GLOBAL_TOP).await?;
            let players = top_players(&stats);
            let names = store
                .user_names(players.iter().map(|p| p.user_id.clone()).collect())
                .await?;
            Ok::<_, ServiceError>(assemble_global_stats(stats, &names))
        })
        .await
}

/// Players ranked by summed score, or by credited guesses when nobody submitted a score.
fn top_players(stats: &GlobalStatsEntity) -> &[UserTotal] {
    if stats.top_scorers.is_empty() {
        &stats.top_guessers
    } else {
        &stats.top_scorers
    }
}

fn assemble_global_stats(
    stats: GlobalStatsEntity,
    names: &HashMap<String, String>,
) -> GlobalStatsResponse {
    let fastest_players = top_players(&stats)
        .iter()
        .map(|total| TopPlayer {
            user_id: total.user_id.clone(),
            username: names
                .get(&total.user_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_owned()),
            score: total.total,
        })
        .collect();

    GlobalStatsResponse {
        most_guessed_anime: stats
            .most_guessed
            .into_iter()
            .map(|row| MostGuessedAnime {
                title: row.title,
                guesses: row.guesses,
            })
            .collect(),
        fastest_players,
        recent_modes: stats
            .quiz_type_plays
            .into_iter()
            .map(|row| ModePlays {
                mode: row.quiz_type,
                plays: row.plays,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::dao::models::{QuizTypePlays, TitleGuessCount};

    use super::*;

    fn days(values: &[&str]) -> Vec<QuizDate> {
        values.iter().map(|v| QuizDate::parse(v).unwrap()).collect()
    }

    fn day(value: &str) -> QuizDate {
        QuizDate::parse(value).unwrap()
    }

    #[test]
    fn consecutive_days_build_a_streak() {
        let stats = compute_streaks(
            &days(&["2024-01-01", "2024-01-02", "2024-01-03"]),
            day("2024-01-03"),
        );
        assert_eq!(stats.total_days, 3);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);
        assert!(stats.today_guessed);
    }

    #[test]
    fn a_gap_resets_the_streak() {
        let stats = compute_streaks(&days(&["2024-01-03", "2024-01-01"]), day("2024-01-05"));
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.best_streak, 1);
        assert!(!stats.today_guessed);
    }

    #[test]
    fn best_streak_survives_a_later_reset() {
        let stats = compute_streaks(
            &days(&["2024-01-30", "2024-01-31", "2024-02-01", "2024-02-05"]),
            day("2024-02-05"),
        );
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn repeated_days_count_once_for_streaks_but_fully_per_day() {
        let stats = compute_streaks(
            &days(&["2024-01-01", "2024-01-01", "2024-01-01", "2024-01-02"]),
            day("2024-01-10"),
        );
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.per_day_counts.get("2024-01-01"), Some(&3));
        assert_eq!(stats.per_day_counts.get("2024-01-02"), Some(&1));
    }

    #[test]
    fn no_history_means_empty_stats() {
        let stats = compute_streaks(&[], day("2024-01-01"));
        assert_eq!(stats.total_days, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 0);
        assert!(stats.per_day_counts.is_empty());
    }

    #[test]
    fn global_stats_fall_back_to_guess_counts() {
        let stats = GlobalStatsEntity {
            most_guessed: vec![TitleGuessCount {
                title: "Naruto".into(),
                guesses: 4,
            }],
            top_scorers: Vec::new(),
            top_guessers: vec![UserTotal {
                user_id: "u1".into(),
                total: 4.0,
            }],
            quiz_type_plays: vec![QuizTypePlays {
                quiz_type: "openings".into(),
                plays: 2,
            }],
        };
        let response = assemble_global_stats(stats, &HashMap::new());

        assert_eq!(response.fastest_players.len(), 1);
        assert_eq!(response.fastest_players[0].username, UNKNOWN_USERNAME);
        assert_eq!(response.fastest_players[0].score, 4.0);
        assert_eq!(response.most_guessed_anime[0].guesses, 4);
        assert_eq!(response.recent_modes[0].mode, "openings");
    }

    #[test]
    fn scores_win_over_guess_counts() {
        let stats = GlobalStatsEntity {
            top_scorers: vec![UserTotal {
                user_id: "u2".into(),
                total: 1500.0,
            }],
            top_guessers: vec![UserTotal {
                user_id: "u1".into(),
                total: 9.0,
            }],
            ..GlobalStatsEntity::default()
        };
        let names = HashMap::from([("u2".to_owned(), "Mikasa".to_owned())]);
        let response = assemble_global_stats(stats, &names);

        assert_eq!(response.fastest_players[0].user_id, "u2");
        assert_eq!(response.fastest_players[0].username, "Mikasa");
    }
}
