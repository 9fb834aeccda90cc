//! Day, week and all-time rankings computed from ledger activity.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{
    dao::models::{DateWindow, GuessActivityEntity},
    dto::leaderboard::{LeaderboardEntry, LeaderboardMetric, LeaderboardQuery},
    error::ServiceError,
    quiz_date::QuizDate,
    services::{directory_service::UNKNOWN_USERNAME, optional_date},
    state::SharedState,
};

/// Days covered by the week ranking, the latest quiz day included.
const WEEK_DAYS: u32 = 7;
const DEFAULT_LEADERBOARD_SIZE: i64 = 50;
const MAX_LEADERBOARD_SIZE: i64 = 200;

/// Ranking period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Raw credited guesses on a single day.
    ///
    /// Without an explicit date the day is the latest day that has items
    /// ([`QuizStore::latest_quiz_date`](crate::dao::quiz_store::QuizStore::latest_quiz_date)),
    /// not the day of the latest guess.
    Day,
    /// Distinct active days in the week ending on the latest quiz day.
    ///
    /// The window ends on the latest day that has items
    /// ([`QuizStore::latest_quiz_date`](crate::dao::quiz_store::QuizStore::latest_quiz_date)),
    /// not on the day of the latest guess.
    Week,
    /// Distinct active days, all time.
    All,
}

impl Period {
    /// Parse a query value; anything unknown ranks all time.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("day") => Period::Day,
            Some("week") => Period::Week,
            _ => Period::All,
        }
    }

    fn metric(self) -> LeaderboardMetric {
        match self {
            Period::Day => LeaderboardMetric::Guesses,
            Period::Week | Period::All => LeaderboardMetric::Days,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::All => "all",
        })
    }
}

/// Number of ranked users returned: 50 by default, otherwise clamped to 1..=200.
pub fn clamp_leaderboard_limit(limit: Option<i64>) -> u32 {
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    u32::try_from(limit).unwrap_or(1)
}

/// Count activity per user: raw rows for [`Period::Day`], distinct days otherwise.
pub fn tally(period: Period, activity: &[GuessActivityEntity]) -> HashMap<String, u32> {
    match period {
        Period::Day => {
            let mut counts = HashMap::new();
            for row in activity {
                *counts.entry(row.user_id.clone()).or_insert(0) += 1;
            }
            counts
        }
        Period::Week | Period::All => {
            let mut days: HashMap<&str, HashSet<QuizDate>> = HashMap::new();
            for row in activity {
                days.entry(row.user_id.as_str())
                    .or_default()
                    .insert(row.quiz_date);
            }
            days.into_iter()
                .map(|(user_id, set)| (user_id.to_owned(), set.len() as u32))
                .collect()
        }
    }
}

/// Order tallies by count (desc), username (asc) then user id (asc) and keep the first `limit`.
pub fn rank(
    period: Period,
    counts: HashMap<String, u32>,
    names: &HashMap<String, String>,
    day: Option<QuizDate>,
    limit: u32,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(String, String, u32)> = counts
        .into_iter()
        .map(|(user_id, count)| {
            let username = names
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_owned());
            (user_id, username, count)
        })
        .collect();
    rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(limit as usize);

    let date = match period {
        Period::Day => day,
        Period::Week | Period::All => None,
    };
    rows.into_iter()
        .enumerate()
        .map(|(idx, (user_id, username, count))| LeaderboardEntry {
            rank: idx as u32 + 1,
            user_id,
            username,
            count,
            metric: period.metric(),
            date,
        })
        .collect()
}

/// Ranking for the requested period, served from the cache when fresh.
pub async fn leaderboard(
    state: &SharedState,
    query: LeaderboardQuery,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let period = Period::parse(query.period.as_deref());
    let limit = clamp_leaderboard_limit(query.limit);
    let requested_day = match period {
        Period::Day => optional_date(query.date.as_deref())?,
        Period::Week | Period::All => None,
    };
    let key = format!(
        "leaderboard:{period}:{}:{limit}",
        requested_day.map_or_else(|| "na".to_owned(), |d| d.to_string())
    );

    state
        .cache()
        .get_or_try_insert_with(&key, state.config().cache.volatile, || async {
            let store = state.require_quiz_store().await?;

            let (window, day) = match period {
                Period::Day => {
                    let day = match requested_day {
                        Some(day) => Some(day),
                        None => store.latest_quiz_date().await?,
                    };
                    (day.map(|d| DateWindow { from: d, to: d }), day)
                }
                Period::Week => {
                    let latest = store.latest_quiz_date().await?;
                    let window = latest.map(|to| DateWindow {
                        from: to.days_before(WEEK_DAYS - 1),
                        to,
                    });
                    (window, None)
                }
                Period::All => (None, None),
            };

            let no_scope = window.is_none() && period != Period::All;
            let activity = if no_scope {
                Vec::new()
            } else {
                store.guess_activity(window).await?
            };

            let counts = tally(period, &activity);
            let names = store.user_names(counts.keys().cloned().collect()).await?;
            Ok::<_, ServiceError>(rank(period, counts, &names, day, limit))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: &str) -> QuizDate {
        QuizDate::parse(value).unwrap()
    }

    fn activity(rows: &[(&str, &str)]) -> Vec<GuessActivityEntity> {
        rows.iter()
            .map(|(user, date)| GuessActivityEntity {
                user_id: (*user).to_owned(),
                quiz_date: day(date),
            })
            .collect()
    }

    #[test]
    fn leaderboard_limit_is_clamped_not_defaulted() {
        assert_eq!(clamp_leaderboard_limit(None), 50);
        assert_eq!(clamp_leaderboard_limit(Some(0)), 1);
        assert_eq!(clamp_leaderboard_limit(Some(-5)), 1);
        assert_eq!(clamp_leaderboard_limit(Some(25)), 25);
        assert_eq!(clamp_leaderboard_limit(Some(10_000)), 200);
    }

    #[test]
    fn unknown_periods_rank_all_time() {
        assert_eq!(Period::parse(Some("day")), Period::Day);
        assert_eq!(Period::parse(Some("week")), Period::Week);
        assert_eq!(Period::parse(Some("month")), Period::All);
        assert_eq!(Period::parse(None), Period::All);
    }

    #[test]
    fn day_counts_raw_guesses_other_periods_count_days() {
        let rows = activity(&[
            ("u1", "2024-01-07"),
            ("u1", "2024-01-07"),
            ("u1", "2024-01-07"),
            ("u2", "2024-01-07"),
        ]);

        let day_counts = tally(Period::Day, &rows);
        assert_eq!(day_counts["u1"], 3);
        assert_eq!(day_counts["u2"], 1);

        let all_counts = tally(Period::All, &rows);
        assert_eq!(all_counts["u1"], 1);
        assert_eq!(all_counts["u2"], 1);
    }

    #[test]
    fn ties_break_on_username_then_user_id() {
        let counts = HashMap::from([
            ("u3".to_owned(), 2),
            ("u1".to_owned(), 2),
            ("u2".to_owned(), 5),
            ("u4".to_owned(), 2),
        ]);
        let names = HashMap::from([
            ("u3".to_owned(), "Asuka".to_owned()),
            ("u1".to_owned(), "Rei".to_owned()),
        ]);

        let ranked = rank(Period::All, counts, &names, None, 10);
        let order: Vec<_> = ranked.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, ["u2", "u3", "u1", "u4"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[3].rank, 4);
        assert_eq!(ranked[3].username, UNKNOWN_USERNAME);
        assert!(ranked.iter().all(|e| e.date.is_none()));
    }

    #[test]
    fn limit_truncates_and_day_entries_carry_the_date() {
        let counts = HashMap::from([("a".to_owned(), 1), ("b".to_owned(), 2)]);
        let ranked = rank(Period::Day, counts, &HashMap::new(), Some(day("2024-01-07")), 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, "b");
        assert_eq!(ranked[0].metric, LeaderboardMetric::Guesses);
        assert_eq!(ranked[0].date, Some(day("2024-01-07")));
    }
}
