//! Calendar-day key (`YYYY-MM-DD`, UTC) used to group a day's quiz content.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;
use time::{Date, Duration, Month, OffsetDateTime};
use utoipa::ToSchema;

/// Error raised when a string is not a strict `YYYY-MM-DD` calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizDateError {
    /// The input does not follow the `YYYY-MM-DD` pattern.
    #[error("quiz date `{0}` must match YYYY-MM-DD")]
    Format(String),
    /// The input follows the pattern but names a day that does not exist.
    #[error("quiz date `{0}` is not a valid calendar day")]
    Calendar(String),
}

/// A UTC calendar day. Ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = String, format = Date, example = "2024-01-07")]
pub struct QuizDate(Date);

impl QuizDate {
    /// Parse a strict `YYYY-MM-DD` string.
    pub fn parse(input: &str) -> Result<Self, QuizDateError> {
        let bytes = input.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(idx, byte)| idx == 4 || idx == 7 || byte.is_ascii_digit());
        if !well_formed {
            return Err(QuizDateError::Format(input.to_owned()));
        }

        let year: i32 = input[0..4]
            .parse()
            .map_err(|_| QuizDateError::Format(input.to_owned()))?;
        let month: u8 = input[5..7]
            .parse()
            .map_err(|_| QuizDateError::Format(input.to_owned()))?;
        let day: u8 = input[8..10]
            .parse()
            .map_err(|_| QuizDateError::Format(input.to_owned()))?;

        let month =
            Month::try_from(month).map_err(|_| QuizDateError::Calendar(input.to_owned()))?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| QuizDateError::Calendar(input.to_owned()))
    }

    /// Parse `input` when present and well formed, otherwise fall back to today (UTC).
    pub fn parse_or_today(input: Option<&str>) -> Self {
        input
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| Self::parse(value).ok())
            .unwrap_or_else(Self::today)
    }

    /// Today's date in UTC.
    pub fn today() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    /// Wrap an existing [`Date`].
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    /// Whether `self` is exactly one calendar day after `previous`.
    pub fn is_day_after(self, previous: QuizDate) -> bool {
        previous.0.next_day() == Some(self.0)
    }

    /// The day `days` before `self`, saturating at the earliest representable date.
    pub fn days_before(self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub(Duration::days(i64::from(days)))
                .unwrap_or(Date::MIN),
        )
    }
}

impl fmt::Display for QuizDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for QuizDate {
    type Err = QuizDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for QuizDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QuizDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}
