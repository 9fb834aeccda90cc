//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::quiz_date::QuizDate;

/// Validates that a text field still has content once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a field holds a strict `YYYY-MM-DD` calendar day.
///
/// # Examples
///
/// ```ignore
/// validate_quiz_date("2024-01-07") // Ok
/// validate_quiz_date("2024-1-7")   // Err - not zero padded
/// validate_quiz_date("2023-02-29") // Err - not a real day
/// ```
pub fn validate_quiz_date(value: &str) -> Result<(), ValidationError> {
    QuizDate::parse(value).map(|_| ()).map_err(|source| {
        let mut err = ValidationError::new("quiz_date");
        err.message = Some(source.to_string().into());
        err
    })
}
