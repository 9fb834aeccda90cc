use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::validation::{validate_not_blank, validate_quiz_date};

/// Longest accepted quiz mode name.
const MAX_QUIZ_TYPE_CHARS: usize = 50;

/// Numeric score, accepted either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ScoreValue {
    /// JSON number.
    Number(f64),
    /// Numeric string such as `"1200"`.
    Text(String),
}

impl ScoreValue {
    /// Finite numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            ScoreValue::Number(value) => *value,
            ScoreValue::Text(raw) => raw.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Completion of a standalone quiz mode.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreRequest {
    /// Quiz mode name.
    #[schema(example = "openings")]
    pub quiz_type: String,
    /// Finite score.
    #[schema(value_type = f64, example = 1200)]
    pub score: ScoreValue,
    /// Quiz day, `YYYY-MM-DD`.
    #[schema(example = "2024-01-07")]
    pub date: String,
}

impl Validate for SubmitScoreRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.quiz_type) {
            errors.add("quizType", e);
        } else if self.quiz_type.trim().chars().count() > MAX_QUIZ_TYPE_CHARS {
            let mut e = ValidationError::new("length");
            e.message = Some("quizType too long".into());
            errors.add("quizType", e);
        }

        if self.score.as_f64().is_none() {
            let mut e = ValidationError::new("number");
            e.message = Some("score must be a number".into());
            errors.add("score", e);
        }

        if let Err(e) = validate_quiz_date(self.date.trim()) {
            errors.add("date", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Acknowledgement of a stored score.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreResponse {
    /// Always `true`.
    pub success: bool,
    /// Identifier of the stored score.
    pub score_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> SubmitScoreRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn score_accepts_numbers_and_numeric_strings() {
        let numeric = parse(r#"{"quizType":"openings","score":12.5,"date":"2024-01-07"}"#);
        let text = parse(r#"{"quizType":"openings","score":" 40 ","date":"2024-01-07"}"#);
        assert_eq!(numeric.score.as_f64(), Some(12.5));
        assert_eq!(text.score.as_f64(), Some(40.0));
        assert!(numeric.validate().is_ok());
        assert!(text.validate().is_ok());
    }

    #[test]
    fn invalid_fields_are_reported_together() {
        let request = parse(r#"{"quizType":" ","score":"lots","date":"yesterday"}"#);
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("quizType"));
        assert!(fields.contains_key("score"));
        assert!(fields.contains_key("date"));
    }
}
