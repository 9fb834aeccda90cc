use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::validation::validate_not_blank;

/// Longest accepted answer, in characters.
pub const MAX_ANSWER_CHARS: usize = 200;

/// Answer submitted by a player for one quiz item.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckAnswerRequest {
    /// Free-text title guess; compared case-insensitively after trimming.
    #[schema(max_length = 200, example = "Fullmetal Alchemist")]
    pub answer: String,
}

impl Validate for CheckAnswerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.answer) {
            errors.add("answer", e);
        } else if self.answer.chars().count() > MAX_ANSWER_CHARS {
            let mut e = ValidationError::new("length");
            e.message = Some(format!("answer must be at most {MAX_ANSWER_CHARS} characters").into());
            errors.add("answer", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Outcome of an answer check. The title is only revealed on a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckAnswerResponse {
    /// Whether the answer matched the item title.
    pub correct: bool,
    /// Item title, present on a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CheckAnswerResponse {
    /// Non-matching answer.
    pub fn wrong() -> Self {
        Self {
            correct: false,
            title: None,
        }
    }

    /// Matching answer revealing `title`.
    pub fn matched(title: String) -> Self {
        Self {
            correct: true,
            title: Some(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(answer: &str) -> CheckAnswerRequest {
        CheckAnswerRequest {
            answer: answer.to_owned(),
        }
    }

    #[test]
    fn blank_and_oversized_answers_are_rejected() {
        assert!(request("Naruto").validate().is_ok());
        assert!(request("   ").validate().is_err());
        assert!(request(&"a".repeat(MAX_ANSWER_CHARS)).validate().is_ok());
        assert!(request(&"a".repeat(MAX_ANSWER_CHARS + 1)).validate().is_err());
    }

    #[test]
    fn title_is_hidden_on_wrong_answers() {
        let body = serde_json::to_value(CheckAnswerResponse::wrong()).unwrap();
        assert_eq!(body, serde_json::json!({ "correct": false }));
    }
}
