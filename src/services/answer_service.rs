//! Answer checking against the guess ledger.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::GuessEntity,
    dto::answer::{CheckAnswerRequest, CheckAnswerResponse},
    error::ServiceError,
    state::SharedState,
};

/// Case-folded, trimmed form used to compare answers with titles.
pub fn normalize_answer(value: &str) -> String {
    value.to_lowercase().trim().to_owned()
}

/// Check `request` against the title of item `item_id` and credit `user_id` on a match.
///
/// A user is credited at most once per item; repeated or concurrent correct answers are
/// successful no-ops and leave the cache untouched.
pub async fn check_answer(
    state: &SharedState,
    item_id: Uuid,
    user_id: &str,
    request: CheckAnswerRequest,
) -> Result<CheckAnswerResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(item) = store.find_item(item_id).await? else {
        return Err(ServiceError::NotFound(format!("quiz item `{item_id}` not found")));
    };

    if normalize_answer(&request.answer) != normalize_answer(&item.title) {
        debug!(%item_id, user_id, "wrong answer");
        return Ok(CheckAnswerResponse::wrong());
    }

    let credited = store
        .record_guess(GuessEntity {
            quiz_item_id: item.id,
            user_id: user_id.to_owned(),
            quiz_date: item.quiz_date,
            guessed_at: SystemTime::now(),
        })
        .await?;

    if credited {
        state.cache().flush();
        info!(%item_id, user_id, quiz_date = %item.quiz_date, "guess credited");
    } else {
        debug!(%item_id, user_id, "guess already credited");
    }

    Ok(CheckAnswerResponse::matched(item.title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_ignores_case_and_surrounding_whitespace() {
        assert_eq!(normalize_answer("  NARUTO "), normalize_answer("Naruto"));
        assert_eq!(normalize_answer("Ângel Beats!"), "ângel beats!");
        assert_ne!(normalize_answer("Naruto Shippuden"), normalize_answer("Naruto"));
    }
}
