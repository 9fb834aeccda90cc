use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::ScoreEntity,
    dto::score::{SubmitScoreRequest, SubmitScoreResponse},
    error::ServiceError,
    quiz_date::QuizDate,
    state::SharedState,
};

/// Append a quiz-mode score for `user_id`.
pub async fn submit_score(
    state: &SharedState,
    user_id: &str,
    request: SubmitScoreRequest,
) -> Result<SubmitScoreResponse, ServiceError> {
    let score = request
        .score
        .as_f64()
        .ok_or_else(|| ServiceError::InvalidInput("score must be a number".into()))?;
    let quiz_date = QuizDate::parse(request.date.trim())
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_quiz_store().await?;
    let entity = ScoreEntity {
        id: Uuid::new_v4(),
        user_id: user_id.to_owned(),
        quiz_type: request.quiz_type.trim().to_owned(),
        score,
        quiz_date,
        created_at: SystemTime::now(),
    };
    let score_id = entity.id;
    let quiz_type = entity.quiz_type.clone();
    store.insert_score(entity).await?;

    state.cache().flush();
    info!(user_id, quiz_type, score, "score submitted");

    Ok(SubmitScoreResponse {
        success: true,
        score_id,
    })
}
