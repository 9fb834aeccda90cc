use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{BattleResultEntity, BattleResultFilter},
    dto::battle::{BattleResultResponse, BattleResultsQuery, BattleResultsRequest, BattleResultsSaved},
    error::ServiceError,
    quiz_date::QuizDate,
    services::optional_date,
    state::SharedState,
};

/// Replace the caller's results for the requested day.
pub async fn submit_results(
    state: &SharedState,
    user_id: &str,
    request: BattleResultsRequest,
) -> Result<BattleResultsSaved, ServiceError> {
    let quiz_date = QuizDate::parse(request.date.trim())
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let store = state.require_quiz_store().await?;

    let created_at = SystemTime::now();
    let results: Vec<BattleResultEntity> = request
        .results
        .into_iter()
        .map(|result| BattleResultEntity {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            anime_id: result.anime_id.trim().to_owned(),
            wins: result.wins,
            losses: result.losses,
            points: result.points,
            quiz_date,
            created_at,
        })
        .collect();
    let saved = results.len();

    store
        .replace_battle_results(user_id.to_owned(), quiz_date, results)
        .await?;
    state.cache().flush();
    info!(user_id, %quiz_date, saved, "battle results saved");

    Ok(BattleResultsSaved {
        success: true,
        saved,
    })
}

/// Results matching the optional day and user filters, best first.
pub async fn list_results(
    state: &SharedState,
    query: BattleResultsQuery,
) -> Result<Vec<BattleResultResponse>, ServiceError> {
    let quiz_date = optional_date(query.date.as_deref())?;
    let user_id = query
        .user_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty());

    let store = state.require_quiz_store().await?;
    let results = store
        .list_battle_results(BattleResultFilter { quiz_date, user_id })
        .await?;
    Ok(results.into_iter().map(BattleResultResponse::from).collect())
}
