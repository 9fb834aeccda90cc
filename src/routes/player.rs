use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        answer::{CheckAnswerRequest, CheckAnswerResponse},
        battle::{BattleResultsRequest, BattleResultsSaved},
        score::{SubmitScoreRequest, SubmitScoreResponse},
        stats::UserStatsResponse,
    },
    error::AppError,
    routes::identity::Identity,
    services::{answer_service, battle_service, score_service, stats_service},
    state::SharedState,
};

/// Endpoints acting on behalf of the authenticated player.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/anime-guesses/{id}/check", post(check_answer))
        .route("/api/stats/me", get(my_stats))
        .route("/api/scores", post(submit_score))
        .route("/api/battle-results", post(submit_battle_results))
}

#[utoipa::path(
    post,
    path = "/api/anime-guesses/{id}/check",
    tag = "player",
    params(
        ("id" = Uuid, Path, description = "Quiz item to answer"),
        ("x-user-id" = String, Header, description = "Authenticated user id")
    ),
    request_body = CheckAnswerRequest,
    responses(
        (status = 200, description = "Answer checked", body = CheckAnswerResponse),
        (status = 400, description = "Blank or oversized answer"),
        (status = 401, description = "Missing identity"),
        (status = 404, description = "Unknown quiz item")
    )
)]
/// Check an answer and credit the caller once on a match.
pub async fn check_answer(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CheckAnswerRequest>>,
) -> Result<Json<CheckAnswerResponse>, AppError> {
    let response = answer_service::check_answer(&state, id, &identity.user_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/stats/me",
    tag = "player",
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Caller's streaks", body = UserStatsResponse),
        (status = 401, description = "Missing identity")
    )
)]
/// Streaks and per-day guess counts of the caller.
pub async fn my_stats(
    State(state): State<SharedState>,
    identity: Identity,
) -> Result<Json<UserStatsResponse>, AppError> {
    Ok(Json(stats_service::user_stats(&state, &identity.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/scores",
    tag = "player",
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    request_body = SubmitScoreRequest,
    responses(
        (status = 200, description = "Score stored", body = SubmitScoreResponse),
        (status = 400, description = "Invalid score")
    )
)]
/// Store the completion of a standalone quiz mode.
pub async fn submit_score(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<SubmitScoreRequest>>,
) -> Result<Json<SubmitScoreResponse>, AppError> {
    let response = score_service::submit_score(&state, &identity.user_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/battle-results",
    tag = "player",
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    request_body = BattleResultsRequest,
    responses(
        (status = 200, description = "Results for the day replaced", body = BattleResultsSaved),
        (status = 400, description = "Invalid date or results")
    )
)]
/// Replace the caller's battle results for one day.
pub async fn submit_battle_results(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<BattleResultsRequest>>,
) -> Result<Json<BattleResultsSaved>, AppError> {
    let response = battle_service::submit_results(&state, &identity.user_id, payload).await?;
    Ok(Json(response))
}
