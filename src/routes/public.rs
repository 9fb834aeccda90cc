use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use uuid::Uuid;

use crate::{
    dto::{
        batch::SampleArchiveQuery,
        battle::{BattleResultResponse, BattleResultsQuery},
        battle_pack::{BattleAnimeListResponse, BattlePacksResponse},
        history::{GameHistoryEntry, GameHistoryQuery},
        item::{ItemListQuery, ItemListResponse},
        leaderboard::{LeaderboardEntry, LeaderboardQuery},
        news::{NewsListResponse, NewsQuery},
        opening::{OpeningResponse, OpeningsQuery},
        stats::GlobalStatsResponse,
    },
    error::AppError,
    quiz_date::QuizDate,
    services::{
        batch_service, battle_pack_service, battle_service, history_service, leaderboard_service,
        news_service, opening_service, pack_service, stats_service,
    },
    state::SharedState,
};

const SAMPLE_ARCHIVE_NAME: &str = "aniguess-batch-sample.zip";

/// Anonymous read-only endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/anime-guesses", get(list_items))
        .route("/api/anime-guesses/dates", get(list_dates))
        .route("/api/anime-guesses/batch/sample", get(sample_archive))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/stats/global", get(global_stats))
        .route("/api/openings", get(list_openings))
        .route("/api/battle-results", get(list_battle_results))
        .route("/api/news", get(list_news))
        .route("/api/battle-packs", get(list_battle_packs))
        .route("/api/battles/{pack_id}", get(list_battle_anime))
        .route("/api/users/{id}/game-history", get(game_history))
}

#[utoipa::path(
    get,
    path = "/api/anime-guesses",
    tag = "packs",
    params(ItemListQuery),
    responses(
        (status = 200, description = "One page of a day's items", body = ItemListResponse),
        (status = 400, description = "Malformed date")
    )
)]
/// List a day's quiz items with their guessed-by lists.
pub async fn list_items(
    State(state): State<SharedState>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<ItemListResponse>, AppError> {
    Ok(Json(pack_service::list_items(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/anime-guesses/dates",
    tag = "packs",
    responses((status = 200, description = "Days with items, most recent first", body = [String]))
)]
/// List every day that has at least one item.
pub async fn list_dates(State(state): State<SharedState>) -> Result<Json<Vec<QuizDate>>, AppError> {
    Ok(Json(pack_service::list_dates(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/anime-guesses/batch/sample",
    tag = "batch",
    params(SampleArchiveQuery),
    responses((status = 200, description = "Example zip archive"))
)]
/// Download an example archive with a two-row manifest.
pub async fn sample_archive(Query(query): Query<SampleArchiveQuery>) -> Result<Response, AppError> {
    let bytes = batch_service::sample_archive(query.date.as_deref())?;
    let disposition = format!("attachment; filename=\"{SAMPLE_ARCHIVE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/leaderboard",
    tag = "stats",
    params(LeaderboardQuery),
    responses((status = 200, description = "Ranked users", body = [LeaderboardEntry]))
)]
/// Rank users by credited guesses (day) or active days (week, all).
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(leaderboard_service::leaderboard(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/stats/global",
    tag = "stats",
    responses((status = 200, description = "Site-wide highlights", body = GlobalStatsResponse))
)]
/// Site-wide highlights.
pub async fn global_stats(
    State(state): State<SharedState>,
) -> Result<Json<GlobalStatsResponse>, AppError> {
    Ok(Json(stats_service::global_stats(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/openings",
    tag = "openings",
    params(OpeningsQuery),
    responses((status = 200, description = "Scheduled openings", body = [OpeningResponse]))
)]
/// List opening clips, optionally for a single day.
pub async fn list_openings(
    State(state): State<SharedState>,
    Query(query): Query<OpeningsQuery>,
) -> Result<Json<Vec<OpeningResponse>>, AppError> {
    Ok(Json(opening_service::list_openings(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/battle-results",
    tag = "battles",
    params(BattleResultsQuery),
    responses((status = 200, description = "Battle results, best first", body = [BattleResultResponse]))
)]
/// List battle results, optionally filtered by day or user.
pub async fn list_battle_results(
    State(state): State<SharedState>,
    Query(query): Query<BattleResultsQuery>,
) -> Result<Json<Vec<BattleResultResponse>>, AppError> {
    Ok(Json(battle_service::list_results(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/news",
    tag = "news",
    params(NewsQuery),
    responses((status = 200, description = "One page of announcements", body = NewsListResponse))
)]
/// List site announcements, newest first.
pub async fn list_news(
    State(state): State<SharedState>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsListResponse>, AppError> {
    Ok(Json(news_service::list_news(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/battle-packs",
    tag = "battles",
    responses((status = 200, description = "Battle packs, newest first", body = BattlePacksResponse))
)]
/// List battle packs, newest first.
pub async fn list_battle_packs(
    State(state): State<SharedState>,
) -> Result<Json<BattlePacksResponse>, AppError> {
    Ok(Json(battle_pack_service::list_packs(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/battles/{pack_id}",
    tag = "battles",
    params(("pack_id" = Uuid, Path, description = "Battle pack")),
    responses((status = 200, description = "Contenders of the pack", body = BattleAnimeListResponse))
)]
/// List the anime contenders of a battle pack.
pub async fn list_battle_anime(
    State(state): State<SharedState>,
    Path(pack_id): Path<Uuid>,
) -> Result<Json<BattleAnimeListResponse>, AppError> {
    Ok(Json(battle_pack_service::list_anime(&state, pack_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/game-history",
    tag = "stats",
    params(
        ("id" = String, Path, description = "User whose games are listed"),
        GameHistoryQuery
    ),
    responses((status = 200, description = "Latest games, newest first", body = [GameHistoryEntry]))
)]
/// Merge a user's score submissions and battle days into one timeline.
pub async fn game_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<GameHistoryQuery>,
) -> Result<Json<Vec<GameHistoryEntry>>, AppError> {
    Ok(Json(history_service::game_history(&state, &id, query).await?))
}
