use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    middleware,
    routing::{delete, patch, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        batch::{BatchArchiveForm, BatchIngestResponse, BatchValidateResponse},
        battle_pack::{BattleAnimeForm, BattleContentCreated, BattlePackRequest},
        item::{DeleteResponse, QuizItemResponse, ReplacePackForm, ReplacePackResponse, UploadItemForm},
        news::{NewsRequest, NewsResponse},
        opening::{CreateOpeningRequest, CreateOpeningResponse},
        user::{UpsertUserRequest, UserResponse},
    },
    error::AppError,
    routes::{
        identity::{Identity, require_admin},
        multipart::MultipartForm,
    },
    services::{
        batch_service,
        battle_pack_service::{self, BattleAnimeInput},
        directory_service, news_service, opening_service,
        pack_service::{self, PACK_SIZE, PackSlot, ReplacePackInput, UploadItemInput},
    },
    state::SharedState,
};

/// Admin-only content management endpoints.
pub fn router(state: &SharedState) -> Router<SharedState> {
    Router::new()
        .route("/api/packs", post(replace_pack))
        .route("/api/anime-guesses", post(upload_item))
        .route("/api/anime-guesses/{id}", delete(delete_item))
        .route("/api/anime-guesses/batch", post(ingest_batch))
        .route("/api/anime-guesses/batch/validate", post(validate_batch))
        .route("/api/openings", post(create_opening))
        .route("/api/openings/{id}", delete(delete_opening))
        .route("/api/users/{id}", put(upsert_user))
        .route("/api/news", post(create_news))
        .route("/api/news/{id}", patch(update_news).delete(delete_news))
        .route("/api/battle-packs", post(create_battle_pack))
        .route("/api/battles", post(create_battle_anime))
        .route_layer(middleware::from_fn(require_admin))
        .layer(DefaultBodyLimit::max(state.config().max_upload_bytes))
}

#[utoipa::path(
    post,
    path = "/api/packs",
    tag = "admin",
    params(
        ("x-user-id" = String, Header, description = "Authenticated user id"),
        ("x-user-admin" = String, Header, description = "`true` for administrators")
    ),
    request_body(content = ReplacePackForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Pack replaced", body = ReplacePackResponse),
        (status = 400, description = "Invalid date, slot count, title or image"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
/// Atomically replace a day's pack with four new items.
pub async fn replace_pack(
    State(state): State<SharedState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<ReplacePackResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = ReplacePackInput {
        quiz_date: form.text("quizDate").unwrap_or_default(),
        slots: (1..=PACK_SIZE)
            .map(|n| PackSlot {
                image: form.take_file(&format!("image{n}")),
                title: form.text(&format!("title{n}")).unwrap_or_default(),
                anime_id: form.text(&format!("animeId{n}")),
                source_id: form.text(&format!("sourceId{n}")),
                hint1: form.take_file(&format!("hint1_{n}")),
                hint2: form.take_file(&format!("hint2_{n}")),
            })
            .collect(),
    };

    let response = pack_service::replace_pack(&state, &identity.user_id, input).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/anime-guesses",
    tag = "admin",
    request_body(content = UploadItemForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Item created", body = QuizItemResponse),
        (status = 400, description = "Missing title, animeId or image")
    )
)]
/// Add one item to a day without replacing its pack.
pub async fn upload_item(
    State(state): State<SharedState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<QuizItemResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = UploadItemInput {
        image: form.take_file("image"),
        title: form.text("title").unwrap_or_default(),
        anime_id: form.text("animeId").unwrap_or_default(),
        source_id: form.text("sourceId"),
        quiz_date: form.text("quizDate"),
    };

    let response = pack_service::upload_item(&state, &identity.user_id, input).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/anime-guesses/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Quiz item to delete")),
    responses(
        (status = 200, description = "Item and its credits deleted", body = DeleteResponse),
        (status = 404, description = "Unknown quiz item")
    )
)]
/// Delete a quiz item with its credits and stored images.
pub async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    Ok(Json(pack_service::delete_item(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/anime-guesses/batch",
    tag = "batch",
    request_body(content = BatchArchiveForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Rows ingested; failures reported per row, `timedOut` when the deadline cut the run short", body = BatchIngestResponse),
        (status = 400, description = "Missing archive or manifest")
    )
)]
/// Ingest a zip archive described by its `manifest.csv`.
pub async fn ingest_batch(
    State(state): State<SharedState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<BatchIngestResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let archive = form
        .take_file("archive")
        .ok_or_else(|| AppError::BadRequest("archive is required".into()))?;

    let response =
        batch_service::ingest_archive(&state, &identity.user_id, archive.bytes, form.text("quizDate"))
            .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/anime-guesses/batch/validate",
    tag = "batch",
    request_body(content = BatchArchiveForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Dry-run report", body = BatchValidateResponse),
        (status = 400, description = "Missing archive or manifest")
    )
)]
/// Check which manifest rows resolve to a file, without writing anything.
pub async fn validate_batch(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<BatchValidateResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let archive = form
        .take_file("archive")
        .ok_or_else(|| AppError::BadRequest("archive is required".into()))?;

    let report = batch_service::validate_archive(archive.bytes, state.config().batch.max_rows)?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/openings",
    tag = "admin",
    request_body = CreateOpeningRequest,
    responses(
        (status = 200, description = "Opening created", body = CreateOpeningResponse),
        (status = 400, description = "Invalid date, title, URL or offsets")
    )
)]
/// Schedule an opening clip.
pub async fn create_opening(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<CreateOpeningRequest>>,
) -> Result<Json<CreateOpeningResponse>, AppError> {
    let response = opening_service::create_opening(&state, &identity.user_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/openings/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Opening to delete")),
    responses(
        (status = 200, description = "Opening deleted", body = DeleteResponse),
        (status = 404, description = "Unknown opening")
    )
)]
/// Delete an opening clip.
pub async fn delete_opening(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    Ok(Json(opening_service::delete_opening(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "User id issued by the identity provider")),
    request_body = UpsertUserRequest,
    responses((status = 200, description = "Directory entry stored", body = UserResponse))
)]
/// Record the display name used for a user in rankings.
pub async fn upsert_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<UpsertUserRequest>>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(directory_service::upsert_user(&state, &id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/news",
    tag = "news",
    request_body = NewsRequest,
    responses(
        (status = 200, description = "Announcement published", body = NewsResponse),
        (status = 400, description = "Blank or overlong text")
    )
)]
/// Publish an announcement.
pub async fn create_news(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<NewsRequest>>,
) -> Result<Json<NewsResponse>, AppError> {
    Ok(Json(news_service::create_news(&state, &identity.user_id, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/api/news/{id}",
    tag = "news",
    params(("id" = Uuid, Path, description = "Announcement to edit")),
    request_body = NewsRequest,
    responses(
        (status = 200, description = "Announcement edited and moved to the top", body = NewsResponse),
        (status = 404, description = "Unknown announcement")
    )
)]
/// Replace an announcement's text; the edit time becomes its publication time.
pub async fn update_news(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<NewsRequest>>,
) -> Result<Json<NewsResponse>, AppError> {
    Ok(Json(news_service::update_news(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/news/{id}",
    tag = "news",
    params(("id" = Uuid, Path, description = "Announcement to delete")),
    responses(
        (status = 200, description = "Announcement deleted", body = DeleteResponse),
        (status = 404, description = "Unknown announcement")
    )
)]
/// Delete an announcement.
pub async fn delete_news(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    Ok(Json(news_service::delete_news(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/battle-packs",
    tag = "battles",
    request_body = BattlePackRequest,
    responses(
        (status = 200, description = "Battle pack created", body = BattleContentCreated),
        (status = 400, description = "Missing name or overlong description")
    )
)]
/// Create a battle pack.
pub async fn create_battle_pack(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<BattlePackRequest>>,
) -> Result<Json<BattleContentCreated>, AppError> {
    let response = battle_pack_service::create_pack(&state, &identity.user_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/battles",
    tag = "battles",
    request_body(content = BattleAnimeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Contender added", body = BattleContentCreated),
        (status = 400, description = "Missing image, title, animeId or packId"),
        (status = 404, description = "Unknown battle pack")
    )
)]
/// Add an anime contender, with its image, to a battle pack.
pub async fn create_battle_anime(
    State(state): State<SharedState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<BattleContentCreated>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = BattleAnimeInput {
        image: form.take_file("image"),
        title: form.text("title").unwrap_or_default(),
        anime_id: form.text("animeId").unwrap_or_default(),
        pack_id: form.text("packId").unwrap_or_default(),
        source_id: form.text("sourceId"),
    };

    let response = battle_pack_service::create_anime(&state, &identity.user_id, input).await?;
    Ok(Json(response))
}
