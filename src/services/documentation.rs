use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz backend.
#[openapi(
    info(title = "aniguess-back", description = "Daily guess-the-anime quiz engine"),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::list_items,
        crate::routes::public::list_dates,
        crate::routes::public::sample_archive,
        crate::routes::public::leaderboard,
        crate::routes::public::global_stats,
        crate::routes::public::list_openings,
        crate::routes::public::list_battle_results,
        crate::routes::public::list_news,
        crate::routes::public::list_battle_packs,
        crate::routes::public::list_battle_anime,
        crate::routes::public::game_history,
        crate::routes::player::check_answer,
        crate::routes::player::my_stats,
        crate::routes::player::submit_score,
        crate::routes::player::submit_battle_results,
        crate::routes::admin::replace_pack,
        crate::routes::admin::upload_item,
        crate::routes::admin::delete_item,
        crate::routes::admin::ingest_batch,
        crate::routes::admin::validate_batch,
        crate::routes::admin::create_opening,
        crate::routes::admin::delete_opening,
        crate::routes::admin::upsert_user,
        crate::routes::admin::create_news,
        crate::routes::admin::update_news,
        crate::routes::admin::delete_news,
        crate::routes::admin::create_battle_pack,
        crate::routes::admin::create_battle_anime,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::item::QuizItemResponse,
            crate::dto::item::ReplacePackForm,
            crate::dto::item::ReplacePackResponse,
            crate::dto::item::UploadItemForm,
            crate::dto::item::ItemListResponse,
            crate::dto::item::Pagination,
            crate::dto::item::DeleteResponse,
            crate::dto::answer::CheckAnswerRequest,
            crate::dto::answer::CheckAnswerResponse,
            crate::dto::score::SubmitScoreRequest,
            crate::dto::score::SubmitScoreResponse,
            crate::dto::battle::BattleOutcomeInput,
            crate::dto::battle::BattleResultsRequest,
            crate::dto::battle::BattleResultResponse,
            crate::dto::battle::BattleResultsSaved,
            crate::dto::leaderboard::LeaderboardEntry,
            crate::dto::leaderboard::LeaderboardMetric,
            crate::dto::stats::UserStatsResponse,
            crate::dto::stats::GlobalStatsResponse,
            crate::dto::opening::CreateOpeningRequest,
            crate::dto::opening::CreateOpeningResponse,
            crate::dto::opening::OpeningResponse,
            crate::dto::batch::BatchArchiveForm,
            crate::dto::batch::BatchIngestResponse,
            crate::dto::batch::BatchValidateResponse,
            crate::dto::user::UpsertUserRequest,
            crate::dto::user::UserResponse,
            crate::dto::news::NewsRequest,
            crate::dto::news::NewsAuthor,
            crate::dto::news::NewsResponse,
            crate::dto::news::NewsListResponse,
            crate::dto::battle_pack::BattlePackRequest,
            crate::dto::battle_pack::BattlePackResponse,
            crate::dto::battle_pack::BattlePacksResponse,
            crate::dto::battle_pack::BattleAnimeResponse,
            crate::dto::battle_pack::BattleAnimeListResponse,
            crate::dto::battle_pack::BattleAnimeForm,
            crate::dto::battle_pack::BattleContentCreated,
            crate::dto::history::GameHistoryEntry,
            crate::dto::history::GameResult,
            crate::quiz_date::QuizDate,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "packs", description = "Daily packs and their items"),
        (name = "batch", description = "Archive ingestion"),
        (name = "player", description = "Operations on behalf of the authenticated player"),
        (name = "stats", description = "Leaderboards and statistics"),
        (name = "openings", description = "Opening clips"),
        (name = "battles", description = "Battle packs, contenders and results"),
        (name = "news", description = "Site announcements"),
        (name = "admin", description = "Content administration"),
    )
)]
pub struct ApiDoc;
