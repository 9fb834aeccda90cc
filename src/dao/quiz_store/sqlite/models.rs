use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::{Row, sqlite::SqliteRow};
use uuid::Uuid;

use super::error::{SqliteDaoError, SqliteResult};
use crate::dao::models::{
    BattleAnimeEntity, BattleDayEntity, BattlePackEntity, BattleResultEntity, NewsEntity,
    OpeningEntity, QuizItemEntity, ScoreEntity,
};
use crate::quiz_date::QuizDate;

pub(super) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_items (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    title TEXT NOT NULL,
    anime_id TEXT NOT NULL,
    source_id TEXT,
    quiz_date TEXT NOT NULL,
    hint1_ref TEXT,
    hint2_ref TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_quiz_items_date ON quiz_items(quiz_date);

CREATE TABLE IF NOT EXISTS quiz_guesses (
    quiz_item_id TEXT NOT NULL REFERENCES quiz_items(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    guessed_at INTEGER NOT NULL,
    PRIMARY KEY (quiz_item_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_quiz_guesses_user ON quiz_guesses(user_id);

CREATE TABLE IF NOT EXISTS user_scores (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    quiz_type TEXT NOT NULL,
    score REAL NOT NULL,
    quiz_date TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_scores_user ON user_scores(user_id);

CREATE TABLE IF NOT EXISTS battle_results (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    anime_id TEXT NOT NULL,
    wins INTEGER NOT NULL,
    losses INTEGER NOT NULL,
    points INTEGER NOT NULL,
    quiz_date TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_battle_results_date_user ON battle_results(quiz_date, user_id);

CREATE TABLE IF NOT EXISTS openings (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    video_url TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    quiz_date TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    created_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_openings_date ON openings(quiz_date);

CREATE TABLE IF NOT EXISTS news (
    id TEXT PRIMARY KEY,
    author_id TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_news_created ON news(created_at);

CREATE TABLE IF NOT EXISTS battle_packs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_by TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS battle_anime (
    id TEXT PRIMARY KEY,
    pack_id TEXT NOT NULL REFERENCES battle_packs(id) ON DELETE CASCADE,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    anime_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_battle_anime_pack ON battle_anime(pack_id);
"#;

pub(super) const ITEM_COLUMNS: &str = "id, owner_id, image_ref, title, anime_id, source_id, \
     quiz_date, hint1_ref, hint2_ref, created_at";

pub(super) fn to_millis(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(super) fn from_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

pub(super) fn parse_uuid(column: &'static str, raw: String) -> SqliteResult<Uuid> {
    Uuid::parse_str(&raw).map_err(|_| SqliteDaoError::Corrupt { column, value: raw })
}

pub(super) fn parse_date(column: &'static str, raw: String) -> SqliteResult<QuizDate> {
    QuizDate::parse(&raw).map_err(|_| SqliteDaoError::Corrupt { column, value: raw })
}

fn get<'r, T>(row: &'r SqliteRow, column: &'static str) -> SqliteResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(SqliteDaoError::query("decode row"))
}

fn non_negative(column: &'static str, value: i64) -> SqliteResult<u32> {
    u32::try_from(value).map_err(|_| SqliteDaoError::Corrupt {
        column,
        value: value.to_string(),
    })
}

fn non_negative_total(column: &'static str, value: i64) -> SqliteResult<u64> {
    u64::try_from(value).map_err(|_| SqliteDaoError::Corrupt {
        column,
        value: value.to_string(),
    })
}

pub(super) fn item_from_row(row: &SqliteRow) -> SqliteResult<QuizItemEntity> {
    Ok(QuizItemEntity {
        id: parse_uuid("quiz_items.id", get(row, "id")?)?,
        owner_id: get(row, "owner_id")?,
        image_ref: get(row, "image_ref")?,
        title: get(row, "title")?,
        anime_id: get(row, "anime_id")?,
        source_id: get(row, "source_id")?,
        quiz_date: parse_date("quiz_items.quiz_date", get(row, "quiz_date")?)?,
        hint1_ref: get(row, "hint1_ref")?,
        hint2_ref: get(row, "hint2_ref")?,
        created_at: from_millis(get(row, "created_at")?),
    })
}

pub(super) fn battle_result_from_row(row: &SqliteRow) -> SqliteResult<BattleResultEntity> {
    Ok(BattleResultEntity {
        id: parse_uuid("battle_results.id", get(row, "id")?)?,
        user_id: get(row, "user_id")?,
        anime_id: get(row, "anime_id")?,
        wins: non_negative("battle_results.wins", get(row, "wins")?)?,
        losses: non_negative("battle_results.losses", get(row, "losses")?)?,
        points: get(row, "points")?,
        quiz_date: parse_date("battle_results.quiz_date", get(row, "quiz_date")?)?,
        created_at: from_millis(get(row, "created_at")?),
    })
}

pub(super) fn opening_from_row(row: &SqliteRow) -> SqliteResult<OpeningEntity> {
    Ok(OpeningEntity {
        id: parse_uuid("openings.id", get(row, "id")?)?,
        title: get(row, "title")?,
        video_url: get(row, "video_url")?,
        start_time: non_negative("openings.start_time", get(row, "start_time")?)?,
        end_time: non_negative("openings.end_time", get(row, "end_time")?)?,
        quiz_date: parse_date("openings.quiz_date", get(row, "quiz_date")?)?,
        created_at: from_millis(get(row, "created_at")?),
        created_by: get(row, "created_by")?,
    })
}

pub(super) fn score_from_row(row: &SqliteRow) -> SqliteResult<ScoreEntity> {
    Ok(ScoreEntity {
        id: parse_uuid("user_scores.id", get(row, "id")?)?,
        user_id: get(row, "user_id")?,
        quiz_type: get(row, "quiz_type")?,
        score: get(row, "score")?,
        quiz_date: parse_date("user_scores.quiz_date", get(row, "quiz_date")?)?,
        created_at: from_millis(get(row, "created_at")?),
    })
}

pub(super) fn battle_day_from_row(row: &SqliteRow) -> SqliteResult<BattleDayEntity> {
    Ok(BattleDayEntity {
        quiz_date: parse_date("battle_results.quiz_date", get(row, "quiz_date")?)?,
        points: get(row, "points")?,
        wins: non_negative_total("battle_results.wins", get(row, "wins")?)?,
        losses: non_negative_total("battle_results.losses", get(row, "losses")?)?,
        last_at: from_millis(get(row, "last_at")?),
    })
}

pub(super) fn news_from_row(row: &SqliteRow) -> SqliteResult<NewsEntity> {
    Ok(NewsEntity {
        id: parse_uuid("news.id", get(row, "id")?)?,
        author_id: get(row, "author_id")?,
        text: get(row, "text")?,
        created_at: from_millis(get(row, "created_at")?),
    })
}

pub(super) fn battle_pack_from_row(row: &SqliteRow) -> SqliteResult<BattlePackEntity> {
    Ok(BattlePackEntity {
        id: parse_uuid("battle_packs.id", get(row, "id")?)?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        created_by: get(row, "created_by")?,
        created_at: from_millis(get(row, "created_at")?),
    })
}

pub(super) fn battle_anime_from_row(row: &SqliteRow) -> SqliteResult<BattleAnimeEntity> {
    Ok(BattleAnimeEntity {
        id: parse_uuid("battle_anime.id", get(row, "id")?)?,
        pack_id: parse_uuid("battle_anime.pack_id", get(row, "pack_id")?)?,
        owner_id: get(row, "owner_id")?,
        title: get(row, "title")?,
        image_ref: get(row, "image_ref")?,
        anime_id: get(row, "anime_id")?,
        source_id: get(row, "source_id")?,
        created_at: from_millis(get(row, "created_at")?),
    })
}
