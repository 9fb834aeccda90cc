use std::{collections::HashMap, time::SystemTime};

use futures::future::BoxFuture;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    config::SqliteConfig,
    error::{SqliteDaoError, SqliteResult},
    models::{
        ITEM_COLUMNS, SCHEMA_SQL, battle_anime_from_row, battle_day_from_row,
        battle_pack_from_row, battle_result_from_row, item_from_row, news_from_row,
        opening_from_row, parse_date, parse_uuid, score_from_row, to_millis,
    },
};
use crate::dao::{
    models::{
        BattleAnimeEntity, BattleDayEntity, BattlePackEntity, BattleResultEntity,
        BattleResultFilter, DateWindow, GlobalStatsEntity, GuessActivityEntity, GuessEntity,
        NewsEntity, OpeningEntity, QuizItemEntity, QuizTypePlays, ScoreEntity, TitleGuessCount,
        UserEntity, UserTotal,
    },
    quiz_store::QuizStore,
    storage::StorageResult,
};
use crate::quiz_date::QuizDate;

/// SQLite-backed [`QuizStore`] implementation.
#[derive(Clone)]
pub struct SqliteQuizStore {
    pool: SqlitePool,
}

async fn insert_item_row(
    conn: &mut SqliteConnection,
    item: &QuizItemEntity,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quiz_items (id, owner_id, image_ref, title, anime_id, source_id, quiz_date, \
         hint1_ref, hint2_ref, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item.id.to_string())
    .bind(&item.owner_id)
    .bind(&item.image_ref)
    .bind(&item.title)
    .bind(&item.anime_id)
    .bind(&item.source_id)
    .bind(item.quiz_date.to_string())
    .bind(&item.hint1_ref)
    .bind(&item.hint2_ref)
    .bind(to_millis(item.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_battle_row(
    conn: &mut SqliteConnection,
    result: &BattleResultEntity,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO battle_results (id, user_id, anime_id, wins, losses, points, quiz_date, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(result.id.to_string())
    .bind(&result.user_id)
    .bind(&result.anime_id)
    .bind(i64::from(result.wins))
    .bind(i64::from(result.losses))
    .bind(result.points)
    .bind(result.quiz_date.to_string())
    .bind(to_millis(result.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl SqliteQuizStore {
    /// Open (or create) the database and apply the schema.
    pub async fn connect(config: SqliteConfig) -> SqliteResult<Self> {
        let options = config.connect_options()?;

        if !config.is_memory()
            && let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SqliteDaoError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let pool = config
            .pool_options()
            .connect_with(options)
            .await
            .map_err(|source| SqliteDaoError::Connect {
                url: config.url.clone(),
                source,
            })?;

        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(|source| SqliteDaoError::Schema { source })?;

        info!(url = %config.url, "SQLite quiz store ready");
        Ok(Self { pool })
    }

    async fn ping(&self) -> SqliteResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| SqliteDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn insert_item(&self, item: QuizItemEntity) -> SqliteResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(SqliteDaoError::query("insert item"))?;
        insert_item_row(&mut conn, &item)
            .await
            .map_err(SqliteDaoError::query("insert item"))
    }

    async fn replace_pack(&self, quiz_date: QuizDate, items: Vec<QuizItemEntity>) -> SqliteResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(SqliteDaoError::query("begin pack replacement"))?;

        let removed = sqlx::query("DELETE FROM quiz_items WHERE quiz_date = ?")
            .bind(quiz_date.to_string())
            .execute(&mut *tx)
            .await
            .map_err(SqliteDaoError::query("delete pack"))?
            .rows_affected();

        for item in &items {
            if let Err(source) = insert_item_row(&mut tx, item).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, %quiz_date, "failed to roll back pack replacement");
                }
                return Err(SqliteDaoError::Query {
                    operation: "insert pack item",
                    source,
                });
            }
        }

        tx.commit()
            .await
            .map_err(SqliteDaoError::query("commit pack replacement"))?;
        Ok(removed)
    }

    async fn find_item(&self, id: Uuid) -> SqliteResult<Option<QuizItemEntity>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM quiz_items WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(SqliteDaoError::query("find item"))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn delete_item(&self, id: Uuid) -> SqliteResult<bool> {
        let result = sqlx::query("DELETE FROM quiz_items WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(SqliteDaoError::query("delete item"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_items(&self, quiz_date: QuizDate) -> SqliteResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_items WHERE quiz_date = ?")
            .bind(quiz_date.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(SqliteDaoError::query("count items"))?;
        Ok(to_count(total))
    }

    async fn list_items(
        &self,
        quiz_date: QuizDate,
        limit: u32,
        offset: u64,
    ) -> SqliteResult<Vec<QuizItemEntity>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM quiz_items WHERE quiz_date = ? \
             ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?"
        ))
        .bind(quiz_date.to_string())
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("list items"))?;

        rows.iter().map(item_from_row).collect()
    }

    async fn list_dates(&self) -> SqliteResult<Vec<QuizDate>> {
        let raw: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT quiz_date FROM quiz_items ORDER BY quiz_date DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(SqliteDaoError::query("list dates"))?;
        raw.into_iter()
            .map(|value| parse_date("quiz_items.quiz_date", value))
            .collect()
    }

    async fn latest_quiz_date(&self) -> SqliteResult<Option<QuizDate>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT MAX(quiz_date) FROM quiz_items")
            .fetch_one(&self.pool)
            .await
            .map_err(SqliteDaoError::query("latest quiz date"))?;
        raw.map(|value| parse_date("quiz_items.quiz_date", value))
            .transpose()
    }

    async fn record_guess(&self, guess: GuessEntity) -> SqliteResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO quiz_guesses (quiz_item_id, user_id, guessed_at) VALUES (?, ?, ?)",
        )
        .bind(guess.quiz_item_id.to_string())
        .bind(&guess.user_id)
        .bind(to_millis(guess.guessed_at))
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("record guess"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn guessers(&self, item_ids: Vec<Uuid>) -> SqliteResult<HashMap<Uuid, Vec<String>>> {
        let mut guessers: HashMap<Uuid, Vec<String>> = HashMap::new();
        if item_ids.is_empty() {
            return Ok(guessers);
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT quiz_item_id, user_id FROM quiz_guesses WHERE quiz_item_id IN (");
        let mut ids = builder.separated(", ");
        for id in &item_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(") ORDER BY guessed_at ASC, rowid ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(SqliteDaoError::query("list guessers"))?;

        for row in rows {
            let item_id: String = row
                .try_get("quiz_item_id")
                .map_err(SqliteDaoError::query("decode guesser"))?;
            let user_id: String = row
                .try_get("user_id")
                .map_err(SqliteDaoError::query("decode guesser"))?;
            guessers
                .entry(parse_uuid("quiz_guesses.quiz_item_id", item_id)?)
                .or_default()
                .push(user_id);
        }
        Ok(guessers)
    }

    async fn user_guess_dates(&self, user_id: String) -> SqliteResult<Vec<QuizDate>> {
        let raw: Vec<String> = sqlx::query_scalar(
            "SELECT i.quiz_date FROM quiz_guesses g \
             JOIN quiz_items i ON i.id = g.quiz_item_id WHERE g.user_id = ?",
        )
        .bind(&user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("user guess dates"))?;
        raw.into_iter()
            .map(|value| parse_date("quiz_items.quiz_date", value))
            .collect()
    }

    async fn guess_activity(&self, window: Option<DateWindow>) -> SqliteResult<Vec<GuessActivityEntity>> {
        const BASE: &str = "SELECT g.user_id, i.quiz_date FROM quiz_guesses g \
                            JOIN quiz_items i ON i.id = g.quiz_item_id";

        let rows = match window {
            Some(window) => {
                sqlx::query(&format!("{BASE} WHERE i.quiz_date BETWEEN ? AND ?"))
                    .bind(window.from.to_string())
                    .bind(window.to.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => sqlx::query(BASE).fetch_all(&self.pool).await,
        }
        .map_err(SqliteDaoError::query("guess activity"))?;

        rows.iter()
            .map(|row| {
                let user_id: String = row
                    .try_get("user_id")
                    .map_err(SqliteDaoError::query("decode guess activity"))?;
                let quiz_date: String = row
                    .try_get("quiz_date")
                    .map_err(SqliteDaoError::query("decode guess activity"))?;
                Ok(GuessActivityEntity {
                    user_id,
                    quiz_date: parse_date("quiz_items.quiz_date", quiz_date)?,
                })
            })
            .collect()
    }

    async fn insert_score(&self, score: ScoreEntity) -> SqliteResult<()> {
        sqlx::query(
            "INSERT INTO user_scores (id, user_id, quiz_type, score, quiz_date, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(score.id.to_string())
        .bind(&score.user_id)
        .bind(&score.quiz_type)
        .bind(score.score)
        .bind(score.quiz_date.to_string())
        .bind(to_millis(score.created_at))
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("insert score"))?;
        Ok(())
    }

    async fn replace_battle_results(
        &self,
        user_id: String,
        quiz_date: QuizDate,
        results: Vec<BattleResultEntity>,
    ) -> SqliteResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(SqliteDaoError::query("begin battle replacement"))?;

        sqlx::query("DELETE FROM battle_results WHERE user_id = ? AND quiz_date = ?")
            .bind(&user_id)
            .bind(quiz_date.to_string())
            .execute(&mut *tx)
            .await
            .map_err(SqliteDaoError::query("delete battle results"))?;

        for result in &results {
            if let Err(source) = insert_battle_row(&mut tx, result).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, %quiz_date, "failed to roll back battle results");
                }
                return Err(SqliteDaoError::Query {
                    operation: "insert battle result",
                    source,
                });
            }
        }

        tx.commit()
            .await
            .map_err(SqliteDaoError::query("commit battle results"))
    }

    async fn list_battle_results(&self, filter: BattleResultFilter) -> SqliteResult<Vec<BattleResultEntity>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, anime_id, wins, losses, points, quiz_date, created_at \
             FROM battle_results WHERE 1 = 1",
        );
        if let Some(quiz_date) = filter.quiz_date {
            builder.push(" AND quiz_date = ").push_bind(quiz_date.to_string());
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder.push(" ORDER BY points DESC, wins DESC, created_at ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(SqliteDaoError::query("list battle results"))?;
        rows.iter().map(battle_result_from_row).collect()
    }

    async fn insert_opening(&self, opening: OpeningEntity) -> SqliteResult<()> {
        sqlx::query(
            "INSERT INTO openings (id, title, video_url, start_time, end_time, quiz_date, \
             created_at, created_by) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(opening.id.to_string())
        .bind(&opening.title)
        .bind(&opening.video_url)
        .bind(i64::from(opening.start_time))
        .bind(i64::from(opening.end_time))
        .bind(opening.quiz_date.to_string())
        .bind(to_millis(opening.created_at))
        .bind(&opening.created_by)
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("insert opening"))?;
        Ok(())
    }

    async fn list_openings(&self, quiz_date: Option<QuizDate>) -> SqliteResult<Vec<OpeningEntity>> {
        const BASE: &str = "SELECT id, title, video_url, start_time, end_time, quiz_date, \
                            created_at, created_by FROM openings";
        const ORDER: &str = "ORDER BY quiz_date DESC, created_at DESC";

        let rows = match quiz_date {
            Some(quiz_date) => {
                sqlx::query(&format!("{BASE} WHERE quiz_date = ? {ORDER}"))
                    .bind(quiz_date.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query(&format!("{BASE} {ORDER}"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(SqliteDaoError::query("list openings"))?;

        rows.iter().map(opening_from_row).collect()
    }

    async fn delete_opening(&self, id: Uuid) -> SqliteResult<bool> {
        let result = sqlx::query("DELETE FROM openings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(SqliteDaoError::query("delete opening"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_news(&self, news: NewsEntity) -> SqliteResult<()> {
        sqlx::query("INSERT INTO news (id, author_id, text, created_at) VALUES (?, ?, ?, ?)")
            .bind(news.id.to_string())
            .bind(&news.author_id)
            .bind(&news.text)
            .bind(to_millis(news.created_at))
            .execute(&self.pool)
            .await
            .map_err(SqliteDaoError::query("insert news"))?;
        Ok(())
    }

    async fn count_news(&self) -> SqliteResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await
            .map_err(SqliteDaoError::query("count news"))?;
        Ok(to_count(count))
    }

    async fn list_news(&self, limit: u32, offset: u64) -> SqliteResult<Vec<NewsEntity>> {
        let rows = sqlx::query(
            "SELECT id, author_id, text, created_at FROM news \
             ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("list news"))?;
        rows.iter().map(news_from_row).collect()
    }

    async fn update_news(
        &self,
        id: Uuid,
        text: String,
        at: SystemTime,
    ) -> SqliteResult<Option<NewsEntity>> {
        let row = sqlx::query(
            "UPDATE news SET text = ?, created_at = ? WHERE id = ? \
             RETURNING id, author_id, text, created_at",
        )
        .bind(&text)
        .bind(to_millis(at))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SqliteDaoError::query("update news"))?;
        row.as_ref().map(news_from_row).transpose()
    }

    async fn delete_news(&self, id: Uuid) -> SqliteResult<bool> {
        let result = sqlx::query("DELETE FROM news WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(SqliteDaoError::query("delete news"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_battle_pack(&self, pack: BattlePackEntity) -> SqliteResult<()> {
        sqlx::query(
            "INSERT INTO battle_packs (id, name, description, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(pack.id.to_string())
        .bind(&pack.name)
        .bind(&pack.description)
        .bind(&pack.created_by)
        .bind(to_millis(pack.created_at))
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("insert battle pack"))?;
        Ok(())
    }

    async fn list_battle_packs(&self) -> SqliteResult<Vec<BattlePackEntity>> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_by, created_at FROM battle_packs \
             ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("list battle packs"))?;
        rows.iter().map(battle_pack_from_row).collect()
    }

    async fn find_battle_pack(&self, id: Uuid) -> SqliteResult<Option<BattlePackEntity>> {
        let row = sqlx::query(
            "SELECT id, name, description, created_by, created_at FROM battle_packs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SqliteDaoError::query("find battle pack"))?;
        row.as_ref().map(battle_pack_from_row).transpose()
    }

    async fn insert_battle_anime(&self, anime: BattleAnimeEntity) -> SqliteResult<()> {
        sqlx::query(
            "INSERT INTO battle_anime (id, pack_id, owner_id, title, image_ref, anime_id, \
             source_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(anime.id.to_string())
        .bind(anime.pack_id.to_string())
        .bind(&anime.owner_id)
        .bind(&anime.title)
        .bind(&anime.image_ref)
        .bind(&anime.anime_id)
        .bind(&anime.source_id)
        .bind(to_millis(anime.created_at))
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("insert battle anime"))?;
        Ok(())
    }

    async fn list_battle_anime(&self, pack_id: Uuid) -> SqliteResult<Vec<BattleAnimeEntity>> {
        let rows = sqlx::query(
            "SELECT id, pack_id, owner_id, title, image_ref, anime_id, source_id, created_at \
             FROM battle_anime WHERE pack_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(pack_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("list battle anime"))?;
        rows.iter().map(battle_anime_from_row).collect()
    }

    async fn recent_scores(&self, user_id: String, limit: u32) -> SqliteResult<Vec<ScoreEntity>> {
        let rows = sqlx::query(
            "SELECT id, user_id, quiz_type, score, quiz_date, created_at FROM user_scores \
             WHERE user_id = ? ORDER BY created_at DESC, id ASC LIMIT ?",
        )
        .bind(&user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("recent scores"))?;
        rows.iter().map(score_from_row).collect()
    }

    async fn battle_days(&self, user_id: String, limit: u32) -> SqliteResult<Vec<BattleDayEntity>> {
        let rows = sqlx::query(
            "SELECT quiz_date, SUM(points) AS points, SUM(wins) AS wins, \
             SUM(losses) AS losses, MAX(created_at) AS last_at FROM battle_results \
             WHERE user_id = ? GROUP BY quiz_date ORDER BY last_at DESC, quiz_date DESC LIMIT ?",
        )
        .bind(&user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("battle days"))?;
        rows.iter().map(battle_day_from_row).collect()
    }

    async fn upsert_user(&self, user: UserEntity) -> SqliteResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET username = excluded.username",
        )
        .bind(&user.id)
        .bind(&user.username)
        .execute(&self.pool)
        .await
        .map_err(SqliteDaoError::query("upsert user"))?;
        Ok(())
    }

    async fn user_names(&self, user_ids: Vec<String>) -> SqliteResult<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT id, username FROM users WHERE id IN (");
        let mut ids = builder.separated(", ");
        for id in &user_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(SqliteDaoError::query("user names"))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(SqliteDaoError::query("decode user"))?;
                let username: String = row
                    .try_get("username")
                    .map_err(SqliteDaoError::query("decode user"))?;
                Ok((id, username))
            })
            .collect()
    }

    async fn global_stats(&self, limit: u32) -> SqliteResult<GlobalStatsEntity> {
        let limit = i64::from(limit);

        let most_guessed = sqlx::query(
            "SELECT i.title AS title, COUNT(*) AS guesses FROM quiz_guesses g \
             JOIN quiz_items i ON i.id = g.quiz_item_id \
             GROUP BY i.title ORDER BY guesses DESC, i.title ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("most guessed titles"))?
        .iter()
        .map(|row| {
            Ok(TitleGuessCount {
                title: row
                    .try_get("title")
                    .map_err(SqliteDaoError::query("decode title count"))?,
                guesses: to_count(
                    row.try_get("guesses")
                        .map_err(SqliteDaoError::query("decode title count"))?,
                ),
            })
        })
        .collect::<SqliteResult<Vec<_>>>()?;

        let top_scorers = self
            .user_totals(
                "SELECT user_id, SUM(score) AS total FROM user_scores \
                 GROUP BY user_id ORDER BY total DESC, user_id ASC LIMIT ?",
                limit,
                "top scorers",
            )
            .await?;

        let top_guessers = self
            .user_totals(
                "SELECT user_id, CAST(COUNT(*) AS REAL) AS total FROM quiz_guesses \
                 GROUP BY user_id ORDER BY total DESC, user_id ASC LIMIT ?",
                limit,
                "top guessers",
            )
            .await?;

        let quiz_type_plays = sqlx::query(
            "SELECT quiz_type, COUNT(*) AS plays FROM user_scores \
             GROUP BY quiz_type ORDER BY plays DESC, quiz_type ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteDaoError::query("quiz type plays"))?
        .iter()
        .map(|row| {
            Ok(QuizTypePlays {
                quiz_type: row
                    .try_get("quiz_type")
                    .map_err(SqliteDaoError::query("decode quiz type plays"))?,
                plays: to_count(
                    row.try_get("plays")
                        .map_err(SqliteDaoError::query("decode quiz type plays"))?,
                ),
            })
        })
        .collect::<SqliteResult<Vec<_>>>()?;

        Ok(GlobalStatsEntity {
            most_guessed,
            top_scorers,
            top_guessers,
            quiz_type_plays,
        })
    }

    async fn user_totals(
        &self,
        sql: &'static str,
        limit: i64,
        operation: &'static str,
    ) -> SqliteResult<Vec<UserTotal>> {
        sqlx::query(sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(SqliteDaoError::query(operation))?
            .iter()
            .map(|row| {
                Ok(UserTotal {
                    user_id: row
                        .try_get("user_id")
                        .map_err(SqliteDaoError::query(operation))?,
                    total: row
                        .try_get("total")
                        .map_err(SqliteDaoError::query(operation))?,
                })
            })
            .collect()
    }
}

impl QuizStore for SqliteQuizStore {
    fn insert_item(&self, item: QuizItemEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_item(item).await.map_err(Into::into) })
    }

    fn replace_pack(
        &self,
        quiz_date: QuizDate,
        items: Vec<QuizItemEntity>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_pack(quiz_date, items)
                .await
                .map_err(Into::into)
        })
    }

    fn find_item(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_item(id).await.map_err(Into::into) })
    }

    fn delete_item(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_item(id).await.map_err(Into::into) })
    }

    fn count_items(&self, quiz_date: QuizDate) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_items(quiz_date).await.map_err(Into::into) })
    }

    fn list_items(
        &self,
        quiz_date: QuizDate,
        limit: u32,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_items(quiz_date, limit, offset)
                .await
                .map_err(Into::into)
        })
    }

    fn list_dates(&self) -> BoxFuture<'static, StorageResult<Vec<QuizDate>>> {
        let store = self.clone();
        Box::pin(async move { store.list_dates().await.map_err(Into::into) })
    }

    fn latest_quiz_date(&self) -> BoxFuture<'static, StorageResult<Option<QuizDate>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_quiz_date().await.map_err(Into::into) })
    }

    fn record_guess(&self, guess: GuessEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.record_guess(guess).await.map_err(Into::into) })
    }

    fn guessers(
        &self,
        item_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<HashMap<Uuid, Vec<String>>>> {
        let store = self.clone();
        Box::pin(async move { store.guessers(item_ids).await.map_err(Into::into) })
    }

    fn user_guess_dates(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizDate>>> {
        let store = self.clone();
        Box::pin(async move { store.user_guess_dates(user_id).await.map_err(Into::into) })
    }

    fn guess_activity(
        &self,
        window: Option<DateWindow>,
    ) -> BoxFuture<'static, StorageResult<Vec<GuessActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.guess_activity(window).await.map_err(Into::into) })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_score(score).await.map_err(Into::into) })
    }

    fn replace_battle_results(
        &self,
        user_id: String,
        quiz_date: QuizDate,
        results: Vec<BattleResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_battle_results(user_id, quiz_date, results)
                .await
                .map_err(Into::into)
        })
    }

    fn list_battle_results(
        &self,
        filter: BattleResultFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_battle_results(filter).await.map_err(Into::into) })
    }

    fn insert_opening(&self, opening: OpeningEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_opening(opening).await.map_err(Into::into) })
    }

    fn list_openings(
        &self,
        quiz_date: Option<QuizDate>,
    ) -> BoxFuture<'static, StorageResult<Vec<OpeningEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_openings(quiz_date).await.map_err(Into::into) })
    }

    fn delete_opening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_opening(id).await.map_err(Into::into) })
    }

    fn insert_news(&self, news: NewsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_news(news).await.map_err(Into::into) })
    }

    fn count_news(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_news().await.map_err(Into::into) })
    }

    fn list_news(
        &self,
        limit: u32,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<NewsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_news(limit, offset).await.map_err(Into::into) })
    }

    fn update_news(
        &self,
        id: Uuid,
        text: String,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<NewsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.update_news(id, text, at).await.map_err(Into::into) })
    }

    fn delete_news(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_news(id).await.map_err(Into::into) })
    }

    fn insert_battle_pack(
        &self,
        pack: BattlePackEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_battle_pack(pack).await.map_err(Into::into) })
    }

    fn list_battle_packs(&self) -> BoxFuture<'static, StorageResult<Vec<BattlePackEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_battle_packs().await.map_err(Into::into) })
    }

    fn find_battle_pack(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<BattlePackEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_battle_pack(id).await.map_err(Into::into) })
    }

    fn insert_battle_anime(
        &self,
        anime: BattleAnimeEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_battle_anime(anime).await.map_err(Into::into) })
    }

    fn list_battle_anime(
        &self,
        pack_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleAnimeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_battle_anime(pack_id).await.map_err(Into::into) })
    }

    fn recent_scores(
        &self,
        user_id: String,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.recent_scores(user_id, limit).await.map_err(Into::into) })
    }

    fn battle_days(
        &self,
        user_id: String,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleDayEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.battle_days(user_id, limit).await.map_err(Into::into) })
    }

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_user(user).await.map_err(Into::into) })
    }

    fn user_names(
        &self,
        user_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
        let store = self.clone();
        Box::pin(async move { store.user_names(user_ids).await.map_err(Into::into) })
    }

    fn global_stats(&self, limit: u32) -> BoxFuture<'static, StorageResult<GlobalStatsEntity>> {
        let store = self.clone();
        Box::pin(async move { store.global_stats(limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // the pool re-opens connections on demand; a successful ping is enough
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::super::models::from_millis;
    use super::*;

    fn now() -> SystemTime {
        from_millis(to_millis(SystemTime::now()))
    }

    fn date(value: &str) -> QuizDate {
        QuizDate::parse(value).unwrap()
    }

    fn item(title: &str, quiz_date: &str) -> QuizItemEntity {
        QuizItemEntity {
            id: Uuid::new_v4(),
            owner_id: "admin".into(),
            image_ref: format!("/uploads/{title}.png"),
            title: title.into(),
            anime_id: format!("manual-{title}"),
            source_id: Some("manual".into()),
            quiz_date: date(quiz_date),
            hint1_ref: None,
            hint2_ref: None,
            created_at: now(),
        }
    }

    fn guess(item: &QuizItemEntity, user: &str) -> GuessEntity {
        GuessEntity {
            quiz_item_id: item.id,
            user_id: user.into(),
            quiz_date: item.quiz_date,
            guessed_at: SystemTime::now(),
        }
    }

    async fn store() -> SqliteQuizStore {
        SqliteQuizStore::connect(SqliteConfig::in_memory())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn record_guess_is_insert_if_absent() {
        let store = store().await;
        let naruto = item("Naruto", "2024-01-07");
        store.insert_item(naruto.clone()).await.unwrap();

        assert!(store.record_guess(guess(&naruto, "u1")).await.unwrap());
        assert!(!store.record_guess(guess(&naruto, "u1")).await.unwrap());
        assert!(store.record_guess(guess(&naruto, "u2")).await.unwrap());

        let guessers = store.guessers(vec![naruto.id]).await.unwrap();
        assert_eq!(guessers[&naruto.id], vec!["u1".to_owned(), "u2".to_owned()]);
    }

    #[tokio::test]
    async fn replace_pack_swaps_the_whole_day() {
        let store = store().await;
        let old = item("Old", "2024-01-07");
        let other_day = item("Other", "2024-01-08");
        store.insert_item(old.clone()).await.unwrap();
        store.insert_item(other_day.clone()).await.unwrap();
        store.record_guess(guess(&old, "u1")).await.unwrap();

        let fresh: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|title| item(title, "2024-01-07"))
            .collect();
        let removed = store
            .replace_pack(date("2024-01-07"), fresh.clone())
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let listed = store.list_items(date("2024-01-07"), 50, 0).await.unwrap();
        assert_eq!(listed, fresh);
        assert_eq!(store.count_items(date("2024-01-08")).await.unwrap(), 1);
        assert!(store.user_guess_dates("u1".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_the_delete() {
        let store = store().await;
        let old = item("Old", "2024-01-07");
        store.insert_item(old.clone()).await.unwrap();

        let first = item("A", "2024-01-07");
        let mut duplicate = item("B", "2024-01-07");
        duplicate.id = first.id;

        let result = store
            .replace_pack(date("2024-01-07"), vec![first, duplicate])
            .await;
        assert!(result.is_err());

        let listed = store.list_items(date("2024-01-07"), 50, 0).await.unwrap();
        assert_eq!(listed, vec![old]);
    }

    #[tokio::test]
    async fn delete_item_cascades_ledger_rows() {
        let store = store().await;
        let naruto = item("Naruto", "2024-01-07");
        store.insert_item(naruto.clone()).await.unwrap();
        store.record_guess(guess(&naruto, "u1")).await.unwrap();

        assert!(store.delete_item(naruto.id).await.unwrap());
        assert!(!store.delete_item(naruto.id).await.unwrap());
        assert!(store.guess_activity(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dates_are_listed_most_recent_first() {
        let store = store().await;
        for quiz_date in ["2024-01-02", "2024-01-09", "2024-01-05", "2024-01-09"] {
            store.insert_item(item("x", quiz_date)).await.unwrap();
        }

        assert_eq!(
            store.list_dates().await.unwrap(),
            vec![date("2024-01-09"), date("2024-01-05"), date("2024-01-02")]
        );
        assert_eq!(
            store.latest_quiz_date().await.unwrap(),
            Some(date("2024-01-09"))
        );
    }

    #[tokio::test]
    async fn guess_activity_respects_the_window() {
        let store = store().await;
        let early = item("Early", "2024-01-01");
        let late = item("Late", "2024-01-10");
        store.insert_item(early.clone()).await.unwrap();
        store.insert_item(late.clone()).await.unwrap();
        store.record_guess(guess(&early, "u1")).await.unwrap();
        store.record_guess(guess(&late, "u1")).await.unwrap();

        let window = DateWindow {
            from: date("2024-01-04"),
            to: date("2024-01-10"),
        };
        let activity = store.guess_activity(Some(window)).await.unwrap();
        assert_eq!(
            activity,
            vec![GuessActivityEntity {
                user_id: "u1".into(),
                quiz_date: date("2024-01-10"),
            }]
        );
    }

    #[tokio::test]
    async fn battle_results_are_replaced_per_user_and_day() {
        let store = store().await;
        let result = |anime: &str, points: i64| BattleResultEntity {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            anime_id: anime.into(),
            wins: 1,
            losses: 0,
            points,
            quiz_date: date("2024-01-07"),
            created_at: SystemTime::now(),
        };

        store
            .replace_battle_results("u1".into(), date("2024-01-07"), vec![result("a", 1)])
            .await
            .unwrap();
        store
            .replace_battle_results(
                "u1".into(),
                date("2024-01-07"),
                vec![result("b", 3), result("c", 7)],
            )
            .await
            .unwrap();

        let listed = store
            .list_battle_results(BattleResultFilter::default())
            .await
            .unwrap();
        let animes: Vec<_> = listed.iter().map(|r| r.anime_id.as_str()).collect();
        assert_eq!(animes, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn global_stats_aggregate_ledger_and_scores() {
        let store = store().await;
        let naruto = item("Naruto", "2024-01-07");
        let bleach = item("Bleach", "2024-01-07");
        store.insert_item(naruto.clone()).await.unwrap();
        store.insert_item(bleach.clone()).await.unwrap();
        store.record_guess(guess(&naruto, "u1")).await.unwrap();
        store.record_guess(guess(&naruto, "u2")).await.unwrap();
        store.record_guess(guess(&bleach, "u2")).await.unwrap();

        let scores = [
            ("u1", "openings", 10.0),
            ("u2", "openings", 2.5),
            ("u1", "chars", 1.0),
        ];
        for (user, quiz_type, score) in scores {
            store
                .insert_score(ScoreEntity {
                    id: Uuid::new_v4(),
                    user_id: user.into(),
                    quiz_type: quiz_type.into(),
                    score,
                    quiz_date: date("2024-01-07"),
                    created_at: now() + Duration::from_millis(1),
                })
                .await
                .unwrap();
        }

        let stats = store.global_stats(5).await.unwrap();
        assert_eq!(stats.most_guessed[0].title, "Naruto");
        assert_eq!(stats.most_guessed[0].guesses, 2);
        assert_eq!(stats.top_scorers[0].user_id, "u1");
        assert_eq!(stats.top_scorers[0].total, 11.0);
        assert_eq!(stats.top_guessers[0].user_id, "u2");
        assert_eq!(stats.quiz_type_plays[0].quiz_type, "openings");
        assert_eq!(stats.quiz_type_plays[0].plays, 2);
    }

    #[tokio::test]
    async fn user_directory_upserts_names() {
        let store = store().await;
        store
            .upsert_user(UserEntity {
                id: "u1".into(),
                username: "old".into(),
            })
            .await
            .unwrap();
        store
            .upsert_user(UserEntity {
                id: "u1".into(),
                username: "naruto_fan".into(),
            })
            .await
            .unwrap();

        let names = store
            .user_names(vec!["u1".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["u1"], "naruto_fan");
    }

    fn at(millis: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[tokio::test]
    async fn news_pages_newest_first_and_edits_move_to_the_top() {
        let store = store().await;
        let mut ids = Vec::new();
        for (n, text) in ["first", "second", "third"].into_iter().enumerate() {
            let news = NewsEntity {
                id: Uuid::new_v4(),
                author_id: "admin".into(),
                text: text.into(),
                created_at: at(1_000 * (n as u64 + 1)),
            };
            ids.push(news.id);
            store.insert_news(news).await.unwrap();
        }

        assert_eq!(store.count_news().await.unwrap(), 3);
        let page: Vec<_> = store
            .list_news(2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|news| news.text)
            .collect();
        assert_eq!(page, vec!["third".to_owned(), "second".to_owned()]);

        let edited = store
            .update_news(ids[0], "first, edited".into(), at(9_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.author_id, "admin");
        assert_eq!(store.list_news(1, 0).await.unwrap()[0].text, "first, edited");
        assert!(
            store
                .update_news(Uuid::new_v4(), "ghost".into(), at(1))
                .await
                .unwrap()
                .is_none()
        );

        assert!(store.delete_news(ids[1]).await.unwrap());
        assert!(!store.delete_news(ids[1]).await.unwrap());
        assert_eq!(store.count_news().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn battle_anime_are_listed_per_pack_in_insertion_order() {
        let store = store().await;
        let pack = |name: &str, millis: u64| BattlePackEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            created_by: "admin".into(),
            created_at: at(millis),
        };
        let shonen = pack("Shonen", 1_000);
        let isekai = pack("Isekai", 2_000);
        store.insert_battle_pack(shonen.clone()).await.unwrap();
        store.insert_battle_pack(isekai.clone()).await.unwrap();

        let names: Vec<_> = store
            .list_battle_packs()
            .await
            .unwrap()
            .into_iter()
            .map(|pack| pack.name)
            .collect();
        assert_eq!(names, vec!["Isekai".to_owned(), "Shonen".to_owned()]);
        assert_eq!(store.find_battle_pack(shonen.id).await.unwrap(), Some(shonen.clone()));
        assert_eq!(store.find_battle_pack(Uuid::new_v4()).await.unwrap(), None);

        for (n, title) in ["Naruto", "Bleach"].into_iter().enumerate() {
            store
                .insert_battle_anime(BattleAnimeEntity {
                    id: Uuid::new_v4(),
                    pack_id: shonen.id,
                    owner_id: "admin".into(),
                    title: title.into(),
                    image_ref: format!("/uploads/{title}.png"),
                    anime_id: format!("manual-{title}"),
                    source_id: "manual".into(),
                    created_at: at(5_000 + n as u64),
                })
                .await
                .unwrap();
        }

        let titles: Vec<_> = store
            .list_battle_anime(shonen.id)
            .await
            .unwrap()
            .into_iter()
            .map(|anime| anime.title)
            .collect();
        assert_eq!(titles, vec!["Naruto".to_owned(), "Bleach".to_owned()]);
        assert!(store.list_battle_anime(isekai.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn battle_days_sum_results_per_day() {
        let store = store().await;
        let result = |day: &str, wins: u32, losses: u32, points: i64, millis: u64| {
            BattleResultEntity {
                id: Uuid::new_v4(),
                user_id: "u1".into(),
                anime_id: format!("a{millis}"),
                wins,
                losses,
                points,
                quiz_date: date(day),
                created_at: at(millis),
            }
        };
        store
            .replace_battle_results(
                "u1".into(),
                date("2024-01-06"),
                vec![result("2024-01-06", 2, 1, 5, 1_000), result("2024-01-06", 0, 2, -1, 3_000)],
            )
            .await
            .unwrap();
        store
            .replace_battle_results(
                "u1".into(),
                date("2024-01-07"),
                vec![result("2024-01-07", 1, 0, 2, 2_000)],
            )
            .await
            .unwrap();

        let days = store.battle_days("u1".into(), 10).await.unwrap();
        assert_eq!(
            days,
            vec![
                BattleDayEntity {
                    quiz_date: date("2024-01-06"),
                    points: 4,
                    wins: 2,
                    losses: 3,
                    last_at: at(3_000),
                },
                BattleDayEntity {
                    quiz_date: date("2024-01-07"),
                    points: 2,
                    wins: 1,
                    losses: 0,
                    last_at: at(2_000),
                },
            ]
        );
        assert_eq!(store.battle_days("u1".into(), 1).await.unwrap().len(), 1);
        assert!(store.battle_days("u2".into(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_scores_are_newest_first_and_per_user() {
        let store = store().await;
        for (user, millis) in [("u1", 1_000), ("u1", 3_000), ("u2", 4_000), ("u1", 2_000)] {
            store
                .insert_score(ScoreEntity {
                    id: Uuid::new_v4(),
                    user_id: user.into(),
                    quiz_type: "anime".into(),
                    score: 1.0,
                    quiz_date: date("2024-01-07"),
                    created_at: at(millis),
                })
                .await
                .unwrap();
        }

        let times: Vec<_> = store
            .recent_scores("u1".into(), 2)
            .await
            .unwrap()
            .into_iter()
            .map(|score| score.created_at)
            .collect();
        assert_eq!(times, vec![at(3_000), at(2_000)]);
    }
}
