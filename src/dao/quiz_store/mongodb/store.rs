use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::{sync::RwLock, time::sleep};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoBattleAnimeDocument, MongoBattlePackDocument, MongoBattleResultDocument,
        MongoGuessDocument, MongoNewsDocument, MongoOpeningDocument, MongoQuizItemDocument,
        MongoScoreDocument, MongoUserDocument, doc_id, parse_date, parse_uuid,
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

const ITEMS: &str = "quiz_items";
const GUESSES: &str = "quiz_guesses";
const SCORES: &str = "user_scores";
const BATTLES: &str = "battle_results";
const OPENINGS: &str = "openings";
const USERS: &str = "users";
const NEWS: &str = "news";
const BATTLE_PACKS: &str = "battle_packs";
const BATTLE_ANIME: &str = "battle_anime";

const MAX_CONNECT_ATTEMPTS: u32 = 10;
const BASE_RETRY_DELAY_MS: u64 = 250;

/// MongoDB-backed [`QuizStore`]. Pack and battle replacement use multi-document
/// transactions, so the deployment must be a replica set.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt: u32 = 0;
    let mut delay = Duration::from_millis(BASE_RETRY_DELAY_MS);
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) if attempt >= MAX_CONNECT_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    attempt,
                    wait_ms = delay.as_millis(),
                    error = %err,
                    "MongoDB ping failed during initial connection; retrying"
                );
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }
        }
    }
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

async fn abort(mut session: ClientSession, operation: &'static str) {
    if let Err(err) = session.abort_transaction().await {
        warn!(error = %err, operation, "failed to abort MongoDB transaction");
    }
}

impl MongoQuizStore {
    /// Connect to MongoDB and ensure the indexes backing ledger uniqueness exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;
        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, bool); 7] = [
            (ITEMS, "quiz_date", doc! {"quiz_date": 1}, false),
            (GUESSES, "quiz_item_id,user_id", doc! {"quiz_item_id": 1, "user_id": 1}, true),
            (GUESSES, "user_id", doc! {"user_id": 1}, false),
            (BATTLES, "quiz_date,user_id", doc! {"quiz_date": 1, "user_id": 1}, false),
            (SCORES, "user_id,created_at", doc! {"user_id": 1, "created_at": -1}, false),
            (NEWS, "created_at", doc! {"created_at": -1}, false),
            (BATTLE_ANIME, "pack_id", doc! {"pack_id": 1}, false),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(Some(unique)).build())
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }
        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    async fn client(&self) -> Client {
        self.inner.state.read().await.client.clone()
    }

    async fn items(&self) -> Collection<MongoQuizItemDocument> {
        self.database().await.collection(ITEMS)
    }

    async fn guesses(&self) -> Collection<MongoGuessDocument> {
        self.database().await.collection(GUESSES)
    }

    async fn scores(&self) -> Collection<MongoScoreDocument> {
        self.database().await.collection(SCORES)
    }

    async fn battles(&self) -> Collection<MongoBattleResultDocument> {
        self.database().await.collection(BATTLES)
    }

    async fn openings(&self) -> Collection<MongoOpeningDocument> {
        self.database().await.collection(OPENINGS)
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USERS)
    }

    async fn news(&self) -> Collection<MongoNewsDocument> {
        self.database().await.collection(NEWS)
    }

    async fn battle_packs(&self) -> Collection<MongoBattlePackDocument> {
        self.database().await.collection(BATTLE_PACKS)
    }

    async fn battle_anime(&self) -> Collection<MongoBattleAnimeDocument> {
        self.database().await.collection(BATTLE_ANIME)
    }

    async fn start_transaction(&self, operation: &'static str) -> MongoResult<ClientSession> {
        let mut session = self
            .client()
            .await
            .start_session()
            .await
            .map_err(MongoDaoError::operation(operation))?;
        session
            .start_transaction()
            .await
            .map_err(MongoDaoError::operation(operation))?;
        Ok(session)
    }

    async fn insert_item(&self, item: QuizItemEntity) -> MongoResult<()> {
        self.items()
            .await
            .insert_one(MongoQuizItemDocument::from(&item))
            .await
            .map_err(MongoDaoError::operation("insert item"))?;
        Ok(())
    }

    async fn replace_pack(&self, quiz_date: QuizDate, items: Vec<QuizItemEntity>) -> MongoResult<u64> {
        let date = quiz_date.to_string();
        let documents: Vec<MongoQuizItemDocument> =
            items.iter().map(MongoQuizItemDocument::from).collect();
        let item_collection = self.items().await;
        let guess_collection = self.guesses().await;

        let mut session = self.start_transaction("replace pack").await?;

        let removed = match item_collection
            .delete_many(doc! {"quiz_date": date.as_str()})
            .session(&mut session)
            .await
        {
            Ok(result) => result.deleted_count,
            Err(source) => {
                abort(session, "replace pack").await;
                return Err(MongoDaoError::Operation {
                    operation: "delete pack",
                    source,
                });
            }
        };

        if let Err(source) = guess_collection
            .delete_many(doc! {"quiz_date": date.as_str()})
            .session(&mut session)
            .await
        {
            abort(session, "replace pack").await;
            return Err(MongoDaoError::Operation {
                operation: "delete pack guesses",
                source,
            });
        }

        if !documents.is_empty()
            && let Err(source) = item_collection
                .insert_many(&documents)
                .session(&mut session)
                .await
        {
            abort(session, "replace pack").await;
            return Err(MongoDaoError::Operation {
                operation: "insert pack items",
                source,
            });
        }

        session
            .commit_transaction()
            .await
            .map_err(MongoDaoError::operation("commit pack replacement"))?;
        Ok(removed)
    }

    async fn find_item(&self, id: Uuid) -> MongoResult<Option<QuizItemEntity>> {
        self.items()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("find item"))?
            .map(QuizItemEntity::try_from)
            .transpose()
    }

    async fn delete_item(&self, id: Uuid) -> MongoResult<bool> {
        let item_collection = self.items().await;
        let guess_collection = self.guesses().await;
        let mut session = self.start_transaction("delete item").await?;

        let deleted = match item_collection
            .delete_one(doc_id(id))
            .session(&mut session)
            .await
        {
            Ok(result) => result.deleted_count > 0,
            Err(source) => {
                abort(session, "delete item").await;
                return Err(MongoDaoError::Operation {
                    operation: "delete item",
                    source,
                });
            }
        };

        if let Err(source) = guess_collection
            .delete_many(doc! {"quiz_item_id": id.to_string()})
            .session(&mut session)
            .await
        {
            abort(session, "delete item").await;
            return Err(MongoDaoError::Operation {
                operation: "delete item guesses",
                source,
            });
        }

        session
            .commit_transaction()
            .await
            .map_err(MongoDaoError::operation("commit item deletion"))?;
        Ok(deleted)
    }

    async fn count_items(&self, quiz_date: QuizDate) -> MongoResult<u64> {
        self.items()
            .await
            .count_documents(doc! {"quiz_date": quiz_date.to_string()})
            .await
            .map_err(MongoDaoError::operation("count items"))
    }

    async fn list_items(
        &self,
        quiz_date: QuizDate,
        limit: u32,
        offset: u64,
    ) -> MongoResult<Vec<QuizItemEntity>> {
        let documents: Vec<MongoQuizItemDocument> = self
            .items()
            .await
            .find(doc! {"quiz_date": quiz_date.to_string()})
            .sort(doc! {"created_at": 1, "_id": 1})
            .skip(offset)
            .limit(i64::from(limit))
            .await
            .map_err(MongoDaoError::operation("list items"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list items"))?;

        documents.into_iter().map(QuizItemEntity::try_from).collect()
    }

    async fn list_dates(&self) -> MongoResult<Vec<QuizDate>> {
        let values = self
            .items()
            .await
            .distinct("quiz_date", doc! {})
            .await
            .map_err(MongoDaoError::operation("list dates"))?;

        let mut dates = values
            .iter()
            .filter_map(|value| value.as_str())
            .map(|raw| parse_date("quiz_items.quiz_date", raw))
            .collect::<MongoResult<Vec<_>>>()?;
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    async fn latest_quiz_date(&self) -> MongoResult<Option<QuizDate>> {
        self.items()
            .await
            .find_one(doc! {})
            .sort(doc! {"quiz_date": -1})
            .await
            .map_err(MongoDaoError::operation("latest quiz date"))?
            .map(|document| parse_date("quiz_items.quiz_date", &document.quiz_date))
            .transpose()
    }

    async fn record_guess(&self, guess: GuessEntity) -> MongoResult<bool> {
        match self
            .guesses()
            .await
            .insert_one(MongoGuessDocument::from(&guess))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Operation {
                operation: "record guess",
                source,
            }),
        }
    }

    async fn guess_documents(&self, filter: Document) -> MongoResult<Vec<MongoGuessDocument>> {
        self.guesses()
            .await
            .find(filter)
            .sort(doc! {"guessed_at": 1})
            .await
            .map_err(MongoDaoError::operation("list guesses"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list guesses"))
    }

    async fn guessers(&self, item_ids: Vec<Uuid>) -> MongoResult<HashMap<Uuid, Vec<String>>> {
        let mut guessers: HashMap<Uuid, Vec<String>> = HashMap::new();
        if item_ids.is_empty() {
            return Ok(guessers);
        }

        let ids: Vec<String> = item_ids.iter().map(Uuid::to_string).collect();
        for document in self
            .guess_documents(doc! {"quiz_item_id": {"$in": ids}})
            .await?
        {
            guessers
                .entry(parse_uuid("quiz_guesses.quiz_item_id", &document.quiz_item_id)?)
                .or_default()
                .push(document.user_id);
        }
        Ok(guessers)
    }

    async fn user_guess_dates(&self, user_id: String) -> MongoResult<Vec<QuizDate>> {
        self.guess_documents(doc! {"user_id": user_id})
            .await?
            .iter()
            .map(|document| parse_date("quiz_guesses.quiz_date", &document.quiz_date))
            .collect()
    }

    async fn guess_activity(&self, window: Option<DateWindow>) -> MongoResult<Vec<GuessActivityEntity>> {
        let filter = match window {
            Some(window) => doc! {
                "quiz_date": {"$gte": window.from.to_string(), "$lte": window.to.to_string()}
            },
            None => doc! {},
        };

        self.guess_documents(filter)
            .await?
            .into_iter()
            .map(|document| {
                Ok(GuessActivityEntity {
                    quiz_date: parse_date("quiz_guesses.quiz_date", &document.quiz_date)?,
                    user_id: document.user_id,
                })
            })
            .collect()
    }

    async fn insert_score(&self, score: ScoreEntity) -> MongoResult<()> {
        self.scores()
            .await
            .insert_one(MongoScoreDocument::from(&score))
            .await
            .map_err(MongoDaoError::operation("insert score"))?;
        Ok(())
    }

    async fn replace_battle_results(
        &self,
        user_id: String,
        quiz_date: QuizDate,
        results: Vec<BattleResultEntity>,
    ) -> MongoResult<()> {
        let documents: Vec<MongoBattleResultDocument> =
            results.iter().map(MongoBattleResultDocument::from).collect();
        let collection = self.battles().await;
        let mut session = self.start_transaction("replace battle results").await?;

        if let Err(source) = collection
            .delete_many(doc! {"user_id": user_id.as_str(), "quiz_date": quiz_date.to_string()})
            .session(&mut session)
            .await
        {
            abort(session, "replace battle results").await;
            return Err(MongoDaoError::Operation {
                operation: "delete battle results",
                source,
            });
        }

        if !documents.is_empty()
            && let Err(source) = collection
                .insert_many(&documents)
                .session(&mut session)
                .await
        {
            abort(session, "replace battle results").await;
            return Err(MongoDaoError::Operation {
                operation: "insert battle results",
                source,
            });
        }

        session
            .commit_transaction()
            .await
            .map_err(MongoDaoError::operation("commit battle results"))
    }

    async fn list_battle_results(&self, filter: BattleResultFilter) -> MongoResult<Vec<BattleResultEntity>> {
        let mut query = doc! {};
        if let Some(quiz_date) = filter.quiz_date {
            query.insert("quiz_date", quiz_date.to_string());
        }
        if let Some(user_id) = filter.user_id {
            query.insert("user_id", user_id);
        }

        let documents: Vec<MongoBattleResultDocument> = self
            .battles()
            .await
            .find(query)
            .sort(doc! {"points": -1, "wins": -1, "created_at": 1})
            .await
            .map_err(MongoDaoError::operation("list battle results"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list battle results"))?;

        documents
            .into_iter()
            .map(BattleResultEntity::try_from)
            .collect()
    }

    async fn insert_opening(&self, opening: OpeningEntity) -> MongoResult<()> {
        self.openings()
            .await
            .insert_one(MongoOpeningDocument::from(&opening))
            .await
            .map_err(MongoDaoError::operation("insert opening"))?;
        Ok(())
    }

    async fn list_openings(&self, quiz_date: Option<QuizDate>) -> MongoResult<Vec<OpeningEntity>> {
        let filter = match quiz_date {
            Some(quiz_date) => doc! {"quiz_date": quiz_date.to_string()},
            None => doc! {},
        };

        let documents: Vec<MongoOpeningDocument> = self
            .openings()
            .await
            .find(filter)
            .sort(doc! {"quiz_date": -1, "created_at": -1})
            .await
            .map_err(MongoDaoError::operation("list openings"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list openings"))?;

        documents.into_iter().map(OpeningEntity::try_from).collect()
    }

    async fn delete_opening(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .openings()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("delete opening"))?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_news(&self, news: NewsEntity) -> MongoResult<()> {
        self.news()
            .await
            .insert_one(MongoNewsDocument::from(&news))
            .await
            .map_err(MongoDaoError::operation("insert news"))?;
        Ok(())
    }

    async fn count_news(&self) -> MongoResult<u64> {
        self.news()
            .await
            .count_documents(doc! {})
            .await
            .map_err(MongoDaoError::operation("count news"))
    }

    async fn list_news(&self, limit: u32, offset: u64) -> MongoResult<Vec<NewsEntity>> {
        let documents: Vec<MongoNewsDocument> = self
            .news()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": -1, "_id": 1})
            .skip(offset)
            .limit(i64::from(limit))
            .await
            .map_err(MongoDaoError::operation("list news"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list news"))?;

        documents.into_iter().map(NewsEntity::try_from).collect()
    }

    async fn update_news(
        &self,
        id: Uuid,
        text: String,
        at: SystemTime,
    ) -> MongoResult<Option<NewsEntity>> {
        let update = doc! {"$set": {"text": text, "created_at": DateTime::from_system_time(at)}};
        self.news()
            .await
            .find_one_and_update(doc_id(id), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(MongoDaoError::operation("update news"))?
            .map(NewsEntity::try_from)
            .transpose()
    }

    async fn delete_news(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .news()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("delete news"))?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_battle_pack(&self, pack: BattlePackEntity) -> MongoResult<()> {
        self.battle_packs()
            .await
            .insert_one(MongoBattlePackDocument::from(&pack))
            .await
            .map_err(MongoDaoError::operation("insert battle pack"))?;
        Ok(())
    }

    async fn list_battle_packs(&self) -> MongoResult<Vec<BattlePackEntity>> {
        let documents: Vec<MongoBattlePackDocument> = self
            .battle_packs()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": -1, "_id": 1})
            .await
            .map_err(MongoDaoError::operation("list battle packs"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list battle packs"))?;

        documents
            .into_iter()
            .map(BattlePackEntity::try_from)
            .collect()
    }

    async fn find_battle_pack(&self, id: Uuid) -> MongoResult<Option<BattlePackEntity>> {
        self.battle_packs()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("find battle pack"))?
            .map(BattlePackEntity::try_from)
            .transpose()
    }

    async fn insert_battle_anime(&self, anime: BattleAnimeEntity) -> MongoResult<()> {
        self.battle_anime()
            .await
            .insert_one(MongoBattleAnimeDocument::from(&anime))
            .await
            .map_err(MongoDaoError::operation("insert battle anime"))?;
        Ok(())
    }

    async fn list_battle_anime(&self, pack_id: Uuid) -> MongoResult<Vec<BattleAnimeEntity>> {
        let documents: Vec<MongoBattleAnimeDocument> = self
            .battle_anime()
            .await
            .find(doc! {"pack_id": pack_id.to_string()})
            .sort(doc! {"created_at": 1, "_id": 1})
            .await
            .map_err(MongoDaoError::operation("list battle anime"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("list battle anime"))?;

        documents
            .into_iter()
            .map(BattleAnimeEntity::try_from)
            .collect()
    }

    async fn recent_scores(&self, user_id: String, limit: u32) -> MongoResult<Vec<ScoreEntity>> {
        let documents: Vec<MongoScoreDocument> = self
            .scores()
            .await
            .find(doc! {"user_id": user_id})
            .sort(doc! {"created_at": -1, "_id": 1})
            .limit(i64::from(limit))
            .await
            .map_err(MongoDaoError::operation("recent scores"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("recent scores"))?;

        documents.into_iter().map(ScoreEntity::try_from).collect()
    }

    async fn battle_days(&self, user_id: String, limit: u32) -> MongoResult<Vec<BattleDayEntity>> {
        let documents: Vec<MongoBattleResultDocument> = self
            .battles()
            .await
            .find(doc! {"user_id": user_id})
            .await
            .map_err(MongoDaoError::operation("battle days"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("battle days"))?;

        let mut per_day: HashMap<String, BattleDayTotals> = HashMap::new();
        for document in documents {
            let totals = per_day.entry(document.quiz_date).or_default();
            totals.points += document.points;
            totals.wins += u64::from(document.wins);
            totals.losses += u64::from(document.losses);
            totals.last_at = totals.last_at.max(document.created_at.to_system_time());
        }

        let mut days = per_day
            .into_iter()
            .map(|(quiz_date, totals)| {
                Ok(BattleDayEntity {
                    quiz_date: parse_date("battle_results.quiz_date", &quiz_date)?,
                    points: totals.points,
                    wins: totals.wins,
                    losses: totals.losses,
                    last_at: totals.last_at,
                })
            })
            .collect::<MongoResult<Vec<_>>>()?;
        days.sort_by(|a, b| {
            b.last_at
                .cmp(&a.last_at)
                .then_with(|| b.quiz_date.cmp(&a.quiz_date))
        });
        days.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(days)
    }

    async fn upsert_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id.clone();
        self.users()
            .await
            .replace_one(doc_id(id), MongoUserDocument::from(user))
            .upsert(true)
            .await
            .map_err(MongoDaoError::operation("upsert user"))?;
        Ok(())
    }

    async fn user_names(&self, user_ids: Vec<String>) -> MongoResult<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .find(doc! {"_id": {"$in": user_ids}})
            .await
            .map_err(MongoDaoError::operation("user names"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("user names"))?;

        Ok(documents
            .into_iter()
            .map(|document| (document.id, document.username))
            .collect())
    }

    async fn global_stats(&self, limit: u32) -> MongoResult<GlobalStatsEntity> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let guesses = self.guess_documents(doc! {}).await?;

        let mut per_item: HashMap<String, u64> = HashMap::new();
        let mut per_user: HashMap<String, f64> = HashMap::new();
        for guess in &guesses {
            *per_item.entry(guess.quiz_item_id.clone()).or_default() += 1;
            *per_user.entry(guess.user_id.clone()).or_default() += 1.0;
        }

        let item_ids: Vec<String> = per_item.keys().cloned().collect();
        let titles: Vec<MongoQuizItemDocument> = self
            .items()
            .await
            .find(doc! {"_id": {"$in": item_ids}})
            .await
            .map_err(MongoDaoError::operation("most guessed titles"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("most guessed titles"))?;

        let mut per_title: HashMap<String, u64> = HashMap::new();
        for item in titles {
            let count = per_item.get(&item.id).copied().unwrap_or(0);
            *per_title.entry(item.title).or_default() += count;
        }

        let scores: Vec<MongoScoreDocument> = self
            .scores()
            .await
            .find(doc! {})
            .await
            .map_err(MongoDaoError::operation("score totals"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation("score totals"))?;

        let mut per_scorer: HashMap<String, f64> = HashMap::new();
        let mut per_type: HashMap<String, u64> = HashMap::new();
        for score in scores {
            *per_scorer.entry(score.user_id).or_default() += score.score;
            *per_type.entry(score.quiz_type).or_default() += 1;
        }

        let mut most_guessed: Vec<TitleGuessCount> = per_title
            .into_iter()
            .map(|(title, guesses)| TitleGuessCount { title, guesses })
            .collect();
        most_guessed.sort_by(|a, b| b.guesses.cmp(&a.guesses).then_with(|| a.title.cmp(&b.title)));
        most_guessed.truncate(limit);

        let mut quiz_type_plays: Vec<QuizTypePlays> = per_type
            .into_iter()
            .map(|(quiz_type, plays)| QuizTypePlays { quiz_type, plays })
            .collect();
        quiz_type_plays.sort_by(|a, b| {
            b.plays
                .cmp(&a.plays)
                .then_with(|| a.quiz_type.cmp(&b.quiz_type))
        });
        quiz_type_plays.truncate(limit);

        Ok(GlobalStatsEntity {
            most_guessed,
            top_scorers: top_totals(per_scorer, limit),
            top_guessers: top_totals(per_user, limit),
            quiz_type_plays,
        })
    }
}

struct BattleDayTotals {
    points: i64,
    wins: u64,
    losses: u64,
    last_at: SystemTime,
}

impl Default for BattleDayTotals {
    fn default() -> Self {
        Self {
            points: 0,
            wins: 0,
            losses: 0,
            last_at: UNIX_EPOCH,
        }
    }
}

fn top_totals(totals: HashMap<String, f64>, limit: usize) -> Vec<UserTotal> {
    let mut totals: Vec<UserTotal> = totals
        .into_iter()
        .map(|(user_id, total)| UserTotal { user_id, total })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    totals.truncate(limit);
    totals
}

impl QuizStore for MongoQuizStore {
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
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
