#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use std::{collections::HashMap, time::SystemTime};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    BattleAnimeEntity, BattleDayEntity, BattlePackEntity, BattleResultEntity, BattleResultFilter,
    DateWindow, GlobalStatsEntity, GuessActivityEntity, GuessEntity, NewsEntity, OpeningEntity,
    QuizItemEntity, ScoreEntity, UserEntity,
};
use crate::dao::storage::StorageResult;
use crate::quiz_date::QuizDate;

/// Abstraction over the transactional store holding quiz packs, the guess ledger
/// and the surrounding score/battle/opening records.
///
/// Implementations must guarantee two atomicity properties:
/// - [`QuizStore::replace_pack`] deletes and re-inserts a day's items in a single
///   transaction, so readers observe either the old pack or the new one;
/// - [`QuizStore::record_guess`] inserts at most one ledger row per
///   `(quiz_item_id, user_id)`, even for concurrent callers.
pub trait QuizStore: Send + Sync {
    fn insert_item(&self, item: QuizItemEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace every item of `quiz_date` with `items`; returns how many items were removed.
    fn replace_pack(
        &self,
        quiz_date: QuizDate,
        items: Vec<QuizItemEntity>,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    fn find_item(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizItemEntity>>>;
    /// Delete an item and its ledger rows; `false` when no such item exists.
    fn delete_item(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn count_items(&self, quiz_date: QuizDate) -> BoxFuture<'static, StorageResult<u64>>;
    fn list_items(
        &self,
        quiz_date: QuizDate,
        limit: u32,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizItemEntity>>>;
    /// Distinct days with at least one item, most recent first.
    fn list_dates(&self) -> BoxFuture<'static, StorageResult<Vec<QuizDate>>>;
    fn latest_quiz_date(&self) -> BoxFuture<'static, StorageResult<Option<QuizDate>>>;

    /// Insert-if-absent; `true` only when this call created the ledger row.
    fn record_guess(&self, guess: GuessEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Users who credited each of `item_ids`, in credit order.
    fn guessers(
        &self,
        item_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<HashMap<Uuid, Vec<String>>>>;
    /// One day per ledger row of `user_id` (a day repeats once per credited item).
    fn user_guess_dates(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<Vec<QuizDate>>>;
    fn guess_activity(
        &self,
        window: Option<DateWindow>,
    ) -> BoxFuture<'static, StorageResult<Vec<GuessActivityEntity>>>;

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the battle results of `user_id` for `quiz_date` in one transaction.
    fn replace_battle_results(
        &self,
        user_id: String,
        quiz_date: QuizDate,
        results: Vec<BattleResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn list_battle_results(
        &self,
        filter: BattleResultFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleResultEntity>>>;

    fn insert_opening(&self, opening: OpeningEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_openings(
        &self,
        quiz_date: Option<QuizDate>,
    ) -> BoxFuture<'static, StorageResult<Vec<OpeningEntity>>>;
    fn delete_opening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_news(&self, news: NewsEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn count_news(&self) -> BoxFuture<'static, StorageResult<u64>>;
    /// One page of announcements, newest first.
    fn list_news(
        &self,
        limit: u32,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<NewsEntity>>>;
    /// Rewrite the text and publication time; `None` when no such announcement exists.
    fn update_news(
        &self,
        id: Uuid,
        text: String,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<NewsEntity>>>;
    fn delete_news(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_battle_pack(&self, pack: BattlePackEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Every battle pack, newest first.
    fn list_battle_packs(&self) -> BoxFuture<'static, StorageResult<Vec<BattlePackEntity>>>;
    fn find_battle_pack(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<BattlePackEntity>>>;
    fn insert_battle_anime(
        &self,
        anime: BattleAnimeEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Contenders of `pack_id`, oldest first.
    fn list_battle_anime(
        &self,
        pack_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleAnimeEntity>>>;

    /// Latest `limit` score submissions of `user_id`, newest first.
    fn recent_scores(
        &self,
        user_id: String,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    /// Battle results of `user_id` summed per day, most recently submitted day first.
    fn battle_days(
        &self,
        user_id: String,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleDayEntity>>>;

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn user_names(
        &self,
        user_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>>;

    /// Top-`limit` lists backing the global statistics view.
    fn global_stats(&self, limit: u32) -> BoxFuture<'static, StorageResult<GlobalStatsEntity>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
