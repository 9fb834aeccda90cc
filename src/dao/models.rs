use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quiz_date::QuizDate;

/// One image of a daily pack, owned by the admin who uploaded it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizItemEntity {
    /// Primary key of the item.
    pub id: Uuid,
    /// Admin who uploaded the item.
    pub owner_id: String,
    /// Opaque reference returned by the file store for the main image.
    pub image_ref: String,
    /// Expected answer.
    pub title: String,
    /// Identifier of the anime in an external catalog.
    pub anime_id: String,
    /// Name of the external catalog (e.g. "shikimori"), if known.
    pub source_id: Option<String>,
    /// Day the item belongs to.
    pub quiz_date: QuizDate,
    /// First optional hint image.
    pub hint1_ref: Option<String>,
    /// Second optional hint image.
    pub hint2_ref: Option<String>,
    /// Insertion timestamp.
    pub created_at: SystemTime,
}

/// Credit event recorded the first time a user answers an item correctly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuessEntity {
    /// Credited item.
    pub quiz_item_id: Uuid,
    /// Credited user.
    pub user_id: String,
    /// Day of the credited item, copied for backends that cannot join.
    pub quiz_date: QuizDate,
    /// Time of the first correct answer.
    pub guessed_at: SystemTime,
}

/// Ledger entry projected onto the day of its item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessActivityEntity {
    /// Credited user.
    pub user_id: String,
    /// Day of the credited item.
    pub quiz_date: QuizDate,
}

/// Inclusive range of quiz days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day of the window.
    pub from: QuizDate,
    /// Last day of the window.
    pub to: QuizDate,
}

/// Standalone quiz-mode completion event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntity {
    /// Primary key of the score.
    pub id: Uuid,
    /// Player who submitted the score.
    pub user_id: String,
    /// Quiz mode name.
    pub quiz_type: String,
    /// Finite score value.
    pub score: f64,
    /// Quiz day the score belongs to.
    pub quiz_date: QuizDate,
    /// Submission time.
    pub created_at: SystemTime,
}

/// Per-anime battle outcome for a user on a given day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleResultEntity {
    /// Primary key of the result.
    pub id: Uuid,
    /// Player who submitted the result.
    pub user_id: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Rounds won.
    pub wins: u32,
    /// Rounds lost.
    pub losses: u32,
    /// Points earned; may be negative.
    pub points: i64,
    /// Quiz day of the result.
    pub quiz_date: QuizDate,
    /// Submission time.
    pub created_at: SystemTime,
}

/// Optional filters applied when listing battle results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BattleResultFilter {
    /// Only results of this day.
    pub quiz_date: Option<QuizDate>,
    /// Only results of this user.
    pub user_id: Option<String>,
}

/// Anime opening clip scheduled for a quiz day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpeningEntity {
    /// Primary key of the opening.
    pub id: Uuid,
    /// Anime title of the opening.
    pub title: String,
    /// Link to the clip.
    pub video_url: String,
    /// Clip start, in seconds.
    pub start_time: u32,
    /// Clip end, in seconds.
    pub end_time: u32,
    /// Quiz day of the opening.
    pub quiz_date: QuizDate,
    /// Insertion time.
    pub created_at: SystemTime,
    /// Admin who scheduled it.
    pub created_by: Option<String>,
}

/// Announcement posted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsEntity {
    /// Primary key of the announcement.
    pub id: Uuid,
    /// Admin who posted it.
    pub author_id: String,
    /// Trimmed announcement text.
    pub text: String,
    /// Publication time; an edit moves it to the time of the edit.
    pub created_at: SystemTime,
}

/// Named group of anime that battle rounds are drawn from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattlePackEntity {
    /// Primary key of the pack.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free text, empty when the admin gave none.
    pub description: String,
    /// Admin who created the pack.
    pub created_by: String,
    /// Insertion time.
    pub created_at: SystemTime,
}

/// Contender of a battle pack, with its stored image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleAnimeEntity {
    /// Primary key of the contender.
    pub id: Uuid,
    /// Pack the contender belongs to.
    pub pack_id: Uuid,
    /// Admin who uploaded it.
    pub owner_id: String,
    /// Anime title.
    pub title: String,
    /// Opaque reference returned by the file store.
    pub image_ref: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: String,
    /// Insertion time.
    pub created_at: SystemTime,
}

/// Battle results of one user summed over a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleDayEntity {
    /// Quiz day of the results.
    pub quiz_date: QuizDate,
    /// Summed points.
    pub points: i64,
    /// Summed rounds won.
    pub wins: u64,
    /// Summed rounds lost.
    pub losses: u64,
    /// Latest submission time among the day's results.
    pub last_at: SystemTime,
}

/// Entry of the user directory, used for display names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// User id from the identity provider.
    pub id: String,
    /// Display name.
    pub username: String,
}

/// Number of credited guesses for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleGuessCount {
    /// Item title.
    pub title: String,
    /// Credits received across every item with this title.
    pub guesses: u64,
}

/// Aggregated number attached to a user (summed score or guess count).
#[derive(Debug, Clone, PartialEq)]
pub struct UserTotal {
    /// User the total belongs to.
    pub user_id: String,
    /// Summed value.
    pub total: f64,
}

/// Number of score submissions for one quiz mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizTypePlays {
    /// Quiz mode name.
    pub quiz_type: String,
    /// Number of submissions.
    pub plays: u64,
}

/// Raw inputs of the global statistics view, each list already sorted and truncated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStatsEntity {
    /// Titles with the most credits.
    pub most_guessed: Vec<TitleGuessCount>,
    /// Users with the highest summed score.
    pub top_scorers: Vec<UserTotal>,
    /// Users with the most credits.
    pub top_guessers: Vec<UserTotal>,
    /// Quiz modes with the most submissions.
    pub quiz_type_plays: Vec<QuizTypePlays>,
}
