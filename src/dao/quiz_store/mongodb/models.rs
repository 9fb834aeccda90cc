use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    BattleAnimeEntity, BattlePackEntity, BattleResultEntity, GuessEntity, NewsEntity,
    OpeningEntity, QuizItemEntity, ScoreEntity, UserEntity,
};
use crate::quiz_date::QuizDate;

pub(super) fn parse_uuid(field: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| MongoDaoError::Corrupt {
        field,
        value: raw.to_owned(),
    })
}

pub(super) fn parse_date(field: &'static str, raw: &str) -> MongoResult<QuizDate> {
    QuizDate::parse(raw).map_err(|_| MongoDaoError::Corrupt {
        field,
        value: raw.to_owned(),
    })
}

pub(super) fn doc_id(id: impl ToString) -> Document {
    doc! {"_id": id.to_string()}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoQuizItemDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) image_ref: String,
    pub(crate) title: String,
    pub(crate) anime_id: String,
    pub(crate) source_id: Option<String>,
    pub(crate) quiz_date: String,
    pub(crate) hint1_ref: Option<String>,
    pub(crate) hint2_ref: Option<String>,
    pub(crate) created_at: DateTime,
}

impl From<&QuizItemEntity> for MongoQuizItemDocument {
    fn from(value: &QuizItemEntity) -> Self {
        Self {
            id: value.id.to_string(),
            owner_id: value.owner_id.clone(),
            image_ref: value.image_ref.clone(),
            title: value.title.clone(),
            anime_id: value.anime_id.clone(),
            source_id: value.source_id.clone(),
            quiz_date: value.quiz_date.to_string(),
            hint1_ref: value.hint1_ref.clone(),
            hint2_ref: value.hint2_ref.clone(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoQuizItemDocument> for QuizItemEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuizItemDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("quiz_items._id", &value.id)?,
            quiz_date: parse_date("quiz_items.quiz_date", &value.quiz_date)?,
            owner_id: value.owner_id,
            image_ref: value.image_ref,
            title: value.title,
            anime_id: value.anime_id,
            source_id: value.source_id,
            hint1_ref: value.hint1_ref,
            hint2_ref: value.hint2_ref,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// Ledger row; `quiz_date` is copied from the item so activity queries need no join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoGuessDocument {
    pub(crate) quiz_item_id: String,
    pub(crate) user_id: String,
    pub(crate) quiz_date: String,
    pub(crate) guessed_at: DateTime,
}

impl From<&GuessEntity> for MongoGuessDocument {
    fn from(value: &GuessEntity) -> Self {
        Self {
            quiz_item_id: value.quiz_item_id.to_string(),
            user_id: value.user_id.clone(),
            quiz_date: value.quiz_date.to_string(),
            guessed_at: DateTime::from_system_time(value.guessed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoScoreDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) quiz_type: String,
    pub(crate) score: f64,
    pub(crate) quiz_date: String,
    pub(crate) created_at: DateTime,
}

impl From<&ScoreEntity> for MongoScoreDocument {
    fn from(value: &ScoreEntity) -> Self {
        Self {
            id: value.id.to_string(),
            user_id: value.user_id.clone(),
            quiz_type: value.quiz_type.clone(),
            score: value.score,
            quiz_date: value.quiz_date.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoScoreDocument> for ScoreEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoScoreDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("user_scores._id", &value.id)?,
            quiz_date: parse_date("user_scores.quiz_date", &value.quiz_date)?,
            user_id: value.user_id,
            quiz_type: value.quiz_type,
            score: value.score,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoBattleResultDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) anime_id: String,
    pub(crate) wins: u32,
    pub(crate) losses: u32,
    pub(crate) points: i64,
    pub(crate) quiz_date: String,
    pub(crate) created_at: DateTime,
}

impl From<&BattleResultEntity> for MongoBattleResultDocument {
    fn from(value: &BattleResultEntity) -> Self {
        Self {
            id: value.id.to_string(),
            user_id: value.user_id.clone(),
            anime_id: value.anime_id.clone(),
            wins: value.wins,
            losses: value.losses,
            points: value.points,
            quiz_date: value.quiz_date.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoBattleResultDocument> for BattleResultEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBattleResultDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("battle_results._id", &value.id)?,
            quiz_date: parse_date("battle_results.quiz_date", &value.quiz_date)?,
            user_id: value.user_id,
            anime_id: value.anime_id,
            wins: value.wins,
            losses: value.losses,
            points: value.points,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoOpeningDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) video_url: String,
    pub(crate) start_time: u32,
    pub(crate) end_time: u32,
    pub(crate) quiz_date: String,
    pub(crate) created_at: DateTime,
    pub(crate) created_by: Option<String>,
}

impl From<&OpeningEntity> for MongoOpeningDocument {
    fn from(value: &OpeningEntity) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title.clone(),
            video_url: value.video_url.clone(),
            start_time: value.start_time,
            end_time: value.end_time,
            quiz_date: value.quiz_date.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
            created_by: value.created_by.clone(),
        }
    }
}

impl TryFrom<MongoOpeningDocument> for OpeningEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoOpeningDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("openings._id", &value.id)?,
            quiz_date: parse_date("openings.quiz_date", &value.quiz_date)?,
            title: value.title,
            video_url: value.video_url,
            start_time: value.start_time,
            end_time: value.end_time,
            created_at: value.created_at.to_system_time(),
            created_by: value.created_by,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoUserDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) username: String,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoNewsDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) author_id: String,
    pub(crate) text: String,
    pub(crate) created_at: DateTime,
}

impl From<&NewsEntity> for MongoNewsDocument {
    fn from(value: &NewsEntity) -> Self {
        Self {
            id: value.id.to_string(),
            author_id: value.author_id.clone(),
            text: value.text.clone(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoNewsDocument> for NewsEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoNewsDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("news._id", &value.id)?,
            author_id: value.author_id,
            text: value.text,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoBattlePackDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    pub(crate) created_by: String,
    pub(crate) created_at: DateTime,
}

impl From<&BattlePackEntity> for MongoBattlePackDocument {
    fn from(value: &BattlePackEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name.clone(),
            description: value.description.clone(),
            created_by: value.created_by.clone(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoBattlePackDocument> for BattlePackEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBattlePackDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("battle_packs._id", &value.id)?,
            name: value.name,
            description: value.description,
            created_by: value.created_by,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MongoBattleAnimeDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    pub(crate) pack_id: String,
    pub(crate) owner_id: String,
    pub(crate) title: String,
    pub(crate) image_ref: String,
    pub(crate) anime_id: String,
    pub(crate) source_id: String,
    pub(crate) created_at: DateTime,
}

impl From<&BattleAnimeEntity> for MongoBattleAnimeDocument {
    fn from(value: &BattleAnimeEntity) -> Self {
        Self {
            id: value.id.to_string(),
            pack_id: value.pack_id.to_string(),
            owner_id: value.owner_id.clone(),
            title: value.title.clone(),
            image_ref: value.image_ref.clone(),
            anime_id: value.anime_id.clone(),
            source_id: value.source_id.clone(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoBattleAnimeDocument> for BattleAnimeEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBattleAnimeDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid("battle_anime._id", &value.id)?,
            pack_id: parse_uuid("battle_anime.pack_id", &value.pack_id)?,
            owner_id: value.owner_id,
            title: value.title,
            image_ref: value.image_ref,
            anime_id: value.anime_id,
            source_id: value.source_id,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn item_document_round_trips_through_entity() {
        let entity = QuizItemEntity {
            id: Uuid::new_v4(),
            owner_id: "admin".into(),
            image_ref: "/uploads/a.png".into(),
            title: "Naruto".into(),
            anime_id: "20".into(),
            source_id: None,
            quiz_date: QuizDate::parse("2024-01-07").unwrap(),
            hint1_ref: Some("/uploads/h.png".into()),
            hint2_ref: None,
            created_at: UNIX_EPOCH + Duration::from_millis(1_704_585_600_000),
        };

        let document = MongoQuizItemDocument::from(&entity);
        assert_eq!(document.quiz_date, "2024-01-07");
        assert_eq!(QuizItemEntity::try_from(document).unwrap(), entity);
    }

    #[test]
    fn battle_anime_document_keeps_its_pack() {
        let entity = BattleAnimeEntity {
            id: Uuid::new_v4(),
            pack_id: Uuid::new_v4(),
            owner_id: "admin".into(),
            title: "Naruto".into(),
            image_ref: "/uploads/n.png".into(),
            anime_id: "20".into(),
            source_id: "manual".into(),
            created_at: UNIX_EPOCH + Duration::from_millis(1_704_585_600_000),
        };

        let document = MongoBattleAnimeDocument::from(&entity);
        assert_eq!(document.pack_id, entity.pack_id.to_string());
        assert_eq!(BattleAnimeEntity::try_from(document).unwrap(), entity);
    }

    #[test]
    fn corrupt_dates_are_rejected() {
        assert!(matches!(
            parse_date("openings.quiz_date", "07/01/2024"),
            Err(MongoDaoError::Corrupt { .. })
        ));
    }
}
