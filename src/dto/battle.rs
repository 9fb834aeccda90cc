use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::BattleResultEntity,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_quiz_date},
    },
    quiz_date::QuizDate,
};

/// Outcome of one anime in a battle round.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcomeInput {
    /// External identifier of the anime.
    #[validate(length(min = 1, max = 100))]
    pub anime_id: String,
    /// Rounds won.
    #[serde(default)]
    pub wins: u32,
    /// Rounds lost.
    #[serde(default)]
    pub losses: u32,
    /// Points earned; may be negative.
    #[serde(default)]
    pub points: i64,
}

/// Full set of results for one day; replaces whatever the caller stored for that day.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BattleResultsRequest {
    /// Quiz day, `YYYY-MM-DD`.
    pub date: String,
    /// One entry per anime; an empty list clears the day.
    pub results: Vec<BattleOutcomeInput>,
}

impl Validate for BattleResultsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.date).and_then(|_| validate_quiz_date(self.date.trim())) {
            errors.add("date", e);
        }

        for result in &self.results {
            if let Err(result_errors) = result.validate() {
                errors.merge_self("results", Err(result_errors));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Stored battle result.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleResultResponse {
    /// Identifier of the stored result.
    pub id: Uuid,
    /// Player who submitted the result.
    pub user_id: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Rounds won.
    pub wins: u32,
    /// Rounds lost.
    pub losses: u32,
    /// Points earned.
    pub points: i64,
    /// Quiz day of the result.
    pub quiz_date: QuizDate,
    /// RFC 3339 submission timestamp.
    pub created_at: String,
}

impl From<BattleResultEntity> for BattleResultResponse {
    fn from(entity: BattleResultEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            anime_id: entity.anime_id,
            wins: entity.wins,
            losses: entity.losses,
            points: entity.points,
            quiz_date: entity.quiz_date,
            created_at: format_system_time(entity.created_at),
        }
    }
}

/// Acknowledgement of a battle submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct BattleResultsSaved {
    /// Always `true`.
    pub success: bool,
    /// Number of results now stored for the day.
    pub saved: usize,
}

/// Optional filters of the battle results listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BattleResultsQuery {
    /// Quiz day, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Only results of this user.
    pub user_id: Option<String>,
}
