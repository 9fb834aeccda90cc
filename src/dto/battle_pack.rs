//! DTOs for battle packs and their contenders.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{BattleAnimeEntity, BattlePackEntity},
    dto::{format_system_time, validation::validate_not_blank},
};

/// New battle pack.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BattlePackRequest {
    /// Display name of the pack.
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Optional free text.
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// Battle pack as listed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattlePackResponse {
    /// Identifier of the pack.
    pub id: Uuid,
    /// Display name of the pack.
    pub name: String,
    /// Free text; empty when none was given.
    pub description: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<BattlePackEntity> for BattlePackResponse {
    fn from(entity: BattlePackEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            created_at: format_system_time(entity.created_at),
        }
    }
}

/// Every battle pack, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BattlePacksResponse {
    /// Packs, newest first.
    pub packs: Vec<BattlePackResponse>,
}

/// Contender of a battle pack.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleAnimeResponse {
    /// Identifier of the contender.
    pub id: Uuid,
    /// Anime title shown in the battle.
    pub title: String,
    /// Public reference of the stored image.
    pub image: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Catalogue the identifier comes from.
    pub source_id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<BattleAnimeEntity> for BattleAnimeResponse {
    fn from(entity: BattleAnimeEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            image: entity.image_ref,
            anime_id: entity.anime_id,
            source_id: entity.source_id,
            created_at: format_system_time(entity.created_at),
        }
    }
}

/// Contenders of one pack, oldest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BattleAnimeListResponse {
    /// Contenders, oldest first.
    pub anime: Vec<BattleAnimeResponse>,
}

/// Multipart form accepted by the contender upload route.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleAnimeForm {
    /// Contender image.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// Anime title.
    pub title: String,
    /// External identifier of the anime.
    pub anime_id: String,
    /// Pack receiving the contender.
    pub pack_id: Uuid,
    /// Defaults to `manual`.
    pub source_id: Option<String>,
}

/// Acknowledgement of a battle pack or contender creation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleContentCreated {
    /// Always `true`.
    pub success: bool,
    /// Identifier of the created pack or contender.
    pub id: Uuid,
    /// Stored image of a new contender; absent for packs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_names_must_have_content() {
        let request: BattlePackRequest = serde_json::from_str(r#"{"name":"   "}"#).unwrap();
        assert!(request.validate().is_err());

        let request: BattlePackRequest =
            serde_json::from_str(r#"{"name":"Shonen classics"}"#).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.description.is_none());
    }

    #[test]
    fn long_descriptions_are_rejected() {
        let request = BattlePackRequest {
            name: "Isekai".into(),
            description: Some("x".repeat(501)),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));
    }

    #[test]
    fn pack_acknowledgement_omits_the_image() {
        let created = BattleContentCreated {
            success: true,
            id: Uuid::nil(),
            image_url: None,
        };
        let json = serde_json::to_value(&created).unwrap();
        assert!(json.get("imageUrl").is_none());
    }
}
