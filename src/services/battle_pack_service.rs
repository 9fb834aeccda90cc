//! Battle packs and the anime contenders drawn from them.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{BattleAnimeEntity, BattlePackEntity},
    dto::battle_pack::{
        BattleAnimeListResponse, BattleAnimeResponse, BattleContentCreated, BattlePackRequest,
        BattlePackResponse, BattlePacksResponse,
    },
    error::ServiceError,
    services::uploads::{UploadedFile, check_image, discard_files, store_file},
    state::SharedState,
};

const MANUAL_SOURCE: &str = "manual";

/// Contender upload, as read from the multipart form.
#[derive(Debug, Clone, Default)]
pub struct BattleAnimeInput {
    /// Required image of the contender.
    pub image: Option<UploadedFile>,
    /// Anime title; required.
    pub title: String,
    /// External identifier of the anime; required.
    pub anime_id: String,
    /// Pack the contender joins, as sent by the client.
    pub pack_id: String,
    /// External catalog name; `manual` when absent.
    pub source_id: Option<String>,
}

/// Every battle pack, newest first.
pub async fn list_packs(state: &SharedState) -> Result<BattlePacksResponse, ServiceError> {
    state
        .cache()
        .get_or_try_insert_with("battle-packs", state.config().cache.slow, || async {
            let store = state.require_quiz_store().await?;
            let packs = store.list_battle_packs().await?;
            Ok::<_, ServiceError>(BattlePacksResponse {
                packs: packs.into_iter().map(BattlePackResponse::from).collect(),
            })
        })
        .await
}

/// Contenders of one pack; an unknown pack simply has none.
pub async fn list_anime(
    state: &SharedState,
    pack_id: Uuid,
) -> Result<BattleAnimeListResponse, ServiceError> {
    let key = format!("battles:{pack_id}");
    state
        .cache()
        .get_or_try_insert_with(&key, state.config().cache.slow, || async {
            let store = state.require_quiz_store().await?;
            let anime = store.list_battle_anime(pack_id).await?;
            Ok::<_, ServiceError>(BattleAnimeListResponse {
                anime: anime.into_iter().map(BattleAnimeResponse::from).collect(),
            })
        })
        .await
}

/// Create an empty battle pack owned by `created_by`.
pub async fn create_pack(
    state: &SharedState,
    created_by: &str,
    request: BattlePackRequest,
) -> Result<BattleContentCreated, ServiceError> {
    let store = state.require_quiz_store().await?;
    let pack = BattlePackEntity {
        id: Uuid::new_v4(),
        name: request.name.trim().to_owned(),
        description: request
            .description
            .map(|d| d.trim().to_owned())
            .unwrap_or_default(),
        created_by: created_by.to_owned(),
        created_at: SystemTime::now(),
    };
    store.insert_battle_pack(pack.clone()).await?;

    state.cache().flush();
    info!(pack_id = %pack.id, name = %pack.name, "battle pack created");
    Ok(BattleContentCreated {
        success: true,
        id: pack.id,
        image_url: None,
    })
}

/// Store the contender's image and add it to an existing pack.
pub async fn create_anime(
    state: &SharedState,
    owner_id: &str,
    input: BattleAnimeInput,
) -> Result<BattleContentCreated, ServiceError> {
    let image = input
        .image
        .ok_or_else(|| ServiceError::InvalidInput("image is required".into()))?;
    let title = input.title.trim().to_owned();
    let anime_id = input.anime_id.trim().to_owned();
    if title.is_empty() || anime_id.is_empty() {
        return Err(ServiceError::InvalidInput(
            "title, animeId and packId are required".into(),
        ));
    }
    let pack_id = Uuid::parse_str(input.pack_id.trim())
        .map_err(|_| ServiceError::InvalidInput("packId must be a UUID".into()))?;
    check_image("image", &image, state.config().max_image_bytes)?;

    let store = state.require_quiz_store().await?;
    if store.find_battle_pack(pack_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("battle pack `{pack_id}` not found")));
    }

    let image_ref = store_file(state, image).await?;
    let anime = BattleAnimeEntity {
        id: Uuid::new_v4(),
        pack_id,
        owner_id: owner_id.to_owned(),
        title,
        image_ref: image_ref.clone(),
        anime_id,
        source_id: input
            .source_id
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| MANUAL_SOURCE.to_owned()),
        created_at: SystemTime::now(),
    };

    if let Err(err) = store.insert_battle_anime(anime.clone()).await {
        discard_files(state, vec![image_ref]).await;
        return Err(err.into());
    }

    state.cache().flush();
    info!(anime_id = %anime.id, %pack_id, "battle contender added");
    Ok(BattleContentCreated {
        success: true,
        id: anime.id,
        image_url: Some(image_ref),
    })
}
