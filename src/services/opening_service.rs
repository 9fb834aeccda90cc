use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::OpeningEntity,
    dto::{
        item::DeleteResponse,
        opening::{CreateOpeningRequest, CreateOpeningResponse, OpeningResponse, OpeningsQuery},
    },
    error::ServiceError,
    quiz_date::QuizDate,
    services::optional_date,
    state::SharedState,
};

/// Openings of one day, or of every day, newest day first.
pub async fn list_openings(
    state: &SharedState,
    query: OpeningsQuery,
) -> Result<Vec<OpeningResponse>, ServiceError> {
    let quiz_date = optional_date(query.date.as_deref())?;
    let key = match quiz_date {
        Some(date) => format!("openings:{date}"),
        None => "openings:all".to_owned(),
    };

    state
        .cache()
        .get_or_try_insert_with(&key, state.config().cache.slow, || async {
            let store = state.require_quiz_store().await?;
            let openings = store.list_openings(quiz_date).await?;
            Ok::<_, ServiceError>(openings.into_iter().map(OpeningResponse::from).collect())
        })
        .await
}

/// Schedule a new opening clip.
pub async fn create_opening(
    state: &SharedState,
    created_by: &str,
    request: CreateOpeningRequest,
) -> Result<CreateOpeningResponse, ServiceError> {
    let quiz_date = QuizDate::parse(request.quiz_date.trim())
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let store = state.require_quiz_store().await?;

    let entity = OpeningEntity {
        id: Uuid::new_v4(),
        title: request.title.trim().to_owned(),
        video_url: request.video_url.trim().to_owned(),
        start_time: request.start_time,
        end_time: request.end_time,
        quiz_date,
        created_at: SystemTime::now(),
        created_by: Some(created_by.to_owned()),
    };
    store.insert_opening(entity.clone()).await?;

    state.cache().flush();
    info!(opening_id = %entity.id, %quiz_date, "opening created");

    Ok(CreateOpeningResponse {
        success: true,
        opening: entity.into(),
    })
}

/// Delete an opening clip.
pub async fn delete_opening(state: &SharedState, id: Uuid) -> Result<DeleteResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    if !store.delete_opening(id).await? {
        return Err(ServiceError::NotFound(format!("opening `{id}` not found")));
    }

    state.cache().flush();
    info!(opening_id = %id, "opening deleted");
    Ok(DeleteResponse {
        success: true,
        deleted: id,
    })
}
