use tracing::info;

use crate::{
    dao::models::UserEntity,
    dto::user::{UpsertUserRequest, UserResponse},
    error::ServiceError,
    state::SharedState,
};

/// Placeholder shown for users missing from the directory.
pub const UNKNOWN_USERNAME: &str = "user";

/// Record the display name of `user_id`, replacing any previous one.
pub async fn upsert_user(
    state: &SharedState,
    user_id: &str,
    request: UpsertUserRequest,
) -> Result<UserResponse, ServiceError> {
    let user_id = user_id.trim();
    let username = request.username.trim();
    if user_id.is_empty() {
        return Err(ServiceError::InvalidInput("user id is required".into()));
    }
    if username.is_empty() {
        return Err(ServiceError::InvalidInput("username is required".into()));
    }

    let store = state.require_quiz_store().await?;
    store
        .upsert_user(UserEntity {
            id: user_id.to_owned(),
            username: username.to_owned(),
        })
        .await?;

    // Display names are baked into cached rankings.
    state.cache().flush();
    info!(user_id, "directory entry updated");

    Ok(UserResponse {
        user_id: user_id.to_owned(),
        username: username.to_owned(),
    })
}
