use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Display name pushed by the identity provider for a user id.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpsertUserRequest {
    /// Name shown in leaderboards.
    #[validate(length(min = 1, max = 100))]
    pub username: String,
}

/// Directory entry after an upsert.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// Identifier from the identity provider.
    pub user_id: String,
    /// Stored display name.
    pub username: String,
}
