use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `degraded` when no quiz store is installed or the installed one fails a ping.
///
/// A failed ping does not flip the shared flag; the storage supervisor owns that.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.quiz_store().await else {
        warn!("healthcheck while no quiz store is installed");
        return HealthResponse::from(true);
    };

    let reachable = match store.health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "quiz store ping failed");
            false
        }
    };

    HealthResponse::from(!reachable || state.is_degraded().await)
}
