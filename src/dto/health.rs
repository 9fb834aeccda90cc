use serde::Serialize;
use utoipa::ToSchema;

/// Whether the quiz store is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store reachable.
    Ok,
    /// Reads and writes answer 503 until storage comes back.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current storage status.
    pub status: HealthStatus,
}

impl From<bool> for HealthResponse {
    /// Build the response from the degraded flag.
    fn from(degraded: bool) -> Self {
        let status = if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self { status }
    }
}
