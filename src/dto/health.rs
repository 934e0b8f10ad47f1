use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of operations waiting in the offline queue.
    pub pending_operations: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(pending_operations: usize) -> Self {
        Self {
            status: "ok".to_string(),
            pending_operations,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(pending_operations: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            pending_operations,
        }
    }
}
