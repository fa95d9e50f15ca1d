use serde::Serialize;
use utoipa::ToSchema;

use crate::services::dartboard::LinkState;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Dartboard link state.
    pub dartboard: LinkState,
}

impl HealthResponse {
    /// Health response for the given link state; degraded unless connected.
    pub fn from_link(dartboard: LinkState) -> Self {
        let status = if dartboard == LinkState::Connected {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            dartboard,
        }
    }
}
