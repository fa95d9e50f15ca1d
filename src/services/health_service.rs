use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report health, degraded while the dartboard link is down.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let link = state.link_state();
    if !link.is_connected() {
        warn!(?link, "dartboard not connected (degraded mode)");
    }
    HealthResponse::from_link(link)
}
