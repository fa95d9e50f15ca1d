use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{dartboard::DartboardStatusResponse, game::CanStartResponse},
    error::AppError,
    state::SharedState,
};

/// Board availability endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/can-start", get(can_start))
        .route("/dartboard/status", get(dartboard_status))
}

/// Whether a new match could claim the dartboard.
#[utoipa::path(
    get,
    path = "/game/can-start",
    tag = "game",
    responses((status = 200, description = "Board availability", body = CanStartResponse))
)]
pub async fn can_start(State(state): State<SharedState>) -> Result<Json<CanStartResponse>, AppError> {
    Ok(Json(state.engine().can_start().await?))
}

/// Hardware link details.
#[utoipa::path(
    get,
    path = "/dartboard/status",
    tag = "game",
    responses((status = 200, description = "Dartboard link state", body = DartboardStatusResponse))
)]
pub async fn dartboard_status(State(state): State<SharedState>) -> Json<DartboardStatusResponse> {
    let link = state.link_state();
    let config = state.config();
    Json(DartboardStatusResponse {
        connected: link.is_connected(),
        state: link,
        port: config.serial_port.clone(),
        baud_rate: config.baud_rate,
    })
}
