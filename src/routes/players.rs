use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::player::RegisterPlayerRequest,
    error::AppError,
    state::{SharedState, player::User},
};

/// Player registration and profiles.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(register_player))
        .route("/players/{id}", get(get_player))
}

/// Register a new player.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = RegisterPlayerRequest,
    responses(
        (status = 201, description = "Player registered", body = User),
        (status = 400, description = "Username invalid or already taken")
    )
)]
pub async fn register_player(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterPlayerRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.validate()?;
    let user = state.engine().register_player(payload.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Retrieve a player profile with lifetime statistics.
#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = Uuid, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Player profile", body = User),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.engine().player(id).await?))
}
