use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::lobby::{
        ActionResponse, CreateLobbyRequest, LeaveLobbyResponse, SetModeRequest, ThrowRequest,
    },
    error::{AppError, EngineError},
    routes::caller::CallerId,
    state::{
        SharedState,
        lobby::{Lobby, LobbySummary},
        match_state::MatchState,
        registry::LeaveOutcome,
        throw::classify,
    },
};

/// Lobby lifecycle and match control endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/lobbies", get(list_lobbies).post(create_lobby))
        .route("/lobbies/{id}", get(get_lobby))
        .route("/lobbies/{id}/join", post(join_lobby))
        .route("/lobbies/{id}/leave", post(leave_lobby))
        .route("/lobbies/{id}/mode", put(set_mode))
        .route("/lobbies/{id}/start", post(start_match))
        .route("/lobbies/{id}/end", post(end_match))
        .route("/lobbies/{id}/abort", post(abort_match))
        .route("/lobbies/{id}/throws", post(apply_throw))
        .route("/lobbies/{id}/simulate-throw", post(simulate_throw))
        .route("/lobbies/{id}/undo-throw", post(undo_throw))
}

/// List lobbies that have not finished.
#[utoipa::path(
    get,
    path = "/lobbies",
    tag = "lobbies",
    responses((status = 200, description = "Open lobbies", body = [LobbySummary]))
)]
pub async fn list_lobbies(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LobbySummary>>, AppError> {
    Ok(Json(state.engine().list_lobbies().await?))
}

/// Open a lobby hosted by the caller.
#[utoipa::path(
    post,
    path = "/lobbies",
    tag = "lobbies",
    request_body = CreateLobbyRequest,
    params(("X-Player-Id" = Uuid, Header, description = "Calling player")),
    responses(
        (status = 201, description = "Lobby created", body = Lobby),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "Player already seated in another lobby")
    )
)]
pub async fn create_lobby(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Json(payload): Json<CreateLobbyRequest>,
) -> Result<(StatusCode, Json<Lobby>), AppError> {
    payload.validate()?;
    let lobby = state
        .engine()
        .create_lobby(player_id, payload.name, payload.max_players)
        .await?;
    Ok((StatusCode::CREATED, Json(lobby)))
}

/// Retrieve a lobby with its match state.
#[utoipa::path(
    get,
    path = "/lobbies/{id}",
    tag = "lobbies",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    responses(
        (status = 200, description = "Lobby", body = Lobby),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn get_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Lobby>, AppError> {
    Ok(Json(state.engine().lobby(id).await?))
}

/// Take a seat in a waiting lobby.
#[utoipa::path(
    post,
    path = "/lobbies/{id}/join",
    tag = "lobbies",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses(
        (status = 200, description = "Lobby joined", body = Lobby),
        (status = 409, description = "Lobby full, playing, or player seated elsewhere")
    )
)]
pub async fn join_lobby(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Lobby>, AppError> {
    Ok(Json(state.engine().join_lobby(player_id, id).await?))
}

/// Leave a lobby. The host hands over to the next player; the last player deletes it.
#[utoipa::path(
    post,
    path = "/lobbies/{id}/leave",
    tag = "lobbies",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses((status = 200, description = "Lobby left", body = LeaveLobbyResponse))
)]
pub async fn leave_lobby(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveLobbyResponse>, AppError> {
    let outcome = state.engine().leave_lobby(player_id, id).await?;
    Ok(Json(LeaveLobbyResponse {
        lobby_deleted: outcome == LeaveOutcome::Deleted,
    }))
}

/// Select the game mode (host only).
#[utoipa::path(
    put,
    path = "/lobbies/{id}/mode",
    tag = "lobbies",
    request_body = SetModeRequest,
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses(
        (status = 200, description = "Mode changed", body = Lobby),
        (status = 403, description = "Caller is not the host")
    )
)]
pub async fn set_mode(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetModeRequest>,
) -> Result<Json<Lobby>, AppError> {
    Ok(Json(state.engine().set_mode(player_id, id, payload.mode).await?))
}

/// Start the match and claim the dartboard (host only).
#[utoipa::path(
    post,
    path = "/lobbies/{id}/start",
    tag = "match",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses(
        (status = 200, description = "Match started", body = MatchState),
        (status = 400, description = "Not enough players or unsupported mode"),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Dartboard busy with another lobby"),
        (status = 503, description = "Dartboard disconnected")
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchState>, AppError> {
    Ok(Json(state.engine().start_match(player_id, id).await?))
}

/// End the match and reopen the lobby (host only).
#[utoipa::path(
    post,
    path = "/lobbies/{id}/end",
    tag = "match",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses(
        (status = 200, description = "Match ended", body = ActionResponse),
        (status = 409, description = "No match, or a player already sits in another lobby")
    )
)]
pub async fn end_match(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    state.engine().end_match(player_id, id).await?;
    Ok(Json(ActionResponse::new("match ended")))
}

/// Abort the match and delete the lobby (any member).
#[utoipa::path(
    post,
    path = "/lobbies/{id}/abort",
    tag = "match",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses((status = 200, description = "Match aborted", body = ActionResponse))
)]
pub async fn abort_match(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let aborted_by = state.engine().abort_match(player_id, id).await?;
    Ok(Json(ActionResponse::new(format!("match aborted by {aborted_by}"))))
}

/// Record a dart entered by hand.
#[utoipa::path(
    post,
    path = "/lobbies/{id}/throws",
    tag = "match",
    request_body = ThrowRequest,
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    responses(
        (status = 200, description = "Updated match", body = MatchState),
        (status = 400, description = "Sector or multiplier off the board"),
        (status = 409, description = "No match in progress")
    )
)]
pub async fn apply_throw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ThrowRequest>,
) -> Result<Json<MatchState>, AppError> {
    let dart = classify(payload.sector, payload.multiplier).map_err(EngineError::from)?;
    Ok(Json(state.engine().apply_throw(id, dart).await?))
}

/// Record a random dart.
#[utoipa::path(
    post,
    path = "/lobbies/{id}/simulate-throw",
    tag = "match",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    responses(
        (status = 200, description = "Updated match", body = MatchState),
        (status = 409, description = "No match in progress")
    )
)]
pub async fn simulate_throw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchState>, AppError> {
    Ok(Json(state.engine().simulate_throw(id).await?))
}

/// Revert the last recorded dart (host only).
#[utoipa::path(
    post,
    path = "/lobbies/{id}/undo-throw",
    tag = "match",
    params(
        ("X-Player-Id" = Uuid, Header, description = "Calling player"),
        ("id" = Uuid, Path, description = "Lobby identifier")
    ),
    responses(
        (status = 200, description = "Updated match", body = MatchState),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Nothing to undo")
    )
)]
pub async fn undo_throw(
    State(state): State<SharedState>,
    CallerId(player_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchState>, AppError> {
    Ok(Json(state.engine().undo_last_throw(player_id, id).await?))
}
