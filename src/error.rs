use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::state::{
    arbiter::BoardBusy,
    match_state::MatchError,
    throw::InvalidThrow,
};

/// Errors returned by the match engine and lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Input rejected before touching any state.
    #[error("invalid input: {0}")]
    Validation(String),
    /// The sector/multiplier pair is not on the board.
    #[error(transparent)]
    InvalidThrow(#[from] InvalidThrow),
    /// Another lobby is playing on the board.
    #[error("dartboard is busy with lobby `{holder}`")]
    BoardBusy {
        /// Lobby holding the board.
        holder: Uuid,
    },
    /// No hardware link, matches cannot start.
    #[error("dartboard is not connected")]
    BoardDisconnected,
    /// Throw or undo on a lobby without a running match.
    #[error("match is not in progress")]
    NotInProgress,
    /// Undo with an empty history.
    #[error("no throw to undo")]
    NothingToUndo,
    /// History references a player missing from the match.
    #[error("player `{0}` is not part of this match")]
    UnknownPlayer(Uuid),
    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller lacks the role required for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Operation conflicts with the current lobby state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The engine task is gone.
    #[error("match engine unavailable")]
    EngineUnavailable,
}

impl From<MatchError> for EngineError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::NotInProgress => EngineError::NotInProgress,
            MatchError::NothingToUndo => EngineError::NothingToUndo,
            MatchError::UnknownPlayer(id) => EngineError::UnknownPlayer(id),
        }
    }
}

impl From<BoardBusy> for EngineError {
    fn from(err: BoardBusy) -> Self {
        EngineError::BoardBusy { holder: err.holder }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller identity missing or unknown.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller identified but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Validation(_) | EngineError::InvalidThrow(_) => {
                AppError::BadRequest(message)
            }
            EngineError::NotFound(_) => AppError::NotFound(message),
            EngineError::Forbidden(_) => AppError::Forbidden(message),
            EngineError::BoardBusy { .. }
            | EngineError::NotInProgress
            | EngineError::NothingToUndo
            | EngineError::UnknownPlayer(_)
            | EngineError::InvalidState(_) => AppError::Conflict(message),
            EngineError::BoardDisconnected | EngineError::EngineUnavailable => {
                AppError::ServiceUnavailable(message)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_http_statuses() {
        let cases = [
            (EngineError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                EngineError::BoardBusy {
                    holder: Uuid::nil(),
                },
                StatusCode::CONFLICT,
            ),
            (EngineError::BoardDisconnected, StatusCode::SERVICE_UNAVAILABLE),
            (EngineError::NothingToUndo, StatusCode::CONFLICT),
            (EngineError::Forbidden("host only".into()), StatusCode::FORBIDDEN),
            (EngineError::NotFound("lobby".into()), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
