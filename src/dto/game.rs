use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Whether a new match could start on the board right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CanStartResponse {
    /// No other match holds the board and the board is usable.
    pub can_start: bool,
    /// Lobby currently holding the board.
    pub active_game_id: Option<Uuid>,
    /// Hardware link is up.
    pub dartboard_connected: bool,
}
