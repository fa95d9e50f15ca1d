use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{lobby::Lobby, match_state::MatchState};

/// Messages pushed to viewer sockets, encoded as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Match state after a throw, undo or start.
    GameUpdate(MatchState),
    /// A match was started in the lobby.
    GameStarted(MatchState),
    /// The host ended the match; the lobby is waiting again.
    GameEnded,
    /// A member aborted the match and the lobby was removed.
    GameAborted(GameAbortedEvent),
    /// Lobby roster, mode or status changed.
    LobbyUpdate(Lobby),
    /// Hosting passed to another player.
    HostChanged(HostChangedEvent),
    /// The lobby no longer exists.
    LobbyDeleted,
    /// Dartboard link went up or down.
    DartboardStatus(DartboardStatusEvent),
}

impl ServerMessage {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::GameUpdate(_) => "game_update",
            ServerMessage::GameStarted(_) => "game_started",
            ServerMessage::GameEnded => "game_ended",
            ServerMessage::GameAborted(_) => "game_aborted",
            ServerMessage::LobbyUpdate(_) => "lobby_update",
            ServerMessage::HostChanged(_) => "host_changed",
            ServerMessage::LobbyDeleted => "lobby_deleted",
            ServerMessage::DartboardStatus(_) => "dartboard_status",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Payload of `game_aborted`.
pub struct GameAbortedEvent {
    pub aborted_by: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Payload of `host_changed`.
pub struct HostChangedEvent {
    pub new_host_id: Uuid,
    pub new_host_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Payload of `dartboard_status`.
pub struct DartboardStatusEvent {
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_adjacent_tagging() {
        let json = serde_json::to_value(ServerMessage::DartboardStatus(DartboardStatusEvent {
            connected: true,
        }))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "dartboard_status", "data": {"connected": true}})
        );

        let json = serde_json::to_value(ServerMessage::LobbyDeleted).unwrap();
        assert_eq!(json, serde_json::json!({"event": "lobby_deleted"}));
        assert_eq!(ServerMessage::GameEnded.name(), "game_ended");
    }
}
