use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::match_state::{GameMode, MatchState};

/// Smallest lobby capacity.
pub const MIN_PLAYERS: u8 = 2;
/// Largest lobby capacity.
pub const MAX_PLAYERS: u8 = 8;
/// Capacity used when the creator does not pick one.
pub const DEFAULT_MAX_PLAYERS: u8 = 4;

/// Lifecycle of a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyStatus {
    /// Gathering players.
    Waiting,
    /// A match holds the board.
    Playing,
    /// The match has a winner and awaits the host.
    Finished,
}

/// Player seated in a lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LobbyPlayer {
    /// Player identifier.
    pub id: Uuid,
    /// Display name when joining.
    pub username: String,
    /// Avatar preset name.
    pub avatar: String,
    /// Readiness flag, set for the creator.
    pub is_ready: bool,
    /// Whether this player hosts the lobby.
    pub is_host: bool,
}

/// A group of players sharing a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lobby {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current host.
    pub host_id: Uuid,
    /// Name of the current host.
    pub host_name: String,
    /// Seated players in join order.
    pub players: Vec<LobbyPlayer>,
    /// Capacity, within `[MIN_PLAYERS, MAX_PLAYERS]`.
    pub max_players: u8,
    /// Selected mode.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: LobbyStatus,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Match in progress or just finished.
    pub game_state: Option<MatchState>,
}

/// Compact listing entry for a lobby.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LobbySummary {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Name of the current host.
    pub host_name: String,
    /// Number of seated players.
    pub player_count: usize,
    /// Capacity.
    pub max_players: u8,
    /// Selected mode.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: LobbyStatus,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl Lobby {
    /// Whether the player is seated here.
    pub fn has_player(&self, player_id: Uuid) -> bool {
        self.players.iter().any(|player| player.id == player_id)
    }

    /// Whether the player hosts this lobby.
    pub fn is_host(&self, player_id: Uuid) -> bool {
        self.host_id == player_id
    }

    /// Whether the lobby still counts toward the one-active-lobby rule.
    pub fn is_active(&self) -> bool {
        self.status != LobbyStatus::Finished
    }

    /// Whether the lobby's match is accepting throws.
    pub fn is_playing(&self) -> bool {
        self.status == LobbyStatus::Playing
            && self.game_state.as_ref().is_some_and(MatchState::is_playing)
    }

    /// Whether every seat is taken.
    pub fn is_full(&self) -> bool {
        self.players.len() >= usize::from(self.max_players)
    }
}

impl From<&Lobby> for LobbySummary {
    fn from(lobby: &Lobby) -> Self {
        Self {
            id: lobby.id,
            name: lobby.name.clone(),
            host_name: lobby.host_name.clone(),
            player_count: lobby.players.len(),
            max_players: lobby.max_players,
            mode: lobby.mode,
            status: lobby.status,
            created_at: lobby.created_at.clone(),
        }
    }
}

/// Clamp a requested capacity into the supported range.
pub fn clamp_max_players(requested: Option<u32>) -> u8 {
    requested.map_or(DEFAULT_MAX_PLAYERS, |count| {
        let clamped = count.clamp(u32::from(MIN_PLAYERS), u32::from(MAX_PLAYERS));
        u8::try_from(clamped).unwrap_or(MAX_PLAYERS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(clamp_max_players(None), 4);
        assert_eq!(clamp_max_players(Some(0)), 2);
        assert_eq!(clamp_max_players(Some(1)), 2);
        assert_eq!(clamp_max_players(Some(6)), 6);
        assert_eq!(clamp_max_players(Some(42)), 8);
        assert_eq!(clamp_max_players(Some(300)), 8);
        assert_eq!(clamp_max_players(Some(u32::MAX)), 8);
    }
}
