use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::state::{lobby::Lobby, player::User};

/// Everything the server persists, written as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Registered players with their statistics.
    #[serde(default)]
    pub users: Vec<User>,
    /// Lobbies in creation order.
    #[serde(default)]
    pub lobbies: Vec<Lobby>,
    /// Lobby holding the dartboard.
    #[serde(default)]
    pub active_game: Option<Uuid>,
}

impl Snapshot {
    /// Keep players only. Lobbies and the board holder do not survive a restart.
    pub fn into_clean_slate(self) -> Self {
        if !self.lobbies.is_empty() || self.active_game.is_some() {
            info!(
                lobbies = self.lobbies.len(),
                active_game = ?self.active_game,
                "discarding lobbies from previous run"
            );
        }
        Self {
            users: self.users,
            lobbies: Vec::new(),
            active_game: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        lobby::{LobbyStatus, clamp_max_players},
        match_state::GameMode,
        player::{DEFAULT_AVATAR, PlayerStats},
    };

    #[test]
    fn clean_slate_keeps_only_users() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            avatar: DEFAULT_AVATAR.into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            stats: PlayerStats::default(),
        };
        let lobby = Lobby {
            id: Uuid::new_v4(),
            name: "Game alice".into(),
            host_id: user.id,
            host_name: user.username.clone(),
            players: Vec::new(),
            max_players: clamp_max_players(None),
            mode: GameMode::X501,
            status: LobbyStatus::Playing,
            created_at: "2026-01-01T00:00:00Z".into(),
            game_state: None,
        };
        let snapshot = Snapshot {
            users: vec![user.clone()],
            lobbies: vec![lobby.clone()],
            active_game: Some(lobby.id),
        };

        let cleaned = snapshot.into_clean_slate();
        assert_eq!(cleaned.users, vec![user]);
        assert!(cleaned.lobbies.is_empty());
        assert_eq!(cleaned.active_game, None);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"users": []}"#).unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }
}
