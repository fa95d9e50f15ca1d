use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{dto::validation::validate_lobby_name, state::match_state::GameMode};

/// Payload opening a lobby.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateLobbyRequest {
    /// Display name, `Game <username>` when omitted or blank.
    #[serde(default)]
    pub name: Option<String>,
    /// Capacity, clamped to 2-8 (default 4).
    #[serde(default)]
    pub max_players: Option<u32>,
}

impl Validate for CreateLobbyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref name) = self.name {
            if let Err(e) = validate_lobby_name(name) {
                errors.add("name", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload selecting the lobby mode.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetModeRequest {
    pub mode: GameMode,
}

/// A dart entered by hand.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ThrowRequest {
    /// 1-20, or 25 for the bull.
    pub sector: u32,
    /// 1-3. A treble bull counts as a double.
    pub multiplier: u32,
}

/// Result of leaving a lobby.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveLobbyResponse {
    /// The lobby was removed because it became empty.
    pub lobby_deleted: bool,
}

/// Generic action acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
