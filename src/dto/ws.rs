use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from viewer WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerInboundMessage {
    JoinLobby { lobby_id: Uuid },
    LeaveLobby { lobby_id: Uuid },
    #[serde(other)]
    Unknown,
}
