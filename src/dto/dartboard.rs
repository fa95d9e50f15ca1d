use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::dartboard::LinkState;

/// One newline-delimited JSON frame sent by the board firmware.
#[derive(Debug, Deserialize)]
pub struct RawFrame {
    pub event: String,
    #[serde(default)]
    pub sector: Option<u32>,
    #[serde(default)]
    pub multiplier: Option<u32>,
    #[serde(default)]
    pub score: Option<u32>,
}

/// Hardware link details exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DartboardStatusResponse {
    pub connected: bool,
    pub state: LinkState,
    pub port: String,
    pub baud_rate: u32,
}
