/// Ownership of the single physical dartboard.
pub mod arbiter;
/// Per-lobby and global event fan-out.
pub mod broadcast;
/// Checkout suggestions for X01 finishes.
pub mod checkout;
/// Lobby model and capacity rules.
pub mod lobby;
/// X01 match state machine.
pub mod match_state;
/// Player profiles and lifetime statistics.
pub mod player;
/// Lobby and player bookkeeping owned by the match engine.
pub mod registry;
/// Dart classification.
pub mod throw;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    services::{dartboard::LinkState, engine::EngineHandle},
};

use self::broadcast::BroadcastHub;

/// Reference-counted application state handed to routers and sockets.
pub type SharedState = Arc<AppState>;

/// Handles shared by every request handler and socket.
pub struct AppState {
    engine: EngineHandle,
    hub: Arc<BroadcastHub>,
    link: watch::Receiver<LinkState>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        engine: EngineHandle,
        hub: Arc<BroadcastHub>,
        link: watch::Receiver<LinkState>,
        config: AppConfig,
    ) -> SharedState {
        Arc::new(Self {
            engine,
            hub,
            link,
            config,
        })
    }

    /// Handle to the match engine task.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Broadcast hub feeding viewer sockets.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Current dartboard link state.
    pub fn link_state(&self) -> LinkState {
        *self.link.borrow()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
