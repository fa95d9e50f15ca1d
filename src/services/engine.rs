//! Match engine actor.
//!
//! A single Tokio task owns the [`Registry`] and processes [`EngineCommand`]s
//! one at a time, so lobby changes, throws and undos never interleave. After
//! every successful mutation the queued events are published on the
//! [`BroadcastHub`] and a fresh snapshot is handed to the storage writer.

use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::snapshot::Snapshot,
    dto::{events::ServerMessage, game::CanStartResponse},
    error::EngineError,
    services::dartboard::LinkState,
    state::{
        broadcast::{BroadcastHub, ServerEvent},
        lobby::{Lobby, LobbySummary},
        match_state::{GameMode, MatchState},
        player::User,
        registry::{LeaveOutcome, Registry},
        throw::Throw,
    },
};

/// Default depth of the command queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Commands accepted by the engine task.
pub(crate) enum EngineCommand {
    RegisterPlayer {
        username: String,
        reply: Reply<User>,
    },
    Player {
        player_id: Uuid,
        reply: Reply<User>,
    },
    ListLobbies {
        reply: Reply<Vec<LobbySummary>>,
    },
    Lobby {
        lobby_id: Uuid,
        reply: Reply<Lobby>,
    },
    WatchLobby {
        lobby_id: Uuid,
        reply: Reply<(Lobby, broadcast::Receiver<ServerEvent>)>,
    },
    CreateLobby {
        player_id: Uuid,
        name: Option<String>,
        max_players: Option<u32>,
        reply: Reply<Lobby>,
    },
    JoinLobby {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<Lobby>,
    },
    LeaveLobby {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<LeaveOutcome>,
    },
    SetMode {
        player_id: Uuid,
        lobby_id: Uuid,
        mode: GameMode,
        reply: Reply<Lobby>,
    },
    StartMatch {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<MatchState>,
    },
    EndMatch {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<()>,
    },
    AbortMatch {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<String>,
    },
    ApplyThrow {
        lobby_id: Uuid,
        dart: Throw,
        reply: Reply<MatchState>,
    },
    SimulateThrow {
        lobby_id: Uuid,
        reply: Reply<MatchState>,
    },
    UndoThrow {
        player_id: Uuid,
        lobby_id: Uuid,
        reply: Reply<MatchState>,
    },
    CanStart {
        reply: Reply<CanStartResponse>,
    },
    /// Hit reported by the hardware; no reply.
    BoardHit { dart: Throw },
}

/// Tunables of the engine task.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Let matches start while the board is disconnected (simulation rigs).
    pub allow_start_without_board: bool,
    /// Depth of the command queue.
    pub queue_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            allow_start_without_board: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Handle to the running engine. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::EngineUnavailable)?;
        reply_rx
            .await
            .map_err(|_| EngineError::EngineUnavailable)?
    }

    /// Register a new player.
    pub async fn register_player(&self, username: String) -> Result<User, EngineError> {
        self.request(|reply| EngineCommand::RegisterPlayer { username, reply })
            .await
    }

    /// Fetch a player profile.
    pub async fn player(&self, player_id: Uuid) -> Result<User, EngineError> {
        self.request(|reply| EngineCommand::Player { player_id, reply })
            .await
    }

    /// List lobbies that have not finished.
    pub async fn list_lobbies(&self) -> Result<Vec<LobbySummary>, EngineError> {
        self.request(|reply| EngineCommand::ListLobbies { reply })
            .await
    }

    /// Fetch a lobby.
    pub async fn lobby(&self, lobby_id: Uuid) -> Result<Lobby, EngineError> {
        self.request(|reply| EngineCommand::Lobby { lobby_id, reply })
            .await
    }

    /// Fetch a lobby together with a subscription to its channel.
    ///
    /// The receiver only yields events published after the returned state.
    pub async fn watch_lobby(
        &self,
        lobby_id: Uuid,
    ) -> Result<(Lobby, broadcast::Receiver<ServerEvent>), EngineError> {
        self.request(|reply| EngineCommand::WatchLobby { lobby_id, reply })
            .await
    }

    /// Open a lobby hosted by `player_id`.
    pub async fn create_lobby(
        &self,
        player_id: Uuid,
        name: Option<String>,
        max_players: Option<u32>,
    ) -> Result<Lobby, EngineError> {
        self.request(|reply| EngineCommand::CreateLobby {
            player_id,
            name,
            max_players,
            reply,
        })
        .await
    }

    /// Seat `player_id` in a lobby.
    pub async fn join_lobby(&self, player_id: Uuid, lobby_id: Uuid) -> Result<Lobby, EngineError> {
        self.request(|reply| EngineCommand::JoinLobby {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// Remove `player_id` from a lobby.
    pub async fn leave_lobby(
        &self,
        player_id: Uuid,
        lobby_id: Uuid,
    ) -> Result<LeaveOutcome, EngineError> {
        self.request(|reply| EngineCommand::LeaveLobby {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// Change the lobby mode.
    pub async fn set_mode(
        &self,
        player_id: Uuid,
        lobby_id: Uuid,
        mode: GameMode,
    ) -> Result<Lobby, EngineError> {
        self.request(|reply| EngineCommand::SetMode {
            player_id,
            lobby_id,
            mode,
            reply,
        })
        .await
    }

    /// Start the lobby's match.
    pub async fn start_match(
        &self,
        player_id: Uuid,
        lobby_id: Uuid,
    ) -> Result<MatchState, EngineError> {
        self.request(|reply| EngineCommand::StartMatch {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// End the lobby's match.
    pub async fn end_match(&self, player_id: Uuid, lobby_id: Uuid) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::EndMatch {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// Abort the lobby's match, deleting the lobby.
    pub async fn abort_match(&self, player_id: Uuid, lobby_id: Uuid) -> Result<String, EngineError> {
        self.request(|reply| EngineCommand::AbortMatch {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// Score a dart in the lobby's match.
    pub async fn apply_throw(&self, lobby_id: Uuid, dart: Throw) -> Result<MatchState, EngineError> {
        self.request(|reply| EngineCommand::ApplyThrow {
            lobby_id,
            dart,
            reply,
        })
        .await
    }

    /// Score a random dart in the lobby's match.
    pub async fn simulate_throw(&self, lobby_id: Uuid) -> Result<MatchState, EngineError> {
        self.request(|reply| EngineCommand::SimulateThrow { lobby_id, reply })
            .await
    }

    /// Revert the last dart of the lobby's match.
    pub async fn undo_last_throw(
        &self,
        player_id: Uuid,
        lobby_id: Uuid,
    ) -> Result<MatchState, EngineError> {
        self.request(|reply| EngineCommand::UndoThrow {
            player_id,
            lobby_id,
            reply,
        })
        .await
    }

    /// Whether a new match could claim the board.
    pub async fn can_start(&self) -> Result<CanStartResponse, EngineError> {
        self.request(|reply| EngineCommand::CanStart { reply })
            .await
    }

    /// Forward a hardware hit. Waits for queue space, not for processing.
    pub async fn board_hit(&self, dart: Throw) -> Result<(), EngineError> {
        self.sender
            .send(EngineCommand::BoardHit { dart })
            .await
            .map_err(|_| EngineError::EngineUnavailable)
    }
}

/// The engine task state.
pub struct Engine {
    registry: Registry,
    hub: Arc<BroadcastHub>,
    link: watch::Receiver<LinkState>,
    snapshots: watch::Sender<Snapshot>,
    options: EngineOptions,
    commands: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    /// Spawn the engine task. It stops once every handle is dropped.
    pub fn spawn(
        registry: Registry,
        hub: Arc<BroadcastHub>,
        link: watch::Receiver<LinkState>,
        snapshots: watch::Sender<Snapshot>,
        options: EngineOptions,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::channel(options.queue_capacity.max(1));
        let engine = Self {
            registry,
            hub,
            link,
            snapshots,
            options,
            commands,
        };
        let task = tokio::spawn(engine.run());
        (EngineHandle { sender }, task)
    }

    async fn run(mut self) {
        info!("match engine started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        info!("match engine stopped");
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::RegisterPlayer { username, reply } => {
                let result = self.registry.register_player(&username);
                self.finish(reply, result);
            }
            EngineCommand::Player { player_id, reply } => {
                respond(reply, self.registry.player(player_id));
            }
            EngineCommand::ListLobbies { reply } => {
                respond(reply, Ok(self.registry.list_lobbies()));
            }
            EngineCommand::Lobby { lobby_id, reply } => {
                respond(reply, self.registry.lobby(lobby_id));
            }
            EngineCommand::WatchLobby { lobby_id, reply } => {
                let result = self
                    .registry
                    .lobby(lobby_id)
                    .map(|lobby| (lobby, self.hub.subscribe_lobby(lobby_id)));
                respond(reply, result);
            }
            EngineCommand::CreateLobby {
                player_id,
                name,
                max_players,
                reply,
            } => {
                let result = self.registry.create_lobby(player_id, name, max_players);
                self.finish(reply, result);
            }
            EngineCommand::JoinLobby {
                player_id,
                lobby_id,
                reply,
            } => {
                let result = self.registry.join_lobby(player_id, lobby_id);
                self.finish(reply, result);
            }
            EngineCommand::LeaveLobby {
                player_id,
                lobby_id,
                reply,
            } => {
                let result = self.registry.leave_lobby(player_id, lobby_id);
                self.finish(reply, result);
            }
            EngineCommand::SetMode {
                player_id,
                lobby_id,
                mode,
                reply,
            } => {
                let result = self.registry.set_mode(player_id, lobby_id, mode);
                self.finish(reply, result);
            }
            EngineCommand::StartMatch {
                player_id,
                lobby_id,
                reply,
            } => {
                let usable = self.board_usable();
                let result = self.registry.start_match(player_id, lobby_id, usable);
                self.finish(reply, result);
            }
            EngineCommand::EndMatch {
                player_id,
                lobby_id,
                reply,
            } => {
                let result = self.registry.end_match(player_id, lobby_id);
                self.finish(reply, result);
            }
            EngineCommand::AbortMatch {
                player_id,
                lobby_id,
                reply,
            } => {
                let result = self.registry.abort_match(player_id, lobby_id);
                self.finish(reply, result);
            }
            EngineCommand::ApplyThrow {
                lobby_id,
                dart,
                reply,
            } => {
                let result = self.registry.apply_throw(lobby_id, dart);
                self.finish(reply, result);
            }
            EngineCommand::SimulateThrow { lobby_id, reply } => {
                let dart = Throw::random(&mut rand::rng());
                debug!(%lobby_id, %dart, "simulated throw");
                let result = self.registry.apply_throw(lobby_id, dart);
                self.finish(reply, result);
            }
            EngineCommand::UndoThrow {
                player_id,
                lobby_id,
                reply,
            } => {
                let result = self.registry.undo_last_throw(player_id, lobby_id);
                self.finish(reply, result);
            }
            EngineCommand::CanStart { reply } => {
                let connected = self.link.borrow().is_connected();
                let response = CanStartResponse {
                    can_start: self.board_usable() && self.registry.can_acquire_board(),
                    active_game_id: self.registry.board_holder(),
                    dartboard_connected: connected,
                };
                respond(reply, Ok(response));
            }
            EngineCommand::BoardHit { dart } => {
                if self.registry.board_hit(dart).is_some() {
                    self.commit();
                }
            }
        }
    }

    fn board_usable(&self) -> bool {
        self.options.allow_start_without_board || self.link.borrow().is_connected()
    }

    /// Publish and persist after a successful mutation, then reply.
    fn finish<T>(&mut self, reply: Reply<T>, result: Result<T, EngineError>) {
        if result.is_ok() {
            self.commit();
        }
        respond(reply, result);
    }

    fn commit(&mut self) {
        for (lobby_id, message) in self.registry.drain_events() {
            self.hub.publish_lobby(lobby_id, &message);
            if matches!(
                message,
                ServerMessage::LobbyDeleted | ServerMessage::GameAborted(_)
            ) {
                self.hub.close_lobby(lobby_id);
            }
        }
        self.snapshots.send_replace(self.registry.snapshot());
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, EngineError>) {
    if reply.send(result).is_err() {
        debug!("engine caller went away before the reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::throw::classify;

    struct Rig {
        engine: EngineHandle,
        hub: Arc<BroadcastHub>,
        link: watch::Sender<LinkState>,
        snapshots: watch::Receiver<Snapshot>,
    }

    fn rig(options: EngineOptions) -> Rig {
        let hub = Arc::new(BroadcastHub::new(32));
        let (link, link_rx) = watch::channel(LinkState::Connected);
        let (snapshot_tx, snapshots) = watch::channel(Snapshot::default());
        let (engine, _task) = Engine::spawn(
            Registry::new(),
            hub.clone(),
            link_rx,
            snapshot_tx,
            options,
        );
        Rig {
            engine,
            hub,
            link,
            snapshots,
        }
    }

    async fn two_player_lobby(engine: &EngineHandle) -> (Uuid, Uuid) {
        let host = engine.register_player("alice".into()).await.unwrap().id;
        let guest = engine.register_player("bob".into()).await.unwrap().id;
        let lobby = engine.create_lobby(host, None, None).await.unwrap().id;
        engine.join_lobby(guest, lobby).await.unwrap();
        (host, lobby)
    }

    #[tokio::test]
    async fn start_follows_the_link_state() {
        let rig = rig(EngineOptions::default());
        let (host, lobby) = two_player_lobby(&rig.engine).await;

        rig.link.send_replace(LinkState::Disconnected);
        assert_eq!(
            rig.engine.start_match(host, lobby).await,
            Err(EngineError::BoardDisconnected)
        );
        let can_start = rig.engine.can_start().await.unwrap();
        assert!(!can_start.can_start);
        assert!(!can_start.dartboard_connected);

        rig.link.send_replace(LinkState::Connected);
        rig.engine.start_match(host, lobby).await.unwrap();
        let can_start = rig.engine.can_start().await.unwrap();
        assert!(!can_start.can_start);
        assert_eq!(can_start.active_game_id, Some(lobby));
    }

    #[tokio::test]
    async fn override_allows_start_without_board() {
        let rig = rig(EngineOptions {
            allow_start_without_board: true,
            ..EngineOptions::default()
        });
        rig.link.send_replace(LinkState::Disconnected);
        let (host, lobby) = two_player_lobby(&rig.engine).await;

        assert!(rig.engine.start_match(host, lobby).await.is_ok());
    }

    #[tokio::test]
    async fn throws_are_broadcast_to_lobby_viewers() {
        let rig = rig(EngineOptions::default());
        let (host, lobby) = two_player_lobby(&rig.engine).await;
        let mut viewer = rig.hub.subscribe_lobby(lobby);

        rig.engine.start_match(host, lobby).await.unwrap();
        rig.engine
            .apply_throw(lobby, classify(20, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(viewer.recv().await.unwrap().event, "game_started");
        assert_eq!(viewer.recv().await.unwrap().event, "game_update");
        let update = viewer.recv().await.unwrap();
        assert_eq!(update.event, "game_update");
        assert!(update.frame.contains("\"score\":441"));
    }

    #[tokio::test]
    async fn watching_a_lobby_skips_earlier_events() {
        let rig = rig(EngineOptions::default());
        let (host, lobby) = two_player_lobby(&rig.engine).await;
        let mut early = rig.hub.subscribe_lobby(lobby);
        rig.engine.set_mode(host, lobby, GameMode::X301).await.unwrap();

        let (state, mut viewer) = rig.engine.watch_lobby(lobby).await.unwrap();
        assert_eq!(state.mode, GameMode::X301);
        assert_eq!(early.recv().await.unwrap().event, "lobby_update");
        assert!(viewer.try_recv().is_err());

        rig.engine.start_match(host, lobby).await.unwrap();
        assert_eq!(viewer.recv().await.unwrap().event, "game_started");

        assert!(matches!(
            rig.engine.watch_lobby(Uuid::new_v4()).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn board_hits_reach_the_holder() {
        let rig = rig(EngineOptions::default());
        let (host, lobby) = two_player_lobby(&rig.engine).await;

        // No holder yet: dropped.
        rig.engine.board_hit(classify(20, 1).unwrap()).await.unwrap();
        rig.engine.start_match(host, lobby).await.unwrap();
        rig.engine.board_hit(classify(20, 1).unwrap()).await.unwrap();

        let game = rig.engine.lobby(lobby).await.unwrap().game_state.unwrap();
        assert_eq!(game.players[0].score, 481);
        assert_eq!(game.throw_history.len(), 1);
    }

    #[tokio::test]
    async fn mutations_publish_snapshots() {
        let mut rig = rig(EngineOptions::default());
        rig.engine.register_player("alice".into()).await.unwrap();

        assert!(rig.snapshots.has_changed().unwrap());
        assert_eq!(rig.snapshots.borrow_and_update().users.len(), 1);

        // A failed command does not write.
        assert!(rig.engine.register_player("ALICE".into()).await.is_err());
        assert!(!rig.snapshots.has_changed().unwrap());
    }

    #[tokio::test]
    async fn simulated_throws_score_the_current_player() {
        let rig = rig(EngineOptions::default());
        let (host, lobby) = two_player_lobby(&rig.engine).await;
        rig.engine.start_match(host, lobby).await.unwrap();

        let game = rig.engine.simulate_throw(lobby).await.unwrap();
        let entry = game.throw_history.back().unwrap();
        assert_eq!(entry.player_id, host);
        assert!(game.players[0].score <= 501);
    }
}
