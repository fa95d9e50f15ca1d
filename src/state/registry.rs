//! In-memory lobby, player and board bookkeeping owned by the match engine.
//!
//! Every mutating method validates its preconditions before touching state, so
//! an `Err` leaves the registry unchanged. Successful mutations queue
//! [`ServerMessage`]s that the engine drains and publishes after each command.

use indexmap::IndexMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::snapshot::Snapshot,
    dto::{
        events::{GameAbortedEvent, HostChangedEvent, ServerMessage},
        now_rfc3339,
        validation::{USERNAME_MAX_CHARS, USERNAME_MIN_CHARS},
    },
    error::EngineError,
    state::{
        arbiter::BoardArbiter,
        lobby::{Lobby, LobbyPlayer, LobbyStatus, LobbySummary, MIN_PLAYERS, clamp_max_players},
        match_state::{GameMode, MatchState, ThrowOutcome},
        player::{DEFAULT_AVATAR, MatchResult, PlayerStats, User},
        throw::Throw,
    },
};

/// What happened to the lobby after a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The lobby still exists.
    Left,
    /// The last player left and the lobby was removed.
    Deleted,
}

/// Players, lobbies and the board token.
#[derive(Debug, Default)]
pub struct Registry {
    users: IndexMap<Uuid, User>,
    lobbies: IndexMap<Uuid, Lobby>,
    arbiter: BoardArbiter,
    events: Vec<(Uuid, ServerMessage)>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from a persisted snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            users: snapshot
                .users
                .into_iter()
                .map(|user| (user.id, user))
                .collect(),
            lobbies: snapshot
                .lobbies
                .into_iter()
                .map(|lobby| (lobby.id, lobby))
                .collect(),
            arbiter: BoardArbiter::new(snapshot.active_game),
            events: Vec::new(),
        }
    }

    /// Serialisable copy of the whole registry.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users.values().cloned().collect(),
            lobbies: self.lobbies.values().cloned().collect(),
            active_game: self.arbiter.holder(),
        }
    }

    /// Take the notifications queued by the last mutations.
    pub fn drain_events(&mut self) -> Vec<(Uuid, ServerMessage)> {
        std::mem::take(&mut self.events)
    }

    /// Lobby currently holding the board.
    pub fn board_holder(&self) -> Option<Uuid> {
        self.arbiter.holder()
    }

    /// Whether a new match could claim the board right now.
    pub fn can_acquire_board(&self) -> bool {
        let lobbies = &self.lobbies;
        self.arbiter
            .can_acquire(|holder| lobbies.get(&holder).is_some_and(Lobby::is_playing))
    }

    /// Register a player under a unique, case-insensitive username.
    pub fn register_player(&mut self, username: &str) -> Result<User, EngineError> {
        let username = username.trim();
        let length = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
            return Err(EngineError::Validation(format!(
                "username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters"
            )));
        }
        if self
            .users
            .values()
            .any(|user| user.username.eq_ignore_ascii_case(username))
        {
            return Err(EngineError::Validation(format!(
                "username `{username}` is already taken"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
            created_at: now_rfc3339(),
            stats: PlayerStats::default(),
        };
        self.users.insert(user.id, user.clone());
        info!(player_id = %user.id, username = %user.username, "player registered");
        Ok(user)
    }

    /// Look up a registered player.
    pub fn player(&self, player_id: Uuid) -> Result<User, EngineError> {
        self.users
            .get(&player_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("player `{player_id}`")))
    }

    /// Look up a lobby.
    pub fn lobby(&self, lobby_id: Uuid) -> Result<Lobby, EngineError> {
        self.lobbies
            .get(&lobby_id)
            .cloned()
            .ok_or_else(|| lobby_not_found(lobby_id))
    }

    /// Lobbies that have not finished, in creation order.
    pub fn list_lobbies(&self) -> Vec<LobbySummary> {
        self.lobbies
            .values()
            .filter(|lobby| lobby.is_active())
            .map(LobbySummary::from)
            .collect()
    }

    /// Open a lobby hosted by `player_id`.
    pub fn create_lobby(
        &mut self,
        player_id: Uuid,
        name: Option<String>,
        max_players: Option<u32>,
    ) -> Result<Lobby, EngineError> {
        let user = self.player(player_id)?;
        self.ensure_not_seated(player_id)?;

        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Game {}", user.username));

        let lobby = Lobby {
            id: Uuid::new_v4(),
            name,
            host_id: user.id,
            host_name: user.username.clone(),
            players: vec![LobbyPlayer {
                id: user.id,
                username: user.username.clone(),
                avatar: user.avatar.clone(),
                is_ready: true,
                is_host: true,
            }],
            max_players: clamp_max_players(max_players),
            mode: GameMode::X501,
            status: LobbyStatus::Waiting,
            created_at: now_rfc3339(),
            game_state: None,
        };

        self.lobbies.insert(lobby.id, lobby.clone());
        info!(lobby_id = %lobby.id, name = %lobby.name, host = %user.username, "lobby created");
        Ok(lobby)
    }

    /// Seat `player_id` in a waiting lobby. Joining a lobby twice is a no-op.
    pub fn join_lobby(&mut self, player_id: Uuid, lobby_id: Uuid) -> Result<Lobby, EngineError> {
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))?;

        if lobby.has_player(player_id) {
            return Ok(lobby.clone());
        }
        if lobby.status != LobbyStatus::Waiting {
            return Err(EngineError::InvalidState("match already in progress".into()));
        }
        if lobby.is_full() {
            return Err(EngineError::InvalidState("lobby is full".into()));
        }
        let user = self.player(player_id)?;
        self.ensure_not_seated(player_id)?;

        let lobby = self.lobby_mut(lobby_id)?;
        lobby.players.push(LobbyPlayer {
            id: user.id,
            username: user.username.clone(),
            avatar: user.avatar,
            is_ready: false,
            is_host: false,
        });
        let lobby = lobby.clone();

        info!(%lobby_id, player = %user.username, "player joined lobby");
        self.events
            .push((lobby_id, ServerMessage::LobbyUpdate(lobby.clone())));
        Ok(lobby)
    }

    /// Remove `player_id` from the lobby, handing hosting over or deleting the
    /// lobby when it becomes empty.
    pub fn leave_lobby(
        &mut self,
        player_id: Uuid,
        lobby_id: Uuid,
    ) -> Result<LeaveOutcome, EngineError> {
        let lobby = self.lobby_mut(lobby_id)?;
        let position = lobby
            .players
            .iter()
            .position(|player| player.id == player_id)
            .ok_or_else(|| EngineError::InvalidState("player is not in this lobby".into()))?;

        let leaving = lobby.players.remove(position);
        info!(%lobby_id, player = %leaving.username, "player left lobby");

        if !leaving.is_host {
            let lobby = lobby.clone();
            self.events.push((lobby_id, ServerMessage::LobbyUpdate(lobby)));
            return Ok(LeaveOutcome::Left);
        }

        if lobby.players.is_empty() {
            self.lobbies.shift_remove(&lobby_id);
            self.arbiter.release(lobby_id);
            info!(%lobby_id, "empty lobby removed");
            self.events.push((lobby_id, ServerMessage::LobbyDeleted));
            return Ok(LeaveOutcome::Deleted);
        }

        let next = &mut lobby.players[0];
        next.is_host = true;
        lobby.host_id = next.id;
        lobby.host_name = next.username.clone();
        info!(%lobby_id, host = %lobby.host_name, "lobby host changed");

        let changed = HostChangedEvent {
            new_host_id: lobby.host_id,
            new_host_name: lobby.host_name.clone(),
        };
        let lobby = lobby.clone();
        self.events
            .push((lobby_id, ServerMessage::HostChanged(changed)));
        self.events.push((lobby_id, ServerMessage::LobbyUpdate(lobby)));
        Ok(LeaveOutcome::Left)
    }

    /// Change the lobby mode. Host only, not during a match.
    pub fn set_mode(
        &mut self,
        player_id: Uuid,
        lobby_id: Uuid,
        mode: GameMode,
    ) -> Result<Lobby, EngineError> {
        let lobby = self.lobby_mut(lobby_id)?;
        if !lobby.is_host(player_id) {
            return Err(EngineError::Forbidden("only the host can change the mode".into()));
        }
        if lobby.status == LobbyStatus::Playing {
            return Err(EngineError::InvalidState(
                "mode cannot change during a match".into(),
            ));
        }

        lobby.mode = mode;
        let lobby = lobby.clone();
        debug!(%lobby_id, ?mode, "lobby mode changed");
        self.events
            .push((lobby_id, ServerMessage::LobbyUpdate(lobby.clone())));
        Ok(lobby)
    }

    /// Start a match, claiming the board for the lobby.
    pub fn start_match(
        &mut self,
        player_id: Uuid,
        lobby_id: Uuid,
        board_connected: bool,
    ) -> Result<MatchState, EngineError> {
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))?;

        if !lobby.is_host(player_id) {
            return Err(EngineError::Forbidden("only the host can start the match".into()));
        }
        if lobby.status != LobbyStatus::Waiting {
            return Err(EngineError::InvalidState(
                "lobby is not waiting for a match".into(),
            ));
        }
        if lobby.players.len() < usize::from(MIN_PLAYERS) {
            return Err(EngineError::Validation(format!(
                "at least {MIN_PLAYERS} players are required"
            )));
        }
        let starting_score = lobby.mode.starting_score().ok_or_else(|| {
            EngineError::Validation(format!("mode {:?} has no rule set", lobby.mode))
        })?;
        if !board_connected {
            return Err(EngineError::BoardDisconnected);
        }

        let lobbies = &self.lobbies;
        self.arbiter.try_acquire(lobby_id, |holder| {
            lobbies.get(&holder).is_some_and(Lobby::is_playing)
        })?;

        let lobby = self.lobby_mut(lobby_id)?;
        let game = MatchState::new(
            lobby.mode,
            starting_score,
            lobby
                .players
                .iter()
                .map(|player| (player.id, player.username.clone())),
            true,
        );
        lobby.status = LobbyStatus::Playing;
        lobby.game_state = Some(game.clone());
        info!(%lobby_id, name = %lobby.name, mode = ?lobby.mode, "match started");

        self.events
            .push((lobby_id, ServerMessage::GameStarted(game.clone())));
        self.events
            .push((lobby_id, ServerMessage::GameUpdate(game.clone())));
        Ok(game)
    }

    /// End the match and return the lobby to waiting. Host only.
    ///
    /// A finished lobby is only reopened when none of its players has taken a
    /// seat in another active lobby since the win.
    pub fn end_match(&mut self, player_id: Uuid, lobby_id: Uuid) -> Result<(), EngineError> {
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))?;
        if !lobby.is_host(player_id) {
            return Err(EngineError::Forbidden("only the host can end the match".into()));
        }
        if lobby.game_state.is_none() {
            return Err(EngineError::NotInProgress);
        }
        if lobby.status == LobbyStatus::Finished {
            if let Some(player) = lobby
                .players
                .iter()
                .find(|player| self.seated_elsewhere(player.id, lobby_id))
            {
                return Err(EngineError::InvalidState(format!(
                    "{} is already in another lobby",
                    player.username
                )));
            }
        }

        let lobby = self.lobby_mut(lobby_id)?;
        lobby.status = LobbyStatus::Waiting;
        lobby.game_state = None;
        info!(%lobby_id, name = %lobby.name, "match ended");
        self.arbiter.release(lobby_id);

        self.events.push((lobby_id, ServerMessage::GameEnded));
        Ok(())
    }

    /// Abort a running match and delete the lobby. Any member may abort.
    ///
    /// Returns the name of the player who aborted.
    pub fn abort_match(&mut self, player_id: Uuid, lobby_id: Uuid) -> Result<String, EngineError> {
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))?;
        let Some(member) = lobby.players.iter().find(|player| player.id == player_id) else {
            return Err(EngineError::Forbidden("player is not in this lobby".into()));
        };
        if lobby.status != LobbyStatus::Playing {
            return Err(EngineError::NotInProgress);
        }

        let aborted_by = self
            .users
            .get(&player_id)
            .map(|user| user.username.clone())
            .unwrap_or_else(|| member.username.clone());

        self.arbiter.release(lobby_id);
        self.lobbies.shift_remove(&lobby_id);
        info!(%lobby_id, %aborted_by, "match aborted");

        self.events.push((
            lobby_id,
            ServerMessage::GameAborted(GameAbortedEvent {
                aborted_by: aborted_by.clone(),
            }),
        ));
        Ok(aborted_by)
    }

    /// Score a dart in the lobby's match.
    pub fn apply_throw(&mut self, lobby_id: Uuid, dart: Throw) -> Result<MatchState, EngineError> {
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))?;
        let game = lobby
            .game_state
            .as_mut()
            .ok_or(EngineError::NotInProgress)?;

        let thrower = game
            .current_player()
            .map(|player| player.name.clone())
            .unwrap_or_default();
        let outcome = game.apply_throw(dart)?;
        let game = game.clone();

        match outcome {
            ThrowOutcome::Scored { turn_passed } => {
                debug!(%lobby_id, player = %thrower, %dart, points = dart.total, turn_passed, "throw scored");
            }
            ThrowOutcome::Bust => {
                info!(%lobby_id, player = %thrower, %dart, "bust");
            }
            ThrowOutcome::Win { winner, checkout } => {
                lobby.status = LobbyStatus::Finished;
                self.arbiter.release(lobby_id);
                info!(%lobby_id, player = %thrower, %winner, checkout, "match won");
                record_statistics(&mut self.users, &game, winner, checkout);
            }
        }

        self.events
            .push((lobby_id, ServerMessage::GameUpdate(game.clone())));
        Ok(game)
    }

    /// Route a hardware hit to the board holder's match.
    ///
    /// Returns `None` when no match is playing on the board; the hit is dropped.
    pub fn board_hit(&mut self, dart: Throw) -> Option<(Uuid, MatchState)> {
        let Some(holder) = self.arbiter.holder() else {
            info!(%dart, "hit ignored: no active game");
            return None;
        };
        if !self.lobbies.get(&holder).is_some_and(Lobby::is_playing) {
            info!(%dart, lobby_id = %holder, "hit ignored: game not in progress");
            return None;
        }

        self.apply_throw(holder, dart)
            .map(|game| (holder, game))
            .inspect_err(|err| info!(%dart, error = %err, "hit ignored"))
            .ok()
    }

    /// Revert the last recorded dart. Host only.
    pub fn undo_last_throw(
        &mut self,
        player_id: Uuid,
        lobby_id: Uuid,
    ) -> Result<MatchState, EngineError> {
        let lobby = self.lobby_mut(lobby_id)?;
        if !lobby.is_host(player_id) {
            return Err(EngineError::Forbidden("only the host can undo throws".into()));
        }
        let game = lobby
            .game_state
            .as_mut()
            .ok_or(EngineError::NotInProgress)?;

        let entry = game.undo_last_throw()?;
        let game = game.clone();
        info!(%lobby_id, player = %entry.player_name, points = entry.dart.total, "throw undone");

        self.events
            .push((lobby_id, ServerMessage::GameUpdate(game.clone())));
        Ok(game)
    }

    fn lobby_mut(&mut self, lobby_id: Uuid) -> Result<&mut Lobby, EngineError> {
        self.lobbies
            .get_mut(&lobby_id)
            .ok_or_else(|| lobby_not_found(lobby_id))
    }

    fn seated_elsewhere(&self, player_id: Uuid, lobby_id: Uuid) -> bool {
        self.lobbies.values().any(|lobby| {
            lobby.id != lobby_id && lobby.is_active() && lobby.has_player(player_id)
        })
    }

    fn ensure_not_seated(&self, player_id: Uuid) -> Result<(), EngineError> {
        if self
            .lobbies
            .values()
            .any(|lobby| lobby.is_active() && lobby.has_player(player_id))
        {
            return Err(EngineError::InvalidState(
                "player is already in another lobby".into(),
            ));
        }
        Ok(())
    }
}

fn lobby_not_found(lobby_id: Uuid) -> EngineError {
    EngineError::NotFound(format!("lobby `{lobby_id}`"))
}

/// Update lifetime statistics of every player of a finished match.
fn record_statistics(
    users: &mut IndexMap<Uuid, User>,
    game: &MatchState,
    winner: Uuid,
    checkout: u16,
) {
    let starting_score = game.mode.starting_score().unwrap_or_default();
    for player in &game.players {
        let Some(user) = users.get_mut(&player.id) else {
            continue;
        };
        user.stats.record(&MatchResult {
            mode: game.mode,
            starting_score,
            final_score: player.score,
            round: game.round,
            player_count: game.players.len(),
            checkout: (player.id == winner).then_some(checkout),
        });
        debug!(
            player = %user.username,
            games = user.stats.games_played,
            wins = user.stats.games_won,
            points = user.stats.total_points,
            "statistics updated"
        );
    }
}
