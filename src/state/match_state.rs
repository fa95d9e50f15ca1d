use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{checkout::checkout_hint, throw::Throw};

/// Number of throws kept for undo. Older entries are dropped.
pub const HISTORY_CAPACITY: usize = 10;

/// Darts a player throws per visit before the turn passes.
pub const DARTS_PER_TURN: usize = 3;

/// Game modes a lobby can be configured with.
///
/// Only the X01 modes have a rule set; the others are accepted as lobby settings
/// but cannot be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum GameMode {
    /// 301, double out.
    #[serde(rename = "301")]
    X301,
    /// 501, double out.
    #[serde(rename = "501")]
    X501,
    /// Cricket.
    #[serde(rename = "CRICKET")]
    Cricket,
    /// Killer.
    #[serde(rename = "KILLER")]
    Killer,
    /// Around the clock.
    #[serde(rename = "AROUND_THE_CLOCK")]
    AroundTheClock,
    /// Shanghai.
    #[serde(rename = "SHANGHAI")]
    Shanghai,
}

impl GameMode {
    /// Score every player starts from, for modes the engine can run.
    pub fn starting_score(self) -> Option<u32> {
        match self {
            GameMode::X301 => Some(301),
            GameMode::X501 => Some(501),
            _ => None,
        }
    }
}

/// Lifecycle of a match inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Throws are being accepted.
    Playing,
    /// A player checked out; terminal.
    Finished,
}

/// Per-player scoring state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerMatchState {
    /// Player identifier.
    pub id: Uuid,
    /// Display name at match start.
    pub name: String,
    /// Points left to check out.
    pub score: u32,
    /// True for the player whose turn it is.
    pub is_active: bool,
    /// Darts recorded in the current visit.
    pub throws_in_round: Vec<Throw>,
}

/// A recorded throw, retained for undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Player who threw.
    pub player_id: Uuid,
    /// Name of the player who threw.
    pub player_name: String,
    /// The dart itself.
    #[serde(rename = "throw")]
    pub dart: Throw,
    /// Whether the dart busted the visit.
    pub is_bust: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Result of applying a throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowOutcome {
    /// Points were deducted.
    Scored {
        /// Whether the visit ended and the next player is up.
        turn_passed: bool,
    },
    /// The visit was forfeited and the turn passed.
    Bust,
    /// The current player checked out.
    Win {
        /// Winning player.
        winner: Uuid,
        /// Value of the finishing dart.
        checkout: u16,
    },
}

/// Reasons a match operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The match is not accepting throws.
    #[error("match is not in progress")]
    NotInProgress,
    /// No throw is left in the retained history.
    #[error("no throw to undo")]
    NothingToUndo,
    /// History references a player missing from the match.
    #[error("player `{0}` is not part of this match")]
    UnknownPlayer(Uuid),
}

/// Scoring state of a single X01 match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchState {
    /// Mode the match was started in.
    pub mode: GameMode,
    /// Whether the match still accepts throws.
    pub status: MatchStatus,
    /// One-based round counter, bumped when the turn wraps to the first player.
    pub round: u32,
    /// Index into `players` of the player at the oche.
    pub current_player_index: usize,
    /// Players in throwing order.
    pub players: Vec<PlayerMatchState>,
    /// Most recent dart, bust or not.
    pub last_throw: Option<Throw>,
    /// Whether the most recent dart was a bust.
    pub is_bust: bool,
    /// Whether the finishing dart must be a double.
    pub is_double_out: bool,
    /// Winning player once finished.
    pub winner: Option<Uuid>,
    /// Suggested finish for the current player.
    pub checkout_hint: Option<Vec<String>>,
    /// Most recent throws, oldest first.
    #[schema(value_type = Vec<HistoryEntry>)]
    pub throw_history: VecDeque<HistoryEntry>,
}

impl MatchState {
    /// Start a match with every player on `starting_score` and the first one at the oche.
    pub fn new(
        mode: GameMode,
        starting_score: u32,
        players: impl IntoIterator<Item = (Uuid, String)>,
        is_double_out: bool,
    ) -> Self {
        let players: Vec<PlayerMatchState> = players
            .into_iter()
            .enumerate()
            .map(|(index, (id, name))| PlayerMatchState {
                id,
                name,
                score: starting_score,
                is_active: index == 0,
                throws_in_round: Vec::with_capacity(DARTS_PER_TURN),
            })
            .collect();

        Self {
            mode,
            status: MatchStatus::Playing,
            round: 1,
            current_player_index: 0,
            players,
            last_throw: None,
            is_bust: false,
            is_double_out,
            winner: None,
            checkout_hint: None,
            throw_history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Player whose turn it is.
    pub fn current_player(&self) -> Option<&PlayerMatchState> {
        self.players.get(self.current_player_index)
    }

    /// Whether the match still accepts throws.
    pub fn is_playing(&self) -> bool {
        self.status == MatchStatus::Playing
    }

    /// Score a dart for the current player.
    ///
    /// Nothing is modified when an error is returned.
    pub fn apply_throw(&mut self, dart: Throw) -> Result<ThrowOutcome, MatchError> {
        if !self.is_playing() {
            return Err(MatchError::NotInProgress);
        }
        let index = self.current_player_index;
        let Some(player) = self.players.get(index) else {
            return Err(MatchError::NotInProgress);
        };

        let remaining = i64::from(player.score) - i64::from(dart.total);
        let missed_double = remaining == 0 && self.is_double_out && !dart.is_double();

        self.last_throw = Some(dart);
        self.is_bust = false;

        if remaining < 0 || remaining == 1 || missed_double {
            self.is_bust = true;
            self.players[index].throws_in_round.clear();
            self.record(index, dart, true);
            self.advance_turn();
            return Ok(ThrowOutcome::Bust);
        }

        let player = &mut self.players[index];
        player.throws_in_round.push(dart);
        player.score = remaining as u32;

        if remaining == 0 {
            let winner = player.id;
            self.record(index, dart, false);
            self.winner = Some(winner);
            self.status = MatchStatus::Finished;
            return Ok(ThrowOutcome::Win {
                winner,
                checkout: dart.total,
            });
        }

        let visit_over = player.throws_in_round.len() >= DARTS_PER_TURN;
        self.checkout_hint = checkout_hint(player.score);
        self.record(index, dart, false);
        if visit_over {
            self.advance_turn();
        }

        Ok(ThrowOutcome::Scored {
            turn_passed: visit_over,
        })
    }

    /// Revert the most recent recorded dart.
    ///
    /// Only one step is reverted: the round counter is not rewound and darts
    /// evicted from the history window cannot be undone.
    pub fn undo_last_throw(&mut self) -> Result<HistoryEntry, MatchError> {
        if !self.is_playing() {
            return Err(MatchError::NotInProgress);
        }
        let latest = self.throw_history.back().ok_or(MatchError::NothingToUndo)?;
        let target = self
            .players
            .iter()
            .position(|player| player.id == latest.player_id)
            .ok_or(MatchError::UnknownPlayer(latest.player_id))?;

        let Some(entry) = self.throw_history.pop_back() else {
            return Err(MatchError::NothingToUndo);
        };

        if !entry.is_bust {
            self.players[target].score += u32::from(entry.dart.total);
        }

        if target != self.current_player_index {
            if let Some(current) = self.players.get_mut(self.current_player_index) {
                current.is_active = false;
            }
            self.current_player_index = target;
            self.players[target].is_active = true;
        }
        self.players[target].throws_in_round.pop();

        match self.throw_history.back() {
            Some(previous) => {
                self.last_throw = Some(previous.dart);
                self.is_bust = previous.is_bust;
            }
            None => {
                self.last_throw = None;
                self.is_bust = false;
            }
        }
        self.checkout_hint = checkout_hint(self.players[target].score);

        Ok(entry)
    }

    fn record(&mut self, index: usize, dart: Throw, is_bust: bool) {
        let player = &self.players[index];
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            player_id: player.id,
            player_name: player.name.clone(),
            dart,
            is_bust,
            timestamp: now_millis(),
        };

        self.throw_history.push_back(entry);
        while self.throw_history.len() > HISTORY_CAPACITY {
            self.throw_history.pop_front();
        }
    }

    fn advance_turn(&mut self) {
        let count = self.players.len();
        if count == 0 {
            return;
        }

        self.players[self.current_player_index].is_active = false;
        self.current_player_index = (self.current_player_index + 1) % count;

        let next = &mut self.players[self.current_player_index];
        next.is_active = true;
        next.throws_in_round.clear();
        self.checkout_hint = checkout_hint(next.score);

        if self.current_player_index == 0 {
            self.round += 1;
        }
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
