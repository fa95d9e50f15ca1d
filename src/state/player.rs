use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::match_state::GameMode;

/// Avatar assigned to newly registered players.
pub const DEFAULT_AVATAR: &str = "default";

/// Registered player as stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Stable identifier.
    pub id: Uuid,
    /// Unique display name.
    pub username: String,
    /// Avatar preset name.
    pub avatar: String,
    /// RFC 3339 registration time.
    pub created_at: String,
    /// Lifetime statistics.
    pub stats: PlayerStats,
}

/// Lifetime statistics, updated once per finished match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerStats {
    /// Matches that reached a winner with this player in them.
    pub games_played: u32,
    /// Matches won.
    pub games_won: u32,
    /// Points scored across all finished matches.
    pub total_points: u64,
    /// Best finishing dart.
    pub highest_checkout: u16,
    /// Running mean of points per round.
    pub average_per_round: f64,
    /// Mode of the last finished match.
    pub favorite_mode: Option<GameMode>,
}

/// Per-player figures of a finished match.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult {
    /// Mode of the match.
    pub mode: GameMode,
    /// Score every player started on.
    pub starting_score: u32,
    /// Score this player ended on.
    pub final_score: u32,
    /// Round counter when the match ended.
    pub round: u32,
    /// Number of players in the match.
    pub player_count: usize,
    /// Finishing dart value when this player won.
    pub checkout: Option<u16>,
}

impl PlayerStats {
    /// Fold a finished match into the statistics.
    ///
    /// The per-round average is a weighted running mean over games played; past
    /// per-game figures are not kept, so it is not recomputed from history.
    pub fn record(&mut self, result: &MatchResult) {
        self.games_played += 1;

        let points = result.starting_score.saturating_sub(result.final_score);
        self.total_points += u64::from(points);

        if let Some(checkout) = result.checkout {
            self.games_won += 1;
            self.highest_checkout = self.highest_checkout.max(checkout);
        }

        let player_count = u32::try_from(result.player_count).unwrap_or(u32::MAX).max(1);
        let rounds_played = result.round.div_ceil(player_count);
        if rounds_played > 0 {
            let this_game = f64::from(points) / f64::from(rounds_played);
            let previous_games = self.games_played - 1;
            self.average_per_round = if previous_games > 0 {
                (self.average_per_round * f64::from(previous_games) + this_game)
                    / f64::from(self.games_played)
            } else {
                this_game
            };
        }

        self.favorite_mode = Some(result.mode);
    }
}
