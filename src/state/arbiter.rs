//! Ownership of the single physical dartboard.

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Raised when another lobby is playing on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dartboard is busy with lobby `{holder}`")]
pub struct BoardBusy {
    /// Lobby currently holding the board.
    pub holder: Uuid,
}

/// Token naming the lobby allowed to receive hardware throws.
///
/// `try_acquire` and `release` are the only mutators. A holder whose match is no
/// longer playing is treated as orphaned and cleared on the next acquisition.
#[derive(Debug, Default)]
pub struct BoardArbiter {
    holder: Option<Uuid>,
}

impl BoardArbiter {
    /// Create an arbiter with an optional pre-existing holder.
    pub fn new(holder: Option<Uuid>) -> Self {
        Self { holder }
    }

    /// Lobby currently holding the board.
    pub fn holder(&self) -> Option<Uuid> {
        self.holder
    }

    /// Whether `try_acquire` would currently succeed.
    pub fn can_acquire(&self, is_playing: impl Fn(Uuid) -> bool) -> bool {
        self.holder.is_none_or(|holder| !is_playing(holder))
    }

    /// Claim the board for `lobby_id`.
    pub fn try_acquire(
        &mut self,
        lobby_id: Uuid,
        is_playing: impl Fn(Uuid) -> bool,
    ) -> Result<(), BoardBusy> {
        if let Some(holder) = self.holder {
            if is_playing(holder) {
                return Err(BoardBusy { holder });
            }
            warn!(%holder, "clearing orphaned dartboard holder");
        }
        self.holder = Some(lobby_id);
        Ok(())
    }

    /// Give the board back. Returns whether `lobby_id` was the holder.
    pub fn release(&mut self, lobby_id: Uuid) -> bool {
        if self.holder == Some(lobby_id) {
            self.holder = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_while_holder_is_playing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut arbiter = BoardArbiter::default();

        arbiter.try_acquire(a, |_| false).unwrap();
        assert_eq!(arbiter.holder(), Some(a));
        assert_eq!(arbiter.try_acquire(b, |_| true), Err(BoardBusy { holder: a }));
        assert!(!arbiter.can_acquire(|_| true));
        assert_eq!(arbiter.holder(), Some(a));
    }

    #[test]
    fn orphaned_holder_is_cleared() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut arbiter = BoardArbiter::new(Some(a));

        assert!(arbiter.can_acquire(|_| false));
        arbiter.try_acquire(b, |_| false).unwrap();
        assert_eq!(arbiter.holder(), Some(b));
    }

    #[test]
    fn release_only_clears_own_token() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut arbiter = BoardArbiter::new(Some(a));

        assert!(!arbiter.release(b));
        assert_eq!(arbiter.holder(), Some(a));
        assert!(arbiter.release(a));
        assert_eq!(arbiter.holder(), None);
        assert!(!arbiter.release(a));
    }
}
