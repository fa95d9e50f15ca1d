use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dao::{
    snapshot::Snapshot,
    snapshot_store::SnapshotStore,
    storage::StorageResult,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Load the stored snapshot, keep only players and write the result back.
pub async fn load_clean_slate(store: &dyn SnapshotStore) -> StorageResult<Snapshot> {
    let snapshot = match store.load().await? {
        Some(snapshot) => snapshot.into_clean_slate(),
        None => {
            info!("no stored snapshot; starting empty");
            Snapshot::default()
        }
    };
    store.save(snapshot.clone()).await?;
    info!(users = snapshot.users.len(), "snapshot loaded");
    Ok(snapshot)
}

/// Persist the latest snapshot whenever it changes until `cancel` fires.
///
/// Intermediate snapshots are skipped when saves fall behind. Failed saves are
/// retried with exponential backoff, and the latest snapshot is flushed once
/// more on shutdown.
pub async fn run(
    store: Arc<dyn SnapshotStore>,
    mut snapshots: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
) {
    let mut delay = INITIAL_DELAY;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let snapshot = snapshots.borrow_and_update().clone();
        match store.save(snapshot).await {
            Ok(()) => {
                if delay != INITIAL_DELAY {
                    info!("storage healthy again; snapshot saved");
                }
                delay = INITIAL_DELAY;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "failed to save snapshot; will retry"
                );
                snapshots.mark_changed();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    if snapshots.has_changed().unwrap_or(true) {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Err(err) = store.save(snapshot).await {
            warn!(error = %err, "final snapshot flush failed");
        }
    }
    info!("storage writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::snapshot_store::MemoryStore,
        state::{
            lobby::{Lobby, LobbyStatus},
            match_state::GameMode,
            player::{PlayerStats, User},
        },
    };
    use uuid::Uuid;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.into(),
            avatar: "default".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            stats: PlayerStats::default(),
        }
    }

    #[tokio::test]
    async fn startup_discards_lobbies_and_writes_back() {
        let alice = user("alice");
        let lobby = Lobby {
            id: Uuid::new_v4(),
            name: "Game alice".into(),
            host_id: alice.id,
            host_name: "alice".into(),
            players: Vec::new(),
            max_players: 4,
            mode: GameMode::X501,
            status: LobbyStatus::Playing,
            created_at: "2026-01-01T00:00:00Z".into(),
            game_state: None,
        };
        let store = MemoryStore::with_snapshot(Snapshot {
            users: vec![alice.clone()],
            lobbies: vec![lobby.clone()],
            active_game: Some(lobby.id),
        });

        let snapshot = load_clean_slate(&store).await.unwrap();
        assert_eq!(snapshot.users, vec![alice]);
        assert!(snapshot.lobbies.is_empty());
        assert_eq!(store.current().await, Some(snapshot));
    }

    #[tokio::test]
    async fn empty_store_starts_empty() {
        let store = MemoryStore::default();
        assert_eq!(load_clean_slate(&store).await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn writer_persists_latest_and_flushes_on_shutdown() {
        let store = MemoryStore::default();
        let (tx, rx) = watch::channel(Snapshot::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::new(store.clone()), rx, cancel.clone()));

        tx.send_replace(Snapshot {
            users: vec![user("alice")],
            ..Snapshot::default()
        });
        let latest = Snapshot {
            users: vec![user("alice"), user("bob")],
            ..Snapshot::default()
        };
        tx.send_replace(latest.clone());

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(store.current().await, Some(latest));
    }
}
