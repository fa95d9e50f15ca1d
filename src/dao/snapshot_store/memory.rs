use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::Mutex;

use crate::dao::{snapshot::Snapshot, snapshot_store::SnapshotStore, storage::StorageResult};

/// Keeps the snapshot in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    /// Store pre-filled with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(snapshot))),
            saves: Arc::default(),
        }
    }

    /// Last saved snapshot.
    pub async fn current(&self) -> Option<Snapshot> {
        self.slot.lock().await.clone()
    }

    /// Number of completed saves.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let slot = self.slot.clone();
        async move { Ok(slot.lock().await.clone()) }.boxed()
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let slot = self.slot.clone();
        let saves = self.saves.clone();
        async move {
            *slot.lock().await = Some(snapshot);
            *saves.lock().await += 1;
            Ok(())
        }
        .boxed()
    }
}
