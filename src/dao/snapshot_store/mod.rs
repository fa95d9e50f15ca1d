/// JSON document on the local filesystem.
pub mod file;
/// Process-local store, used by tests and simulation rigs.
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use futures::future::BoxFuture;

use crate::dao::{snapshot::Snapshot, storage::StorageResult};

/// Abstraction over the persistence layer for registry snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot, `None` when nothing was saved yet.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>>;
    /// Replace the saved snapshot.
    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>>;
}
