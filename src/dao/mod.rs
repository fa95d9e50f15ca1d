/// Persisted shape of the registry.
pub mod snapshot;
/// Snapshot persistence backends.
pub mod snapshot_store;
/// Storage abstraction layer for persistence operations.
pub mod storage;
