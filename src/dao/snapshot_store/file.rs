use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use futures::{FutureExt, future::BoxFuture};
use tracing::debug;

use crate::dao::{
    snapshot::Snapshot,
    snapshot_store::SnapshotStore,
    storage::{StorageError, StorageResult},
};

/// Stores the snapshot as pretty-printed JSON, replacing the file atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let path = self.path.clone();
        async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    return Err(StorageError::unavailable(
                        format!("failed to read {}", path.display()),
                        err,
                    ));
                }
            };

            let snapshot = serde_json::from_slice(&bytes).map_err(|err| {
                StorageError::corrupt(format!("failed to parse {}", path.display()), err)
            })?;
            Ok(Some(snapshot))
        }
        .boxed()
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        async move {
            let body = serde_json::to_vec_pretty(&snapshot)
                .map_err(|err| StorageError::corrupt("failed to encode snapshot".into(), err))?;

            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, body).await.map_err(|err| {
                StorageError::unavailable(format!("failed to write {}", tmp.display()), err)
            })?;
            tokio::fs::rename(&tmp, &path).await.map_err(|err| {
                StorageError::unavailable(format!("failed to replace {}", path.display()), err)
            })?;

            debug!(path = %path.display(), users = snapshot.users.len(), "snapshot saved");
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("dartboard-back-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let store = JsonFileStore::new(scratch_path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_snapshot_is_loaded_back() {
        let path = scratch_path();
        let store = JsonFileStore::new(&path);
        let snapshot = Snapshot {
            active_game: Some(Uuid::new_v4()),
            ..Snapshot::default()
        };

        store.save(snapshot.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!path.with_extension("json.tmp").exists());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let path = scratch_path();
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
