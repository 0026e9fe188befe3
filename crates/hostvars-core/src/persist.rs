//! Persistence engine
//!
//! Serializes the inventory to JSON and replaces the datastore file with it.
//! Writes go to a sibling temporary file which is fsynced and then renamed
//! over the datastore, so an interrupted write never leaves a torn file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::inventory::{Inventory, InventoryState};

/// Backing store for inventory snapshots
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Location of the datastore
    fn path(&self) -> &Path;

    /// Create the datastore, empty, if it does not exist yet
    async fn ensure(&self) -> Result<(), CoreError>;

    /// Read the stored bytes, `None` if the datastore is empty
    async fn load(&self) -> Result<Option<Vec<u8>>, CoreError>;

    /// Replace the stored bytes
    async fn write(&self, data: &[u8]) -> Result<(), CoreError>;
}

/// Datastore kept in a single file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileDatastore {
    path: PathBuf,
}

impl FileDatastore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("inventory");
        self.path.with_file_name(format!("{file_name}.tmp"))
    }
}

#[async_trait]
impl Datastore for FileDatastore {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::datastore(parent, e))?;
        }

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CoreError::datastore(&self.path, e))?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, CoreError> {
        let data = fs::read(&self.path)
            .await
            .map_err(|e| CoreError::datastore(&self.path, e))?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(data))
    }

    async fn write(&self, data: &[u8]) -> Result<(), CoreError> {
        let temp_path = self.temp_path();

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| CoreError::datastore(&temp_path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| CoreError::datastore(&temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| CoreError::datastore(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| CoreError::datastore(&self.path, e))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    inventory: &'a InventoryState,
}

/// Decoded content of a datastore file
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was written
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    /// Persisted inventory state
    #[serde(flatten)]
    pub inventory: InventoryState,
}

/// Encode an inventory state as the datastore's JSON document
///
/// # Errors
/// Returns `CoreError::Encoding` if serialization fails
pub fn serialize(state: &InventoryState) -> Result<Vec<u8>, CoreError> {
    let snapshot = SnapshotRef {
        saved_at: Utc::now(),
        inventory: state,
    };
    let mut bytes = serde_json::to_vec_pretty(&snapshot)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a datastore JSON document
///
/// # Errors
/// Returns `CoreError::Encoding` if the bytes are not a valid snapshot
pub fn deserialize(data: &[u8]) -> Result<Snapshot, CoreError> {
    Ok(serde_json::from_slice(data)?)
}

impl Inventory {
    /// Persist a snapshot of the current state to the datastore
    ///
    /// Concurrent calls are serialized, so the datastore always ends up with
    /// the snapshot taken last.
    ///
    /// # Errors
    /// Returns the datastore or encoding error of this cycle. The in-memory
    /// state is untouched and the next cycle retries.
    #[instrument(skip(self), fields(path = %self.datastore.path().display()))]
    pub async fn save(&self) -> Result<(), CoreError> {
        let _saving = self.save_lock.lock().await;
        self.datastore.ensure().await?;

        let (data, flushed) = {
            let state = self.state.read().await;
            (serialize(&state)?, state.pending_ops)
        };

        self.write_data(&data).await?;

        let mut state = self.state.write().await;
        state.pending_ops = state.pending_ops.saturating_sub(flushed);
        debug!(bytes = data.len(), flushed, "inventory saved");
        Ok(())
    }

    /// Write raw bytes to the datastore while holding the exclusive lock
    ///
    /// # Errors
    /// Returns `CoreError::Datastore` if the write fails
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn write_data(&self, data: &[u8]) -> Result<(), CoreError> {
        let _state = self.state.write().await;
        self.datastore.write(data).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::model::{Host, HostGroup};

    fn sample_state(path: &Path) -> InventoryState {
        let mut web = HostGroup::new("web");
        let mut w1 = Host::new("w1");
        w1.set_fact("env", "prod");
        w1.set_fact("dc", "fra1");
        web.add_host(w1);
        web.add_host(Host::new("w2"));

        let mut hostgroups = BTreeMap::new();
        hostgroups.insert("web".to_string(), web);
        hostgroups.insert("db".to_string(), HostGroup::new("db"));

        InventoryState {
            hostgroups,
            data_store_path: path.to_path_buf(),
            flush_interval: Duration::from_millis(5000),
            pending_ops: 4,
        }
    }

    #[test]
    fn test_serialize_then_deserialize_preserves_structure() {
        let state = sample_state(Path::new("/var/lib/hostvars/inventory.json"));

        let bytes = serialize(&state).unwrap();
        let snapshot = deserialize(&bytes).unwrap();

        assert!(snapshot.saved_at.is_some());
        assert_eq!(snapshot.inventory, state);
    }

    #[test]
    fn test_serialized_document_layout() {
        let state = sample_state(Path::new("data.json"));
        let value: serde_json::Value =
            serde_json::from_slice(&serialize(&state).unwrap()).unwrap();

        assert_eq!(value["flush_interval_ms"], 5000);
        assert_eq!(value["pending_ops"], 4);
        assert_eq!(value["data_store_path"], "data.json");
        assert_eq!(value["hostgroups"]["web"]["hosts"]["w1"]["facts"]["env"], "prod");
        assert!(value["saved_at"].is_string());
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let err = deserialize(b"{ not json").unwrap_err();
        assert!(matches!(err, CoreError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_ensure_creates_parent_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/inventory.json");
        let store = FileDatastore::new(&path);

        store.ensure().await.unwrap();

        assert!(path.exists());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, b"{\"hostgroups\":{}}").unwrap();

        let store = FileDatastore::new(&path);
        store.ensure().await.unwrap();

        assert_eq!(
            store.load().await.unwrap().as_deref(),
            Some(&b"{\"hostgroups\":{}}"[..])
        );
    }

    #[tokio::test]
    async fn test_write_replaces_content_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let store = FileDatastore::new(&path);
        store.ensure().await.unwrap();

        store.write(b"first").await.unwrap();
        store.write(b"second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("inventory.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDatastore::new(dir.path().join("missing/inventory.json"));

        let err = store.write(b"data").await.unwrap_err();
        assert!(matches!(err, CoreError::Datastore { .. }));
    }
}
