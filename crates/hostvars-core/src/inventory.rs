//! Inventory aggregate
//!
//! Owns every hostgroup behind a single reader/writer lock. Request handlers
//! mutate it while the flush scheduler concurrently snapshots it; mutations
//! take the lock exclusively, reads and snapshots take it shared.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, mpsc, watch};
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::error::CoreError;
use crate::flush::{self, FlushState, ShutdownRequest};
use crate::model::{Host, HostGroup};
use crate::persist::{self, Datastore, FileDatastore};

/// Lock-protected inventory payload, persisted as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryState {
    /// Hostgroups by name
    #[serde(default)]
    pub hostgroups: BTreeMap<String, HostGroup>,
    /// Datastore file backing this inventory
    pub data_store_path: PathBuf,
    /// Interval between periodic flushes
    #[serde(rename = "flush_interval_ms", with = "duration_ms")]
    pub flush_interval: Duration,
    /// Mutations not yet known to be flushed (advisory)
    #[serde(default)]
    pub pending_ops: u64,
}

impl InventoryState {
    fn new(data_store_path: PathBuf, flush_interval: Duration) -> Self {
        Self {
            hostgroups: BTreeMap::new(),
            data_store_path,
            flush_interval,
            pending_ops: 0,
        }
    }

    fn record_mutation(&mut self) {
        self.pending_ops = self.pending_ops.saturating_add(1);
    }

    /// Total number of host entries across all groups
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hostgroups.values().map(HostGroup::len).sum()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Map keys must match the names embedded in the entries they hold
fn check_identities(hostgroups: &BTreeMap<String, HostGroup>) -> Result<(), String> {
    for (key, group) in hostgroups {
        if group.name() != key {
            return Err(format!("hostgroup {key} is named {}", group.name()));
        }
        for (hostname, host) in group.hosts() {
            if host.hostname() != hostname {
                return Err(format!(
                    "host {hostname} in hostgroup {key} is named {}",
                    host.hostname()
                ));
            }
        }
    }
    Ok(())
}

/// In-memory inventory bound to a datastore and its flush scheduler
pub struct Inventory {
    pub(crate) state: RwLock<InventoryState>,
    pub(crate) datastore: Arc<dyn Datastore>,
    /// Held across a whole save so snapshots reach the datastore in order
    pub(crate) save_lock: Mutex<()>,
    shutdown_tx: mpsc::Sender<ShutdownRequest>,
    flush_state: watch::Receiver<FlushState>,
    shutdown_timeout: Duration,
}

impl Inventory {
    /// Open the inventory backed by the configured datastore file
    ///
    /// Creates the datastore if it does not exist, reloads its content if it
    /// does, and starts the flush scheduler.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the datastore cannot
    /// be created or read, or it holds data that cannot be decoded.
    pub async fn open(config: &InventoryConfig) -> Result<Arc<Self>, CoreError> {
        let datastore = Arc::new(FileDatastore::new(&config.datastore_path));
        Self::open_with(config, datastore).await
    }

    /// Open the inventory on top of an arbitrary datastore
    ///
    /// # Errors
    /// See [`Inventory::open`].
    pub async fn open_with(
        config: &InventoryConfig,
        datastore: Arc<dyn Datastore>,
    ) -> Result<Arc<Self>, CoreError> {
        config.validate()?;
        datastore.ensure().await?;

        let mut state =
            InventoryState::new(datastore.path().to_path_buf(), config.flush_interval());

        if let Some(bytes) = datastore.load().await? {
            let snapshot = persist::deserialize(&bytes).map_err(|e| {
                CoreError::Encoding(format!(
                    "datastore {} holds unreadable data: {e}",
                    datastore.path().display()
                ))
            })?;
            check_identities(&snapshot.inventory.hostgroups).map_err(|e| {
                CoreError::Encoding(format!(
                    "datastore {} is inconsistent: {e}",
                    datastore.path().display()
                ))
            })?;
            state.hostgroups = snapshot.inventory.hostgroups;
            info!(
                path = %datastore.path().display(),
                hostgroups = state.hostgroups.len(),
                hosts = state.host_count(),
                saved_at = ?snapshot.saved_at,
                "reloaded inventory from datastore"
            );
        } else {
            info!(path = %datastore.path().display(), "starting with empty inventory");
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(FlushState::Running);

        let inventory = Arc::new(Self {
            state: RwLock::new(state),
            datastore,
            save_lock: Mutex::new(()),
            shutdown_tx,
            flush_state: state_rx,
            shutdown_timeout: config.shutdown_timeout(),
        });

        flush::spawn(
            Arc::downgrade(&inventory),
            config.flush_interval(),
            shutdown_rx,
            state_tx,
        );

        Ok(inventory)
    }

    /// Create a hostgroup unless it already exists
    ///
    /// Returns `true` if the hostgroup was created.
    pub async fn create_hostgroup(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        if state.hostgroups.contains_key(name) {
            return false;
        }
        state.hostgroups.insert(name.to_string(), HostGroup::new(name));
        state.record_mutation();
        debug!(hostgroup = %name, "created hostgroup");
        true
    }

    /// Borrow a hostgroup
    ///
    /// The shared lock is held for as long as the returned guard lives.
    pub async fn get_hostgroup(&self, name: &str) -> Option<RwLockReadGuard<'_, HostGroup>> {
        let state = self.state.read().await;
        RwLockReadGuard::try_map(state, |s| s.hostgroups.get(name)).ok()
    }

    /// Add a host to a hostgroup, creating the hostgroup if needed
    ///
    /// An existing host is left untouched. Returns `true` if the host was
    /// added.
    pub async fn create_host(&self, hostgroup: &str, hostname: &str) -> bool {
        let mut state = self.state.write().await;
        let mut group_created = false;
        let group = state
            .hostgroups
            .entry(hostgroup.to_string())
            .or_insert_with(|| {
                group_created = true;
                HostGroup::new(hostgroup)
            });
        let added = group.add_host(Host::new(hostname));
        if group_created || added {
            state.record_mutation();
        }
        if added {
            debug!(hostgroup = %hostgroup, hostname = %hostname, group_created, "created host");
        }
        added
    }

    /// Borrow the host mapping of a hostgroup
    ///
    /// The shared lock is held for as long as the returned guard lives.
    pub async fn list_hosts(
        &self,
        hostgroup: &str,
    ) -> Option<RwLockReadGuard<'_, BTreeMap<String, Host>>> {
        let state = self.state.read().await;
        RwLockReadGuard::try_map(state, |s| s.hostgroups.get(hostgroup).map(HostGroup::hosts))
            .ok()
    }

    /// Set a fact on a host, overwriting any previous value
    ///
    /// # Errors
    /// Returns a not-found error if the hostgroup or host does not exist.
    pub async fn set_host_fact(
        &self,
        hostgroup: &str,
        hostname: &str,
        fact: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        self.set_host_facts(hostgroup, hostname, [(fact, value)]).await
    }

    /// Set several facts on a host in one exclusive section
    ///
    /// Either every fact is applied or, if the target is missing, none is.
    ///
    /// # Errors
    /// Returns a not-found error if the hostgroup or host does not exist.
    pub async fn set_host_facts<I, K, V>(
        &self,
        hostgroup: &str,
        hostname: &str,
        facts: I,
    ) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state.write().await;
        let host = state
            .hostgroups
            .get_mut(hostgroup)
            .ok_or_else(|| CoreError::HostgroupNotFound(hostgroup.to_string()))?
            .host_mut(hostname)
            .ok_or_else(|| CoreError::HostNotFound {
                hostgroup: hostgroup.to_string(),
                hostname: hostname.to_string(),
            })?;

        let mut applied = 0usize;
        for (name, value) in facts {
            host.set_fact(name, value);
            applied += 1;
        }
        if applied > 0 {
            state.record_mutation();
        }
        debug!(hostgroup = %hostgroup, hostname = %hostname, facts = applied, "set host facts");
        Ok(())
    }

    /// Copy of the full current state
    pub async fn snapshot(&self) -> InventoryState {
        self.state.read().await.clone()
    }

    pub async fn pending_ops(&self) -> u64 {
        self.state.read().await.pending_ops
    }

    /// Current state of the flush scheduler
    #[must_use]
    pub fn flush_state(&self) -> FlushState {
        *self.flush_state.borrow()
    }

    /// Stop the flush scheduler after one final flush
    ///
    /// Waits at most the configured shutdown timeout for the scheduler to
    /// acknowledge. The acknowledgement carries the final flush result.
    ///
    /// # Errors
    /// Returns `CoreError::ShutdownTimeout` if no acknowledgement arrives in
    /// time, `CoreError::ShutdownFailed` if the scheduler is already gone, or
    /// the final flush error.
    pub async fn stop(&self) -> Result<(), CoreError> {
        info!("shutdown requested, signalling flush scheduler");
        flush::request_shutdown(&self.shutdown_tx, self.shutdown_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, Arc<Inventory>) {
        let dir = tempfile::tempdir().unwrap();
        let config = InventoryConfig::new(dir.path().join("data.json"));
        let inventory = Inventory::open(&config).await.unwrap();
        (dir, inventory)
    }

    #[tokio::test]
    async fn test_create_hostgroup_is_idempotent() {
        let (_dir, inventory) = open_temp().await;

        assert!(inventory.create_hostgroup("TestGroup").await);
        assert!(!inventory.create_hostgroup("TestGroup").await);

        let snapshot = inventory.snapshot().await;
        assert_eq!(snapshot.hostgroups.len(), 1);
        let group = inventory.get_hostgroup("TestGroup").await.unwrap();
        assert_eq!(group.name(), "TestGroup");
        drop(group);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_hostgroup() {
        let (_dir, inventory) = open_temp().await;
        assert!(inventory.get_hostgroup("absent").await.is_none());
        assert!(inventory.list_hosts("absent").await.is_none());
        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_host_creates_group_and_is_first_writer_wins() {
        let (_dir, inventory) = open_temp().await;

        assert!(inventory.create_host("TestGroup", "m1.example.com").await);
        inventory
            .set_host_fact("TestGroup", "m1.example.com", "role", "db")
            .await
            .unwrap();
        assert!(!inventory.create_host("TestGroup", "m1.example.com").await);

        let hosts = inventory.list_hosts("TestGroup").await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts["m1.example.com"].fact("role"), Some("db"));
        drop(hosts);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_hostname_in_multiple_groups() {
        let (_dir, inventory) = open_temp().await;

        inventory.create_host("web", "shared").await;
        inventory.create_host("db", "shared").await;
        inventory.set_host_fact("web", "shared", "port", "80").await.unwrap();

        let db_hosts = inventory.list_hosts("db").await.unwrap();
        assert!(db_hosts["shared"].facts().is_empty());
        drop(db_hosts);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_host_fact_overwrites() {
        let (_dir, inventory) = open_temp().await;
        inventory.create_host("web", "w1").await;

        inventory.set_host_fact("web", "w1", "env", "staging").await.unwrap();
        inventory.set_host_fact("web", "w1", "env", "prod").await.unwrap();

        let group = inventory.get_hostgroup("web").await.unwrap();
        assert_eq!(group.host("w1").unwrap().fact("env"), Some("prod"));
        drop(group);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_fact_on_missing_target_changes_nothing() {
        let (_dir, inventory) = open_temp().await;
        inventory.create_host("web", "w1").await;
        let before = inventory.snapshot().await;

        let err = inventory
            .set_host_fact("nope", "w1", "env", "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::HostgroupNotFound(ref g) if g == "nope"));

        let err = inventory
            .set_host_fact("web", "ghost", "env", "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::HostNotFound { .. }));

        assert_eq!(inventory.snapshot().await, before);
        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_host_facts_batch() {
        let (_dir, inventory) = open_temp().await;
        inventory.create_host("web", "w1").await;

        inventory
            .set_host_facts("web", "w1", [("env", "prod"), ("dc", "fra1")])
            .await
            .unwrap();

        let hosts = inventory.list_hosts("web").await.unwrap();
        assert_eq!(hosts["w1"].facts().len(), 2);
        assert_eq!(hosts["w1"].fact("dc"), Some("fra1"));
        drop(hosts);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_ops_counts_mutations() {
        let (_dir, inventory) = open_temp().await;

        inventory.create_hostgroup("web").await;
        inventory.create_hostgroup("web").await;
        inventory.create_host("web", "w1").await;
        inventory.create_host("web", "w1").await;
        inventory.set_host_fact("web", "w1", "env", "prod").await.unwrap();
        assert_eq!(inventory.pending_ops().await, 3);

        inventory.save().await.unwrap();
        assert_eq!(inventory.pending_ops().await, 0);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_fact_writes_are_not_lost() {
        let (_dir, inventory) = open_temp().await;
        inventory.create_host("web", "w1").await;

        let mut handles = Vec::new();
        for i in 0..64 {
            let inventory = Arc::clone(&inventory);
            handles.push(tokio::spawn(async move {
                inventory
                    .set_host_fact("web", "w1", &format!("fact{i}"), &i.to_string())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let hosts = inventory.list_hosts("web").await.unwrap();
        let facts = hosts["w1"].facts();
        assert_eq!(facts.len(), 64);
        for i in 0..64 {
            assert_eq!(facts.get(&format!("fact{i}")), Some(&i.to_string()));
        }
        drop(hosts);

        inventory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_carries_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let config = InventoryConfig::new(&path).with_flush_interval(Duration::from_millis(750));
        let inventory = Inventory::open(&config).await.unwrap();

        let snapshot = inventory.snapshot().await;
        assert_eq!(snapshot.data_store_path, path);
        assert_eq!(snapshot.flush_interval, Duration::from_millis(750));

        inventory.stop().await.unwrap();
    }
}
