//! Inventory configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Settings that bind an inventory to its datastore
///
/// Durations are expressed in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Path of the datastore file
    #[serde(default = "default_datastore_path")]
    pub datastore_path: PathBuf,
    /// Interval between periodic flushes
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Upper bound on waiting for the final flush at shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_datastore_path() -> PathBuf {
    PathBuf::from("inventory.json")
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            datastore_path: default_datastore_path(),
            flush_interval_ms: default_flush_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl InventoryConfig {
    /// Create a config for the given datastore with default timings
    pub fn new(datastore_path: impl Into<PathBuf>) -> Self {
        Self {
            datastore_path: datastore_path.into(),
            ..Self::default()
        }
    }

    /// Set the flush interval
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = duration_to_ms(interval);
        self
    }

    /// Set the shutdown timeout
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_to_ms(timeout);
        self
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate the settings
    ///
    /// # Errors
    /// Returns `CoreError::Configuration` for an empty path or a zero duration
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.datastore_path.as_os_str().is_empty() {
            return Err(CoreError::Configuration(
                "datastore_path must not be empty".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(CoreError::Configuration(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(CoreError::Configuration(
                "shutdown_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
