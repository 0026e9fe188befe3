//! Core error types for hostvars-core

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in inventory and persistence operations
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Configuration is missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Datastore file could not be created, opened, read or written
    #[error("datastore error at {}: {message}", path.display())]
    Datastore {
        /// Path of the datastore file involved
        path: PathBuf,
        /// Underlying I/O failure
        message: String,
    },

    /// Inventory snapshot could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Hostgroup not found in the inventory
    #[error("hostgroup not found: {0}")]
    HostgroupNotFound(String),

    /// Host not found in the hostgroup
    #[error("host {hostname} not found in hostgroup {hostgroup}")]
    HostNotFound {
        /// Hostgroup that was searched
        hostgroup: String,
        /// Missing hostname
        hostname: String,
    },

    /// Flush scheduler did not acknowledge shutdown in time
    #[error("flush scheduler did not acknowledge shutdown within {0:?}")]
    ShutdownTimeout(Duration),

    /// Flush scheduler is gone or dropped the acknowledgement
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),
}

impl CoreError {
    pub(crate) fn datastore(path: &Path, err: impl std::fmt::Display) -> Self {
        CoreError::Datastore {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Check if the error means a targeted hostgroup or host is absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::HostgroupNotFound(_) | CoreError::HostNotFound { .. }
        )
    }

    /// Check if the error is recovered by the next flush cycle
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Datastore { .. } | CoreError::Encoding(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Encoding(err.to_string())
    }
}
