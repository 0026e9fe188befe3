//! Configuration loading and types

use std::path::{Path, PathBuf};

use hostvars_core::InventoryConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the hostvars daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Daemon server settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Datastore and flush settings
    #[serde(default = "default_inventory")]
    pub inventory: InventoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            inventory: default_inventory(),
        }
    }
}

fn default_inventory() -> InventoryConfig {
    let path = dirs::data_dir()
        .map(|p| p.join("hostvars/inventory.json"))
        .unwrap_or_else(|| PathBuf::from("inventory.json"));
    InventoryConfig::new(path)
}

/// Daemon server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address and port to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8250".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read config {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("failed to parse config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Find the config file to use
    ///
    /// An explicit path wins, then `HOSTVARS_CONFIG`, then the common
    /// locations. Returns `None` if no file exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("HOSTVARS_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let paths = [
            Some(PathBuf::from("hostvars.toml")),
            Some(PathBuf::from("/etc/hostvars/hostvars.toml")),
            dirs::config_dir().map(|p| p.join("hostvars/hostvars.toml")),
        ];

        paths.into_iter().flatten().find(|path| path.exists())
    }

    /// Load the located file, or defaults if there is none
    ///
    /// # Errors
    /// Returns error if a located file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> eyre::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }
}
