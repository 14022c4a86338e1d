//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deckcounts/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deckcounts/` (~/.config/deckcounts/)
//! - Data: `$XDG_DATA_HOME/deckcounts/` (~/.local/share/deckcounts/)
//! - State/Logs: `$XDG_STATE_HOME/deckcounts/` (~/.local/state/deckcounts/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Refresh and cutoff timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Collection database location
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timing configuration for builds and refreshes
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds ahead of now that learning cards still count as due now.
    ///
    /// Each build computes `cutoff = now + collapse_time_secs` exactly once.
    #[serde(default = "default_collapse_time")]
    pub collapse_time_secs: i64,

    /// Seconds between automatic refreshes of the deck view
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collapse_time_secs: default_collapse_time(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl SchedulerConfig {
    /// Refresh interval as a `Duration`
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config(
                "scheduler.refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.collapse_time_secs < 0 {
            return Err(Error::Config(
                "scheduler.collapse_time_secs must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_collapse_time() -> i64 {
    1200
}

fn default_refresh_interval() -> u64 {
    30
}

/// Collection database location override
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CollectionConfig {
    /// Path to the collection database (defaults to the XDG data directory)
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.scheduler.validate()?;

        Ok(config)
    }

    /// Returns the collection database path, honoring the `[collection]` override
    pub fn collection_path(&self) -> PathBuf {
        self.collection
            .path
            .clone()
            .unwrap_or_else(Self::default_collection_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deckcounts/config.toml` (~/.config/deckcounts/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deckcounts").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite collection)
    ///
    /// `$XDG_DATA_HOME/deckcounts/` (~/.local/share/deckcounts/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("deckcounts")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deckcounts/` (~/.local/state/deckcounts/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deckcounts")
    }

    /// Returns the default collection file path
    ///
    /// `$XDG_DATA_HOME/deckcounts/collection.db`
    pub fn default_collection_path() -> PathBuf {
        Self::data_dir().join("collection.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/deckcounts/deckcounts.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deckcounts.log")
    }
}
