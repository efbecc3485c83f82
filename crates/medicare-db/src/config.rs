//! # Store Configuration
//!
//! Where the database lives and how the inventory dashboard is tuned.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MEDICARE_DB_PATH=/srv/pharmacy/medicare.db                         │
//! │     MEDICARE_LOW_STOCK_THRESHOLD=5                                     │
//! │     MEDICARE_EXPIRY_WINDOW_MONTHS=6                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/config.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.medicare.pos/config.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     medicare.db in the platform data dir, threshold 10, window 3       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/pharmacy/medicare.db"
//! max_connections = 5
//!
//! [inventory]
//! low_stock_threshold = 10
//! expiry_window_months = 3
//! ```

use medicare_core::InventoryThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const ENV_DB_PATH: &str = "MEDICARE_DB_PATH";
const ENV_LOW_STOCK_THRESHOLD: &str = "MEDICARE_LOW_STOCK_THRESHOLD";
const ENV_EXPIRY_WINDOW_MONTHS: &str = "MEDICARE_EXPIRY_WINDOW_MONTHS";

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "medicare", "pos")
        .map(|dirs| dirs.data_dir().join("medicare.db"))
        .unwrap_or_else(|| PathBuf::from("medicare.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub inventory: InventoryThresholds,
}

impl StoreConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config.toml`), if it exists
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Reads and parses a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading store config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup(ENV_LOW_STOCK_THRESHOLD) {
            self.inventory.low_stock_threshold =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_LOW_STOCK_THRESHOLD,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup(ENV_EXPIRY_WINDOW_MONTHS) {
            self.inventory.expiry_window_months =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_EXPIRY_WINDOW_MONTHS,
                    value: value.clone(),
                })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// `config.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "medicare", "pos")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
