//! Configuration for Kinship.
//!
//! Maps directly to `kinship.toml`. Every key is optional; a missing file
//! section falls back to the defaults below.
//!
//! ```toml
//! [general]
//! log_level = "info"
//! language = "es"
//!
//! [storage]
//! backend = "durable"
//!
//! [storage.sqlite]
//! path = "kinship.db"
//! max_connections = 10
//! connection_timeout_ms = 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KinshipError, Result};

/// Top-level Kinship configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinshipConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Storage backend selection and its connection parameters.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl KinshipConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `KinshipError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| KinshipError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values no backend can work with.
    ///
    /// # Errors
    /// Returns `KinshipError::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let sqlite = &self.storage.sqlite;
        if sqlite.max_connections == 0 {
            return Err(KinshipError::Config(
                "storage.sqlite.max_connections must be at least 1".to_string(),
            ));
        }
        if sqlite.path.as_os_str().is_empty() {
            return Err(KinshipError::Config("storage.sqlite.path must not be empty".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Default (and fallback) locale for player-facing text.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            language: default_language(),
        }
    }
}

/// Which persistence backend the service runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-process map, lost on restart.
    #[default]
    #[serde(alias = "in-memory", alias = "memory")]
    Volatile,
    /// SQLite database on disk.
    #[serde(alias = "sqlite", alias = "sql")]
    Durable,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Volatile => f.write_str("volatile"),
            Self::Durable => f.write_str("durable"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection, decided once at startup.
    #[serde(default)]
    pub backend: StorageKind,
    /// Durable backend parameters (ignored by the volatile backend).
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// Durable (SQLite) backend parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Upper bound on simultaneously open connections.
    #[serde(default = "default_10")]
    pub max_connections: u32,
    /// How long a caller may wait for a free connection.
    #[serde(default = "default_5000")]
    pub connection_timeout_ms: u64,
    /// SQLite busy timeout applied to every connection.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl SqliteConfig {
    /// Pool acquisition timeout as a [`Duration`].
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: 10,
            connection_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            wal_mode: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_language() -> String { "es".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("kinship.db") }
fn default_10() -> u32 { 10 }
fn default_5000() -> u64 { 5000 }
