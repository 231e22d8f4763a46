//! Store configuration via `aspectdb.toml`
//!
//! A single flat file selects the backend, the retry budget, and whether the
//! store is a read-only snapshot. On first use a commented default file can
//! be written with [`StoreConfig::write_default_if_missing`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use aspectdb_core::{StoreError, StoreResult};
use aspectdb_storage::SchemaScript;

use crate::retry::{
    RetryConfig, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "aspectdb.toml";

/// Backend selected by `backend = "..."`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `MemoryBackend`
    Memory,
    /// `SqliteBackend`, on `sqlite_path` or in memory
    Sqlite,
}

/// Store configuration loaded from `aspectdb.toml`.
///
/// # Example
///
/// ```toml
/// backend = "sqlite"
/// sqlite_path = "/var/lib/aspectdb/aspects.db"
/// max_retry = 5
///
/// # read_only = true
/// # snapshot = "/etc/aspectdb/datasets.json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend: `"memory"` or `"sqlite"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite database file; in-memory when absent. Mutable stores only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
    /// Default retry budget for `add`.
    #[serde(default = "default_max_retry")]
    pub max_retry: usize,
    /// Base backoff between `add` retries, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Backoff cap, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Open an immutable store loaded from `snapshot`.
    #[serde(default)]
    pub read_only: bool,
    /// JSON snapshot for read-only stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    /// Schema script replacing the bundled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_script: Option<PathBuf>,
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_max_retry() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: None,
            max_retry: default_max_retry(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            read_only: false,
            snapshot: None,
            schema_script: None,
        }
    }
}

impl StoreConfig {
    /// Parse the backend string.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the string is not `"memory"` or `"sqlite"`.
    pub fn backend_kind(&self) -> StoreResult<BackendKind> {
        match self.backend.as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(StoreError::config(format!(
                "Invalid backend '{}' in {}. Expected \"memory\" or \"sqlite\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> StoreResult<()> {
        let kind = self.backend_kind()?;
        if self.read_only && self.snapshot.is_none() {
            return Err(StoreError::config(
                "read_only = true requires a snapshot path",
            ));
        }
        if !self.read_only && self.snapshot.is_some() {
            return Err(StoreError::config(
                "snapshot is only used with read_only = true",
            ));
        }
        if self.read_only && self.sqlite_path.is_some() {
            return Err(StoreError::config(
                "sqlite_path cannot be combined with read_only = true; \
                 read-only stores are loaded into a fresh in-memory database",
            ));
        }
        if kind == BackendKind::Memory && self.sqlite_path.is_some() {
            return Err(StoreError::config(
                "sqlite_path is only valid with backend = \"sqlite\"",
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(StoreError::config(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        Ok(())
    }

    /// Retry settings for `add`.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.max_retry)
            .with_backoff(
                Duration::from_millis(self.retry_base_delay_ms),
                Duration::from_millis(self.retry_max_delay_ms),
            )
    }

    /// Schema script to run on SQLite backends.
    pub fn schema_script(&self) -> SchemaScript {
        match &self.schema_script {
            Some(path) => SchemaScript::File(path.clone()),
            None => SchemaScript::Bundled,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# aspectdb store configuration
#
# Backend: "memory" (default) or "sqlite"
backend = "memory"

# SQLite database file. Omit for an in-memory database.
# sqlite_path = "aspects.db"

# Retry budget for optimistic updates (default: 3)
max_retry = 3

# Exponential backoff between retries, in milliseconds
retry_base_delay_ms = 1
retry_max_delay_ms = 50

# Serve a read-only store loaded from a JSON snapshot
read_only = false
# snapshot = "snapshot.json"

# Replace the bundled schema script (SQLite only)
# schema_script = "create-all.sql"
"#
    }

    /// Parse config text.
    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| StoreError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            StoreError::Config(msg) => {
                StoreError::config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StoreError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
