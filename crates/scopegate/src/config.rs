//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scopegate_store::{SqliteStore, DEFAULT_BUSY_TIMEOUT};

use crate::error::{EngineError, Result};

/// Configuration for the Engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emit audit events through `tracing` when no sink is installed.
    pub audit: bool,
    /// Storage configuration.
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit: true,
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

/// SQLite storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Open the configured SQLite store, running migrations.
    pub fn open(&self) -> Result<SqliteStore> {
        let store = match &self.path {
            Some(path) => SqliteStore::open_with_timeout(path, self.busy_timeout())?,
            None => SqliteStore::open_memory()?,
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.audit);
        assert_eq!(config.store.path, None);
        assert_eq!(config.store.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"store": {"path": "/var/lib/scopegate.db"}}"#).unwrap();
        assert!(config.audit);
        assert_eq!(config.store.path, Some(PathBuf::from("/var/lib/scopegate.db")));
        assert_eq!(config.store.busy_timeout(), DEFAULT_BUSY_TIMEOUT);

        let config =
            EngineConfig::from_json(r#"{"audit": false, "store": {"busy_timeout_ms": 250}}"#).unwrap();
        assert!(!config.audit);
        assert_eq!(config.store.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_json() {
        let err = EngineConfig::from_json("{audit: yes}").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scopegate.json");
        std::fs::write(&path, r#"{"audit": false}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.audit);

        let missing = EngineConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, EngineError::Config(_)));
    }
}
