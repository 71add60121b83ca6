//! Command implementations.

pub mod backend;
pub mod batch;
pub mod bindings;
pub mod completions;
pub mod init;
pub mod jobs;
pub mod models;
pub mod status;
pub mod sync;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{default_actor, load_config, resolve_config_path, resolve_db_path, BackendConfig, Config};
use crate::error::{Error, Result};
use crate::rpc::JsonRpcClient;
use crate::storage::SqliteStorage;
use crate::sync::Registry;

/// Global options every command may need.
#[derive(Debug, Clone, Copy)]
pub struct Globals<'a> {
    pub db: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub backend: Option<&'a str>,
    pub actor: Option<&'a str>,
}

impl Globals<'_> {
    /// Resolved database path.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if no path can be determined.
    pub fn db_path(&self) -> Result<PathBuf> {
        resolve_db_path(self.db).ok_or(Error::NotInitialized)
    }

    /// Resolved config path.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if no home directory can be found.
    pub fn config_path(&self) -> Result<PathBuf> {
        resolve_config_path(self.config)
            .ok_or_else(|| Error::Config("Could not determine the config file location".to_string()))
    }

    #[must_use]
    pub fn actor(&self) -> String {
        self.actor.map_or_else(default_actor, ToString::to_string)
    }

    /// Open the existing database.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the database file does not exist.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        let db_path = self.db_path()?;
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        SqliteStorage::open(&db_path)
    }

    /// Load the config file.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the file is missing or invalid.
    pub fn load_config(&self) -> Result<Config> {
        load_config(&self.config_path()?)
    }

    /// Open everything a sync command needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or config cannot be opened.
    pub fn workspace(&self) -> Result<Workspace> {
        Ok(Workspace {
            config: self.load_config()?,
            storage: self.open_storage()?,
            registry: Registry::builtin(),
            actor: self.actor(),
        })
    }
}

/// Config, database and model registry opened together.
pub struct Workspace {
    pub config: Config,
    pub storage: SqliteStorage,
    pub registry: Registry,
    pub actor: String,
}

/// Authenticated clients for both sides of a backend.
pub struct Connections {
    pub remote: JsonRpcClient,
    pub local: JsonRpcClient,
}

impl Connections {
    /// Log in to the backend and to the local database.
    ///
    /// # Errors
    ///
    /// Returns an error if either login fails.
    pub fn open(config: &Config, backend: &BackendConfig) -> Result<Self> {
        let remote = backend.connect()?;
        let local = config.local.connect(None)?;
        Ok(Self { remote, local })
    }
}

/// Shorten `text` to `max` characters for table output.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Format a Unix millisecond timestamp for humans.
#[must_use]
pub fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("çekmece ürünü", 8), "çekme...");
    }

    #[test]
    fn test_open_storage_requires_existing_db() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing.db");
        let globals = Globals {
            db: Some(&db),
            config: None,
            backend: None,
            actor: Some("test"),
        };
        assert!(matches!(globals.open_storage(), Err(Error::NotInitialized)));
        assert_eq!(globals.actor(), "test");
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0), "1970-01-01 00:00:00");
    }
}
