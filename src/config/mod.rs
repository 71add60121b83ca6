//! Configuration management.
//!
//! This module resolves the odoo-sync directories, loads the JSON config
//! file and picks the backend a command operates on.
//!
//! # Layout
//!
//! Everything lives under `~/.odoo-sync/`:
//! - **Config**: `~/.odoo-sync/config.json` (local connection + backends)
//! - **Database**: `~/.odoo-sync/data/osync.db` (bindings, jobs, events)

mod backend;

pub use backend::{BackendConfig, ConnectionSettings, MainRecord};

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection to the local Odoo database (the one bindings point into).
    pub local: ConnectionSettings,

    /// Remote Odoo backends.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Backend used when `--backend` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local: ConnectionSettings {
                password_env: Some("OSYNC_LOCAL_PASSWORD".to_string()),
                ..ConnectionSettings::default()
            },
            backends: vec![BackendConfig::example()],
            default_backend: Some("main".to_string()),
        }
    }
}

impl Config {
    /// Select a backend by name, falling back to `default_backend`, then to
    /// the only configured backend.
    ///
    /// # Errors
    ///
    /// Returns `BackendNotFound` (with the configured names) when nothing matches.
    pub fn backend(&self, name: Option<&str>) -> Result<&BackendConfig> {
        let wanted = name.or(self.default_backend.as_deref());

        let found = match wanted {
            Some(wanted) => self.backends.iter().find(|b| b.name == wanted),
            None if self.backends.len() == 1 => self.backends.first(),
            None => None,
        };

        found.ok_or_else(|| Error::BackendNotFound {
            name: wanted.unwrap_or("<default>").to_string(),
            available: self.backend_names(),
        })
    }

    /// Names of all configured backends.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name.clone()).collect()
    }

    /// Check the config for mistakes that would only surface mid-sync.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                return Err(Error::Config(format!("duplicate backend name '{}'", backend.name)));
            }
            if backend.version_major().is_none() {
                return Err(Error::Config(format!(
                    "backend '{}' has an unparseable version '{}'",
                    backend.name, backend.version
                )));
            }
        }
        if let Some(default) = &self.default_backend {
            if !seen.contains(default.as_str()) {
                return Err(Error::Config(format!(
                    "default_backend '{default}' is not a configured backend"
                )));
            }
        }
        Ok(())
    }
}

/// Get the global odoo-sync directory (`~/.odoo-sync/`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".odoo-sync"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `OSYNC_DB` environment variable
/// 3. Global location: `~/.odoo-sync/data/osync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("OSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("osync.db"))
}

/// Resolve the config file path.
///
/// Priority: explicit path, `OSYNC_CONFIG`, then `~/.odoo-sync/config.json`.
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(config_path) = std::env::var("OSYNC_CONFIG") {
        if !config_path.trim().is_empty() {
            return Some(PathBuf::from(config_path));
        }
    }

    global_dir().map(|dir| dir.join("config.json"))
}

/// Load and validate the configuration file.
///
/// # Errors
///
/// Returns a `Config` error if the file is missing, unreadable or invalid.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "No config file at {}. Run `osync init` to create one.",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    let config: Config = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;

    config.validate()?;
    Ok(config)
}

/// Save the configuration file, creating parent directories.
///
/// # Errors
///
/// Returns a `Config` error if the file cannot be written.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Get the default actor name recorded in audit events.
///
/// Priority:
/// 1. `OSYNC_ACTOR` environment variable
/// 2. System username
/// 3. "osync"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("OSYNC_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "osync".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_backends() -> Config {
        let mut config = Config::default();
        let mut second = BackendConfig::example();
        second.name = "legacy".to_string();
        second.version = "12.0".to_string();
        config.backends.push(second);
        config
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/osync.db");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_config_path_with_explicit() {
        let explicit = PathBuf::from("/custom/config.json");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_backend_selection() {
        let config = two_backends();
        assert_eq!(config.backend(None).unwrap().name, "main");
        assert_eq!(config.backend(Some("legacy")).unwrap().name, "legacy");

        let err = config.backend(Some("nope")).unwrap_err();
        match err {
            Error::BackendNotFound { name, available } => {
                assert_eq!(name, "nope");
                assert_eq!(available, vec!["main".to_string(), "legacy".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_backend_is_implicit_default() {
        let mut config = Config::default();
        config.default_backend = None;
        assert_eq!(config.backend(None).unwrap().name, "main");
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_default() {
        let mut config = two_backends();
        config.backends[1].name = "main".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.default_backend = Some("other".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.backends[0]
            .constants
            .insert("fallback_pricelist_id".to_string(), json!(123));
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.backends[0].constant("fallback_pricelist_id"), Some(&json!(123)));
        assert_eq!(loaded.default_backend.as_deref(), Some("main"));
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
