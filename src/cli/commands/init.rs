//! Initialize odoo-sync.
//!
//! Creates the SQLite database (schema is applied on open) and writes a
//! config template with one example backend. Both default to
//! `~/.odoo-sync/`; `--db` and `--config` redirect them.

use super::Globals;
use crate::config::{save_config, Config};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    config: PathBuf,
    config_written: bool,
}

/// Execute the init command.
///
/// The config file is only written when missing (or with `force`), so
/// re-initializing a database keeps hand-edited backends.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the files cannot be created.
pub fn execute(globals: &Globals<'_>, force: bool, json: bool) -> Result<()> {
    let db_path = globals.db_path()?;
    let config_path = globals.config_path()?;

    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if force {
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{suffix}", db_path.display()));
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
    }
    SqliteStorage::open(&db_path)?;

    let config_written = force || !config_path.exists();
    if config_written {
        save_config(&config_path, &Config::default())?;
    }

    if json {
        let output = InitOutput {
            database: db_path,
            config: config_path,
            config_written,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized odoo-sync");
        println!("  Database: {}", db_path.display());
        if config_written {
            println!("  Config:   {} (template)", config_path.display());
            println!();
            println!("Next: edit the config with your local and backend connections,");
            println!("then run 'osync backend check'.");
        } else {
            println!("  Config:   {} (kept)", config_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_init_creates_database_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("osync.db");
        let config = dir.path().join("config.json");
        let globals = Globals {
            db: Some(&db),
            config: Some(&config),
            backend: None,
            actor: None,
        };

        execute(&globals, false, true).unwrap();
        assert!(db.exists());
        let loaded = load_config(&config).unwrap();
        assert_eq!(loaded.default_backend.as_deref(), Some("main"));

        let err = execute(&globals, false, true).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_force_recreates_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("osync.db");
        let config = dir.path().join("config.json");
        let globals = Globals {
            db: Some(&db),
            config: Some(&config),
            backend: None,
            actor: None,
        };

        execute(&globals, false, true).unwrap();
        let mut storage = SqliteStorage::open(&db).unwrap();
        storage.bind("main", "res.partner", 1, 2, None, "test").unwrap();
        drop(storage);

        execute(&globals, true, true).unwrap();
        let storage = SqliteStorage::open(&db).unwrap();
        assert!(storage.list_bindings("main", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_existing_config_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("osync.db");
        let config = dir.path().join("config.json");
        let mut custom = Config::default();
        custom.backends[0].name = "shop".to_string();
        custom.default_backend = Some("shop".to_string());
        save_config(&config, &custom).unwrap();

        let globals = Globals {
            db: Some(&db),
            config: Some(&config),
            backend: None,
            actor: None,
        };
        execute(&globals, false, true).unwrap();
        assert_eq!(load_config(&config).unwrap().backends[0].name, "shop");
    }
}
