//! Database schema definitions.
//!
//! The base DDL creates every table at its original shape; later columns
//! and indexes arrive through [`super::migrations`].

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The base SQL schema.
///
/// Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Bindings
-- ====================

-- One row per (backend, model, local record). external_id 0 means the
-- remote record is unknown or vanished.
CREATE TABLE IF NOT EXISTS bindings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    backend TEXT NOT NULL,
    model TEXT NOT NULL,
    local_id INTEGER NOT NULL,
    external_id INTEGER NOT NULL DEFAULT 0,
    sync_date INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (local_id > 0),
    CHECK (external_id >= 0)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_bindings_local
    ON bindings(backend, model, local_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_bindings_external
    ON bindings(backend, model, external_id) WHERE external_id != 0;

-- ====================
-- Deferred Jobs
-- ====================

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    backend TEXT NOT NULL,
    kind TEXT NOT NULL,
    model TEXT NOT NULL,
    record_id INTEGER NOT NULL DEFAULT 0,
    force INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 10,
    state TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    payload TEXT,
    result TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    finished_at INTEGER,
    CHECK (kind IN ('import_record', 'export_record', 'import_field')),
    CHECK (state IN ('pending', 'started', 'done', 'failed'))
);

CREATE INDEX IF NOT EXISTS idx_jobs_pending ON jobs(state, priority, id);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
";

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"bindings".to_string()));
        assert!(tables.contains(&"jobs".to_string()));
        assert!(tables.contains(&"events".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_external_id_unique_except_sentinel() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = |local_id: i64, external_id: i64| {
            conn.execute(
                "INSERT INTO bindings (backend, model, local_id, external_id, created_at, updated_at)
                 VALUES ('main', 'res.partner', ?1, ?2, 0, 0)",
                rusqlite::params![local_id, external_id],
            )
        };

        assert!(insert(1, 10).is_ok());
        assert!(insert(2, 10).is_err(), "external id bound twice");
        assert!(insert(3, 0).is_ok());
        assert!(insert(4, 0).is_ok(), "sentinel may repeat");
        assert!(insert(1, 11).is_err(), "local record bound twice");
    }

    #[test]
    fn test_job_state_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO jobs (uuid, backend, kind, model, state, created_at)
             VALUES ('u1', 'main', 'import_record', 'res.partner', 'exploded', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
