//! SQLite storage implementation.
//!
//! This module provides the storage backend for bindings and deferred jobs.
//! It follows the `MutationContext` pattern for transaction discipline and
//! audit logging.

use crate::error::{Error, Result};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures to collect audit events, which are written
/// in the same transaction as the change itself.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }

    /// Record an event with a free-form comment.
    pub fn record_comment(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

// ==================
// Row types
// ==================

/// A pairing between a local record and a remote record on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: i64,
    pub backend: String,
    pub model: String,
    pub local_id: i64,
    /// Remote id, `0` when unknown or vanished.
    pub external_id: i64,
    /// Last successful sync (Unix ms).
    pub sync_date: Option<i64>,
    /// Hash of the last exported values.
    pub content_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Binding {
    /// Whether the binding currently points at a remote record.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.external_id != 0
    }
}

const BINDING_COLUMNS: &str =
    "id, backend, model, local_id, external_id, sync_date, content_hash, created_at, updated_at";

fn map_binding(row: &Row<'_>) -> rusqlite::Result<Binding> {
    Ok(Binding {
        id: row.get(0)?,
        backend: row.get(1)?,
        model: row.get(2)?,
        local_id: row.get(3)?,
        external_id: row.get(4)?,
        sync_date: row.get(5)?,
        content_hash: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// What a deferred job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ImportRecord,
    ExportRecord,
    ImportField,
}

impl JobKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ImportRecord => "import_record",
            Self::ExportRecord => "export_record",
            Self::ImportField => "import_field",
        }
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "import_record" => Ok(Self::ImportRecord),
            "export_record" => Ok(Self::ExportRecord),
            "import_field" => Ok(Self::ImportField),
            other => Err(format!("unknown job kind '{other}'")),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a deferred job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Started,
    Done,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "started" => Ok(Self::Started),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted deferred job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub uuid: String,
    pub backend: String,
    pub kind: JobKind,
    pub model: String,
    /// External id for imports, local id for exports, `0` for field imports.
    pub record_id: i64,
    pub force: bool,
    /// Lower runs first.
    pub priority: i64,
    pub state: JobState,
    pub attempts: i64,
    pub payload: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

const JOB_COLUMNS: &str = "id, uuid, backend, kind, model, record_id, force, priority, state, \
     attempts, payload, result, error, created_at, started_at, finished_at";

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        uuid: row.get(1)?,
        backend: row.get(2)?,
        kind: parse_column(row, 3)?,
        model: row.get(4)?,
        record_id: row.get(5)?,
        force: row.get(6)?,
        priority: row.get(7)?,
        state: parse_column(row, 8)?,
        attempts: row.get(9)?,
        payload: row.get(10)?,
        result: row.get(11)?,
        error: row.get(12)?,
        created_at: row.get(13)?,
        started_at: row.get(14)?,
        finished_at: row.get(15)?,
    })
}

/// A job to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub backend: String,
    pub kind: JobKind,
    pub model: String,
    pub record_id: i64,
    pub force: bool,
    pub priority: i64,
    pub payload: Option<String>,
}

/// Result of [`SqliteStorage::enqueue_job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    pub job_id: i64,
    /// An identical pending job already existed and was reused.
    pub duplicate: bool,
}

/// Binding totals for one backend and model.
#[derive(Debug, Clone, Serialize)]
pub struct BindingCount {
    pub backend: String,
    pub model: String,
    pub total: usize,
    /// Bindings with a non-zero external id.
    pub bound: usize,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Binding Operations
    // ==================

    /// Get a binding by its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_binding(&self, id: i64) -> Result<Option<Binding>> {
        let binding = self
            .conn
            .query_row(
                &format!("SELECT {BINDING_COLUMNS} FROM bindings WHERE id = ?1"),
                [id],
                map_binding,
            )
            .optional()?;
        Ok(binding)
    }

    /// Find the binding of a remote record. `external_id` 0 never matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn binding_by_external(
        &self,
        backend: &str,
        model: &str,
        external_id: i64,
    ) -> Result<Option<Binding>> {
        if external_id == 0 {
            return Ok(None);
        }
        let binding = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BINDING_COLUMNS} FROM bindings
                     WHERE backend = ?1 AND model = ?2 AND external_id = ?3"
                ),
                rusqlite::params![backend, model, external_id],
                map_binding,
            )
            .optional()?;
        Ok(binding)
    }

    /// Find the binding of a local record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn binding_by_local(
        &self,
        backend: &str,
        model: &str,
        local_id: i64,
    ) -> Result<Option<Binding>> {
        let binding = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BINDING_COLUMNS} FROM bindings
                     WHERE backend = ?1 AND model = ?2 AND local_id = ?3"
                ),
                rusqlite::params![backend, model, local_id],
                map_binding,
            )
            .optional()?;
        Ok(binding)
    }

    /// Bind a local record to a remote record.
    ///
    /// Updates the local record's existing binding if there is one, otherwise
    /// creates it. `sync_date` is set to now and `content_hash` replaced.
    /// Binding an external id that another local record already holds fails
    /// on the unique index.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn bind(
        &mut self,
        backend: &str,
        model: &str,
        local_id: i64,
        external_id: i64,
        content_hash: Option<&str>,
        actor: &str,
    ) -> Result<Binding> {
        let now = now_ms();

        let id = self.mutate("bind", actor, |tx, ctx| {
            let existing: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT id, external_id FROM bindings
                     WHERE backend = ?1 AND model = ?2 AND local_id = ?3",
                    rusqlite::params![backend, model, local_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            if let Some((id, old_external)) = existing {
                tx.execute(
                    "UPDATE bindings
                     SET external_id = ?1, sync_date = ?2, content_hash = ?3, updated_at = ?2
                     WHERE id = ?4",
                    rusqlite::params![external_id, now, content_hash, id],
                )?;
                ctx.record_change(
                    "binding",
                    &id.to_string(),
                    EventType::BindingUpdated,
                    Some(old_external.to_string()),
                    Some(external_id.to_string()),
                );
                Ok(id)
            } else {
                tx.execute(
                    "INSERT INTO bindings (backend, model, local_id, external_id, sync_date, content_hash, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?5)",
                    rusqlite::params![backend, model, local_id, external_id, now, content_hash],
                )?;
                let id = tx.last_insert_rowid();
                ctx.record_comment(
                    "binding",
                    &id.to_string(),
                    EventType::BindingCreated,
                    &format!("{model} local {local_id} <-> external {external_id}"),
                );
                Ok(id)
            }
        })?;

        self.get_binding(id)?.ok_or(Error::BindingNotFound { id })
    }

    /// Record a successful re-sync of an existing binding.
    ///
    /// # Errors
    ///
    /// Returns `BindingNotFound` if the binding does not exist.
    pub fn mark_synced(&mut self, id: i64, content_hash: Option<&str>, actor: &str) -> Result<()> {
        let now = now_ms();
        self.mutate("mark_synced", actor, |tx, ctx| {
            let updated = tx.execute(
                "UPDATE bindings SET sync_date = ?1, content_hash = ?2, updated_at = ?1 WHERE id = ?3",
                rusqlite::params![now, content_hash, id],
            )?;
            if updated == 0 {
                return Err(Error::BindingNotFound { id });
            }
            ctx.record_event("binding", &id.to_string(), EventType::BindingSynced);
            Ok(())
        })
    }

    /// Reset a binding's external id to the `0` sentinel (remote record vanished).
    ///
    /// # Errors
    ///
    /// Returns `BindingNotFound` if the binding does not exist.
    pub fn reset_external_id(&mut self, id: i64, actor: &str) -> Result<()> {
        let now = now_ms();
        self.mutate("reset_external_id", actor, |tx, ctx| {
            let old: Option<i64> = tx
                .query_row("SELECT external_id FROM bindings WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let Some(old) = old else {
                return Err(Error::BindingNotFound { id });
            };

            tx.execute(
                "UPDATE bindings SET external_id = 0, content_hash = NULL, updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now, id],
            )?;
            ctx.record_change(
                "binding",
                &id.to_string(),
                EventType::ExternalIdReset,
                Some(old.to_string()),
                Some("0".to_string()),
            );
            Ok(())
        })
    }

    /// List bindings, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_bindings(
        &self,
        backend: &str,
        model: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Binding>> {
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BINDING_COLUMNS} FROM bindings
             WHERE backend = ?1 AND (?2 IS NULL OR model = ?2)
             ORDER BY updated_at DESC, id DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(rusqlite::params![backend, model, limit], map_binding)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// External ids of every bound record of a model.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn bound_external_ids(&self, backend: &str, model: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT external_id FROM bindings
             WHERE backend = ?1 AND model = ?2 AND external_id != 0
             ORDER BY external_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![backend, model], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Binding totals grouped by backend and model.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn binding_counts(&self) -> Result<Vec<BindingCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT backend, model, COUNT(*), SUM(CASE WHEN external_id != 0 THEN 1 ELSE 0 END)
             FROM bindings GROUP BY backend, model ORDER BY backend, model",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BindingCount {
                backend: row.get(0)?,
                model: row.get(1)?,
                total: row.get::<_, i64>(2)?.try_into().unwrap_or_default(),
                bound: row.get::<_, i64>(3)?.try_into().unwrap_or_default(),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Audit history of a binding, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn binding_history(&self, id: i64, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, "binding", &id.to_string(), limit)?)
    }

    // ==================
    // Job Operations
    // ==================

    /// Enqueue a job unless an identical one is already pending.
    ///
    /// Identity is (backend, kind, model, record id, payload). When a
    /// duplicate is found its priority is lowered to the new job's if
    /// smaller and `force` is upgraded, so the pending job covers both
    /// requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn enqueue_job(&mut self, job: &NewJob, actor: &str) -> Result<Enqueued> {
        let now = now_ms();

        self.mutate("enqueue_job", actor, |tx, ctx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM jobs
                     WHERE backend = ?1 AND kind = ?2 AND model = ?3 AND record_id = ?4
                       AND payload IS ?5 AND state = 'pending'
                     ORDER BY id LIMIT 1",
                    rusqlite::params![
                        job.backend,
                        job.kind.as_str(),
                        job.model,
                        job.record_id,
                        job.payload
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(job_id) = existing {
                tx.execute(
                    "UPDATE jobs SET priority = MIN(priority, ?1), force = MAX(force, ?2) WHERE id = ?3",
                    rusqlite::params![job.priority, job.force, job_id],
                )?;
                return Ok(Enqueued {
                    job_id,
                    duplicate: true,
                });
            }

            tx.execute(
                "INSERT INTO jobs (uuid, backend, kind, model, record_id, force, priority, state, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    job.backend,
                    job.kind.as_str(),
                    job.model,
                    job.record_id,
                    job.force,
                    job.priority,
                    job.payload,
                    now
                ],
            )?;
            let job_id = tx.last_insert_rowid();
            ctx.record_comment(
                "job",
                &job_id.to_string(),
                EventType::JobEnqueued,
                &format!("{} {} {}", job.kind, job.model, job.record_id),
            );
            Ok(Enqueued {
                job_id,
                duplicate: false,
            })
        })
    }

    /// Get a job by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let job = self
            .conn
            .query_row(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"), [id], map_job)
            .optional()?;
        Ok(job)
    }

    /// The next pending job: lowest priority number first, then oldest.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn next_pending_job(&self, backend: Option<&str>) -> Result<Option<Job>> {
        let job = self
            .conn
            .query_row(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE state = 'pending' AND (?1 IS NULL OR backend = ?1)
                     ORDER BY priority ASC, id ASC LIMIT 1"
                ),
                [backend],
                map_job,
            )
            .optional()?;
        Ok(job)
    }

    /// List jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_jobs(
        &self,
        backend: Option<&str>,
        state: Option<JobState>,
        limit: Option<u32>,
    ) -> Result<Vec<Job>> {
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE (?1 IS NULL OR backend = ?1) AND (?2 IS NULL OR state = ?2)
             ORDER BY id DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![backend, state.map(|s| s.as_str()), limit],
            map_job,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Job totals per state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn job_counts(&self) -> Result<Vec<(JobState, usize)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state ORDER BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                parse_column::<JobState>(row, 0)?,
                row.get::<_, i64>(1)?.try_into().unwrap_or_default(),
            ))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Move a pending job to `started` and count the attempt.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` if the job does not exist, or `InvalidArgument`
    /// if it is not pending.
    pub fn start_job(&mut self, id: i64, actor: &str) -> Result<()> {
        self.transition_job(id, actor, &[JobState::Pending], EventType::JobStarted, |tx| {
            tx.execute(
                "UPDATE jobs SET state = 'started', attempts = attempts + 1, started_at = ?1 WHERE id = ?2",
                rusqlite::params![now_ms(), id],
            )
        })
    }

    /// Mark a started job as done with an optional result summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is missing or not started.
    pub fn finish_job(&mut self, id: i64, result: Option<&str>, actor: &str) -> Result<()> {
        self.transition_job(id, actor, &[JobState::Started], EventType::JobDone, |tx| {
            tx.execute(
                "UPDATE jobs SET state = 'done', result = ?1, error = NULL, finished_at = ?2 WHERE id = ?3",
                rusqlite::params![result, now_ms(), id],
            )
        })
    }

    /// Mark a started job as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is missing or not started.
    pub fn fail_job(&mut self, id: i64, error: &str, actor: &str) -> Result<()> {
        self.transition_job(id, actor, &[JobState::Started], EventType::JobFailed, |tx| {
            tx.execute(
                "UPDATE jobs SET state = 'failed', error = ?1, finished_at = ?2 WHERE id = ?3",
                rusqlite::params![error, now_ms(), id],
            )
        })
    }

    /// Put a failed (or abandoned started) job back in the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is missing, pending or done.
    pub fn requeue_job(&mut self, id: i64, actor: &str) -> Result<()> {
        self.transition_job(
            id,
            actor,
            &[JobState::Failed, JobState::Started],
            EventType::JobRequeued,
            |tx| {
                tx.execute(
                    "UPDATE jobs SET state = 'pending', error = NULL, started_at = NULL, finished_at = NULL
                     WHERE id = ?1",
                    [id],
                )
            },
        )
    }

    fn transition_job<F>(
        &mut self,
        id: i64,
        actor: &str,
        allowed: &[JobState],
        event: EventType,
        update: F,
    ) -> Result<()>
    where
        F: FnOnce(&Transaction) -> rusqlite::Result<usize>,
    {
        self.mutate(event.as_str(), actor, |tx, ctx| {
            let state: Option<String> = tx
                .query_row("SELECT state FROM jobs WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let Some(state) = state else {
                return Err(Error::JobNotFound { id });
            };
            let state: JobState = state.parse().map_err(Error::Other)?;

            if !allowed.contains(&state) {
                return Err(Error::InvalidArgument(format!(
                    "job {id} is {state}, expected {}",
                    allowed
                        .iter()
                        .map(JobState::as_str)
                        .collect::<Vec<_>>()
                        .join(" or ")
                )));
            }

            update(tx)?;
            ctx.record_change(
                "job",
                &id.to_string(),
                event,
                Some(state.as_str().to_string()),
                None,
            );
            Ok(())
        })
    }
}
