//! Batch scheduling: search candidate ids and enqueue one job per record.

use serde_json::Value;
use tracing::info;

use crate::config::BackendConfig;
use crate::rpc::{Domain, OdooRpc, SearchOptions};
use crate::storage::{JobKind, NewJob, SqliteStorage};

use super::registry::{BatchFilter, ModelConfig, Registry};
use super::types::{BatchStats, SyncResult};

/// Full remote search domain for a batch import of `config`.
///
/// Combines the caller's domain, the model's static filters, its
/// "bound-in" filters and the backend's extra domain for the model.
///
/// # Errors
///
/// Returns an error if the bound ids cannot be read, or `Unsupported` for
/// export-only models.
pub fn import_domain(
    storage: &SqliteStorage,
    backend: &BackendConfig,
    config: &ModelConfig,
    domain: &Domain,
) -> SyncResult<Domain> {
    let spec = config.import_spec()?;
    let mut full = domain.clone();

    for filter in &spec.batch_filters {
        match filter {
            BatchFilter::Static(extra) => full.extend(extra),
            BatchFilter::BoundIn { field, model } => {
                let ids = storage.bound_external_ids(&backend.name, model)?;
                full.push(field, "in", Value::from(ids));
            }
        }
    }

    if let Some(extra) = backend.domain_filter(config.name) {
        full.extend(extra);
    }
    Ok(full)
}

fn enqueue_all(
    storage: &mut SqliteStorage,
    backend: &BackendConfig,
    config: &ModelConfig,
    kind: JobKind,
    ids: &[i64],
    force: bool,
    actor: &str,
) -> SyncResult<BatchStats> {
    let mut stats = BatchStats {
        model: config.name.to_string(),
        found: ids.len(),
        ..BatchStats::default()
    };

    for id in ids {
        let job = NewJob {
            backend: backend.name.clone(),
            kind,
            model: config.name.to_string(),
            record_id: *id,
            force,
            priority: config.priority,
            payload: None,
        };
        if storage.enqueue_job(&job, actor)?.duplicate {
            stats.duplicates += 1;
        } else {
            stats.enqueued += 1;
        }
    }
    Ok(stats)
}

/// Schedules imports of every remote record matching a domain.
pub struct BatchImporter<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    backend: &'a BackendConfig,
    remote: &'a dyn OdooRpc,
    actor: &'a str,
}

impl<'a> BatchImporter<'a> {
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        backend: &'a BackendConfig,
        remote: &'a dyn OdooRpc,
        actor: &'a str,
    ) -> Self {
        Self {
            storage,
            registry,
            backend,
            remote,
            actor,
        }
    }

    /// Search the remote backend and enqueue one `import_record` job per id.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unknown or not importable, or if the
    /// search or enqueue fails.
    pub fn run(&mut self, model: &str, domain: &Domain, force: bool) -> SyncResult<BatchStats> {
        let config = self.registry.get(model)?;
        let full = import_domain(self.storage, self.backend, config, domain)?;

        let options = SearchOptions::default().with_inactive(config.include_inactive);
        let ids = self.remote.search(config.remote_model, &full, &options)?;
        info!(model = config.name, domain = ?full.terms(), found = ids.len(), "batch import search");

        enqueue_all(self.storage, self.backend, config, JobKind::ImportRecord, &ids, force, self.actor)
    }
}

/// Schedules exports of every local record matching a domain.
pub struct BatchExporter<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    backend: &'a BackendConfig,
    local: &'a dyn OdooRpc,
    actor: &'a str,
}

impl<'a> BatchExporter<'a> {
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        backend: &'a BackendConfig,
        local: &'a dyn OdooRpc,
        actor: &'a str,
    ) -> Self {
        Self {
            storage,
            registry,
            backend,
            local,
            actor,
        }
    }

    /// Search the local database and enqueue one `export_record` job per id.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unknown or not exportable, or if the
    /// search or enqueue fails.
    pub fn run(&mut self, model: &str, domain: &Domain, force: bool) -> SyncResult<BatchStats> {
        let config = self.registry.get(model)?;
        config.export_spec()?;

        let options = SearchOptions::default().with_inactive(config.include_inactive);
        let ids = self.local.search(config.name, domain, &options)?;
        info!(model = config.name, domain = ?domain.terms(), found = ids.len(), "batch export search");

        enqueue_all(self.storage, self.backend, config, JobKind::ExportRecord, &ids, force, self.actor)
    }
}
