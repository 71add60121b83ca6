//! Single-record export to the remote backend.
//!
//! Mirror of the importer: `read local -> heal binding -> dependencies ->
//! map -> create or update remote -> bind -> hooks`.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::rpc::{x2many_ids, Domain, OdooRpc, Record, SearchOptions};
use crate::storage::{Binding, SqliteStorage};

use super::binder::Binder;
use super::hash::{content_hash, has_changed};
use super::mapper::MapContext;
use super::registry::{transition_methods, ExportHook, ExportSpec, ModelConfig, Registry};
use super::types::{Direction, SkipReason, SyncAction, SyncError, SyncOutcome, SyncResult};

/// Exports local records to the remote backend.
pub struct Exporter<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    backend: &'a BackendConfig,
    remote: &'a dyn OdooRpc,
    local: &'a dyn OdooRpc,
    actor: &'a str,
    in_progress: HashSet<(&'static str, i64)>,
}

impl<'a> Exporter<'a> {
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        backend: &'a BackendConfig,
        remote: &'a dyn OdooRpc,
        local: &'a dyn OdooRpc,
        actor: &'a str,
    ) -> Self {
        Self {
            storage,
            registry,
            backend,
            remote,
            local,
            actor,
            in_progress: HashSet::new(),
        }
    }

    /// Export one local record.
    ///
    /// With `force` the remote write happens even when the mapped values
    /// are unchanged since the last export.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the local record does not exist,
    /// `Mapping` if a reference cannot be exported, or the underlying
    /// RPC/database error.
    pub fn export_record(&mut self, model: &str, local_id: i64, force: bool) -> SyncResult<SyncOutcome> {
        let registry = self.registry;
        let config = registry.get(model)?;
        let spec = config.export_spec()?;

        let key = (config.name, local_id);
        if !self.in_progress.insert(key) {
            debug!(model = config.name, local_id, "already exporting, skipped");
            return Ok(SyncOutcome {
                model: config.name.to_string(),
                direction: Direction::Export,
                action: SyncAction::Skipped(SkipReason::InProgress),
                binding: None,
            });
        }

        let result = self.run(config, spec, local_id, force);
        self.in_progress.remove(&key);

        if let Err(e) = &result {
            warn!(model = config.name, local_id, error = %e, "export failed");
        }
        result
    }

    /// Export a referenced record unless it is already bound.
    ///
    /// # Errors
    ///
    /// Propagates errors of the dependency export.
    pub fn export_dependency(&mut self, model: &str, local_id: i64) -> SyncResult<()> {
        let bound = Binder::new(self.storage, &self.backend.name, model)
            .to_external(local_id, true)?
            .is_some();
        if bound {
            return Ok(());
        }
        debug!(model, local_id, "exporting dependency");
        self.export_record(model, local_id, false)?;
        Ok(())
    }

    fn run(
        &mut self,
        config: &'a ModelConfig,
        spec: &'a ExportSpec,
        local_id: i64,
        force: bool,
    ) -> SyncResult<SyncOutcome> {
        let backend_config: &'a BackendConfig = self.backend;
        let backend = backend_config.name.as_str();

        let Some(record) = self.local.read(config.name, &[local_id], &[])?.into_iter().next() else {
            return Err(SyncError::RecordNotFound {
                model: config.name.to_string(),
                id: local_id,
            });
        };

        let binding = self.heal_binding(config, local_id)?;

        let mut dependencies = Vec::new();
        for dependency in &spec.dependencies {
            dependencies.extend(dependency.targets(&record)?);
        }
        for (model, id) in dependencies {
            self.export_dependency(model, id)?;
        }

        let mapped = {
            let ctx = MapContext {
                direction: Direction::Export,
                backend: backend_config,
                storage: &*self.storage,
                target: self.remote,
                target_model: config.remote_model,
            };
            spec.mapper.map(&ctx, &record)?
        };

        let update = mapped.values(false);
        let hash = content_hash(&update);

        // A natural-key hit that another local record is bound to is not adopted.
        let matched = match mapped.matched() {
            Some(id)
                if self
                    .storage
                    .binding_by_external(backend, config.name, id)?
                    .is_some_and(|b| b.local_id != local_id) =>
            {
                debug!(model = config.name, local_id, external_id = id, "match is bound elsewhere");
                None
            }
            other => other,
        };

        let bound = binding.as_ref().filter(|b| b.is_bound());
        let (external_id, action) = match (bound, matched) {
            (Some(binding), _) => {
                if !force && !has_changed(&hash, binding.content_hash.as_deref()) {
                    debug!(model = config.name, local_id, "unchanged since last export");
                    (binding.external_id, SyncAction::Skipped(SkipReason::Unchanged))
                } else {
                    self.remote.write(config.remote_model, &[binding.external_id], &update)?;
                    (binding.external_id, SyncAction::Updated)
                }
            }
            (None, Some(external_id)) => {
                info!(model = config.name, local_id, external_id, "adopting existing remote record");
                self.remote.write(config.remote_model, &[external_id], &update)?;
                (external_id, SyncAction::Matched)
            }
            (None, None) => {
                let external_id = self.remote.create(config.remote_model, &mapped.values(true))?;
                (external_id, SyncAction::Created)
            }
        };

        let binding = if action == SyncAction::Skipped(SkipReason::Unchanged) {
            binding
        } else {
            let binding = self
                .storage
                .bind(backend, config.name, local_id, external_id, Some(&hash), self.actor)?;
            info!(model = config.name, local_id, external_id, action = %action, "exported");
            Some(binding)
        };

        for hook in &spec.hooks {
            self.run_hook(config, hook, &record, external_id)?;
        }

        Ok(SyncOutcome {
            model: config.name.to_string(),
            direction: Direction::Export,
            action,
            binding,
        })
    }

    /// Reset the binding when its remote record no longer exists.
    fn heal_binding(&mut self, config: &ModelConfig, local_id: i64) -> SyncResult<Option<Binding>> {
        let backend = self.backend.name.as_str();
        let Some(binding) = self.storage.binding_by_local(backend, config.name, local_id)? else {
            return Ok(None);
        };
        if !binding.is_bound() {
            return Ok(Some(binding));
        }

        let domain = Domain::leaf("id", "=", binding.external_id);
        let options = SearchOptions::limit(1).with_inactive(true);
        if self.remote.search(config.remote_model, &domain, &options)?.is_empty() {
            warn!(
                model = config.name,
                local_id,
                external_id = binding.external_id,
                "remote record vanished, resetting binding"
            );
            self.storage.reset_external_id(binding.id, self.actor)?;
            return Ok(self.storage.get_binding(binding.id)?);
        }
        Ok(Some(binding))
    }

    fn run_hook(
        &mut self,
        config: &ModelConfig,
        hook: &ExportHook,
        record: &Record,
        external_id: i64,
    ) -> SyncResult<()> {
        match hook {
            ExportHook::ExportChildren { field, model } => {
                for id in record.get(*field).map(x2many_ids).unwrap_or_default() {
                    self.export_record(model, id, false)?;
                }
            }

            ExportHook::StateTransitions { field } => {
                let Some(target) = record.get(*field).and_then(Value::as_str) else {
                    return Ok(());
                };
                let current = self
                    .remote
                    .read(config.remote_model, &[external_id], &[*field])?
                    .into_iter()
                    .next()
                    .and_then(|r| r.get(*field).and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "draft".to_string());
                for method in transition_methods(&current, target) {
                    debug!(model = config.remote_model, external_id, method, "applying remote state transition");
                    self.remote.call(config.remote_model, method, &[external_id])?;
                }
            }
        }
        Ok(())
    }
}
