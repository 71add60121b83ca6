//! Single-record import from the remote backend.
//!
//! The importer runs `fetch -> guard -> up-to-date check -> dependencies ->
//! map -> create or update -> bind -> hooks` for one remote record. Missing
//! dependencies are imported recursively on the same importer, so the
//! in-progress set spans the whole dependency tree.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::rpc::{many2one_id, replace_command, x2many_ids, Domain, OdooRpc, Record, SearchOptions};
use crate::storage::{JobKind, NewJob, SqliteStorage};

use super::binder::Binder;
use super::mapper::MapContext;
use super::registry::{transition_methods, ImportHook, ImportSpec, MirrorSpec, ModelConfig, Registry};
use super::types::{Direction, SkipReason, SyncAction, SyncError, SyncOutcome, SyncResult};

/// Odoo's server datetime format.
const SERVER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether a binding synced at `sync_date` (Unix ms) already reflects a
/// remote record last written at `write_date`.
#[must_use]
pub fn is_up_to_date(sync_date: Option<i64>, write_date: Option<&Value>) -> bool {
    let Some(sync_date) = sync_date else {
        return false;
    };
    let Some(write_date) = write_date.and_then(Value::as_str) else {
        return false;
    };
    // Some versions append microseconds.
    let trimmed = write_date.split('.').next().unwrap_or(write_date);
    NaiveDateTime::parse_from_str(trimmed, SERVER_DATETIME_FORMAT)
        .map(|dt| dt.and_utc().timestamp_millis() <= sync_date)
        .unwrap_or(false)
}

/// Imports remote records into the local database.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    backend: &'a BackendConfig,
    remote: &'a dyn OdooRpc,
    local: &'a dyn OdooRpc,
    actor: &'a str,
    in_progress: HashSet<(&'static str, i64)>,
}

impl<'a> Importer<'a> {
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

    /// Import one remote record.
    ///
    /// With `force` the up-to-date check is skipped and dependencies are
    /// re-imported even when bound.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the remote record does not exist,
    /// `Mapping` if a required reference cannot be resolved, `Unsupported`
    /// for records the model refuses, or the underlying RPC/database error.
    pub fn import_record(&mut self, model: &str, external_id: i64, force: bool) -> SyncResult<SyncOutcome> {
        let registry = self.registry;
        let config = registry.get(model)?;
        let spec = config.import_spec()?;

        let key = (config.name, external_id);
        if !self.in_progress.insert(key) {
            debug!(model = config.name, external_id, "already importing, skipped");
            return Ok(SyncOutcome {
                model: config.name.to_string(),
                direction: Direction::Import,
                action: SyncAction::Skipped(SkipReason::InProgress),
                binding: None,
            });
        }

        let result = self.run(config, spec, external_id, force);
        self.in_progress.remove(&key);

        if let Err(e) = &result {
            warn!(model = config.name, external_id, error = %e, "import failed");
        }
        result
    }

    /// Import a referenced record unless it is already bound.
    ///
    /// # Errors
    ///
    /// Propagates errors of the dependency import.
    pub fn import_dependency(&mut self, model: &str, external_id: i64, force: bool) -> SyncResult<()> {
        let bound = Binder::new(self.storage, &self.backend.name, model)
            .to_internal(external_id, false)?
            .is_some();
        if bound && !force {
            return Ok(());
        }
        debug!(model, external_id, "importing dependency");
        self.import_record(model, external_id, force)?;
        Ok(())
    }

    fn run(
        &mut self,
        config: &'a ModelConfig,
        spec: &'a ImportSpec,
        external_id: i64,
        force: bool,
    ) -> SyncResult<SyncOutcome> {
        let backend_config: &'a BackendConfig = self.backend;
        let backend = backend_config.name.as_str();

        let existing = self.storage.binding_by_external(backend, config.name, external_id)?;

        let Some(record) = self
            .remote
            .read(config.remote_model, &[external_id], &[])?
            .into_iter()
            .next()
        else {
            if let Some(binding) = &existing {
                warn!(model = config.name, external_id, "remote record vanished, resetting binding");
                self.storage.reset_external_id(binding.id, self.actor)?;
            }
            return Err(SyncError::RecordNotFound {
                model: config.remote_model.to_string(),
                id: external_id,
            });
        };

        let mut dependencies = Vec::new();
        for dependency in &spec.dependencies {
            dependencies.extend(dependency.targets(&record)?);
        }

        if !force
            && existing
                .as_ref()
                .is_some_and(|b| is_up_to_date(b.sync_date, record.get("write_date")))
        {
            debug!(model = config.name, external_id, "up to date");
            return Ok(SyncOutcome {
                model: config.name.to_string(),
                direction: Direction::Import,
                action: SyncAction::Skipped(SkipReason::UpToDate),
                binding: existing,
            });
        }

        for (model, id) in dependencies {
            self.import_dependency(model, id, force)?;
        }

        let mapped = {
            let ctx = MapContext {
                direction: Direction::Import,
                backend: backend_config,
                storage: &*self.storage,
                target: self.local,
                target_model: config.name,
            };
            spec.mapper.map(&ctx, &record)?
        };

        let current = match &existing {
            Some(binding) => self
                .local
                .read(config.name, &[binding.local_id], &[])?
                .into_iter()
                .next(),
            None => None,
        };

        if let (Some(binding), None) = (&existing, &current) {
            warn!(model = config.name, external_id, local_id = binding.local_id, "local record vanished, rebinding");
            self.storage.reset_external_id(binding.id, self.actor)?;
        }

        // A natural-key hit that is already bound elsewhere is not adopted.
        let matched = match mapped.matched() {
            Some(id)
                if self
                    .storage
                    .binding_by_local(backend, config.name, id)?
                    .is_some_and(|b| b.is_bound()) =>
            {
                None
            }
            other => other,
        };

        let (local_id, action) = match (current, matched) {
            (Some(current), _) => {
                let local_id = record_id(&current);
                let values = mapped.update_values(Some(&current));
                if !values.is_empty() {
                    self.local.write(config.name, &[local_id], &values)?;
                }
                (local_id, SyncAction::Updated)
            }
            (None, Some(local_id)) => {
                let current = self.local.read(config.name, &[local_id], &[])?.into_iter().next();
                let values = mapped.update_values(current.as_ref());
                if !values.is_empty() {
                    self.local.write(config.name, &[local_id], &values)?;
                }
                (local_id, SyncAction::Matched)
            }
            (None, None) => {
                let local_id = self.local.create(config.name, &mapped.values(true))?;
                (local_id, SyncAction::Created)
            }
        };

        let binding = self
            .storage
            .bind(backend, config.name, local_id, external_id, None, self.actor)?;

        info!(model = config.name, external_id, local_id, action = %action, "imported");

        for hook in &spec.hooks {
            self.run_hook(config, hook, &record, local_id, force)?;
        }

        Ok(SyncOutcome {
            model: config.name.to_string(),
            direction: Direction::Import,
            action,
            binding: Some(binding),
        })
    }

    fn run_hook(
        &mut self,
        config: &ModelConfig,
        hook: &ImportHook,
        record: &Record,
        local_id: i64,
        force: bool,
    ) -> SyncResult<()> {
        match hook {
            ImportHook::ImportChildren { field, model } => {
                for id in record.get(*field).map(x2many_ids).unwrap_or_default() {
                    self.import_record(model, id, force)?;
                }
            }

            ImportHook::DeferChildren { field, model } => {
                for id in record.get(*field).map(x2many_ids).unwrap_or_default() {
                    self.defer(model, id, force)?;
                }
            }

            ImportHook::Link { field, to, model } => {
                let ids = record.get(*field).map(x2many_ids).unwrap_or_default();
                for id in &ids {
                    self.import_dependency(model, *id, force)?;
                }
                let binder = Binder::new(self.storage, &self.backend.name, model);
                let mut local_ids = Vec::new();
                for id in ids {
                    local_ids.extend(binder.to_internal(id, true)?);
                }
                let mut values = Record::new();
                values.insert((*to).to_string(), replace_command(&local_ids));
                self.local.write(config.name, &[local_id], &values)?;
            }

            ImportHook::LinkOrDefer { field, to, model } => {
                let Some(id) = record.get(*field).and_then(many2one_id) else {
                    return Ok(());
                };
                let bound = Binder::new(self.storage, &self.backend.name, model).to_internal(id, true)?;
                match bound {
                    Some(target) => {
                        let mut values = Record::new();
                        values.insert((*to).to_string(), Value::from(target));
                        self.local.write(config.name, &[local_id], &values)?;
                    }
                    None => self.defer(model, id, force)?,
                }
            }

            ImportHook::Mirror(mirror) => self.sync_mirror(config, mirror, record, local_id)?,

            ImportHook::StateTransitions { field } => {
                let Some(target) = record.get(*field).and_then(Value::as_str) else {
                    return Ok(());
                };
                let current = self
                    .local
                    .read(config.name, &[local_id], &[*field])?
                    .into_iter()
                    .next()
                    .and_then(|r| r.get(*field).and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "draft".to_string());
                for method in transition_methods(&current, target) {
                    debug!(model = config.name, local_id, method, "applying state transition");
                    self.local.call(config.name, method, &[local_id])?;
                }
            }
        }
        Ok(())
    }

    fn defer(&mut self, model: &str, external_id: i64, force: bool) -> SyncResult<()> {
        let job = NewJob {
            backend: self.backend.name.clone(),
            kind: JobKind::ImportRecord,
            model: model.to_string(),
            record_id: external_id,
            force,
            priority: self.registry.priority_of(model),
            payload: None,
        };
        let enqueued = self.storage.enqueue_job(&job, self.actor)?;
        debug!(model, external_id, job_id = enqueued.job_id, "deferred import");
        Ok(())
    }

    fn sync_mirror(
        &mut self,
        config: &ModelConfig,
        mirror: &MirrorSpec,
        record: &Record,
        local_id: i64,
    ) -> SyncResult<()> {
        let local_parent = self
            .local
            .read(config.name, &[local_id], &[mirror.parent_field])?
            .into_iter()
            .next()
            .and_then(|r| r.get(mirror.parent_field).and_then(many2one_id));

        let parent_mirror = match local_parent {
            Some(parent) => self.find_mirror(mirror, parent)?,
            None => None,
        };

        let mut values = Record::new();
        for (from, to) in mirror.fields {
            if let Some(value) = record.get(*from) {
                values.insert((*to).to_string(), value.clone());
            }
        }
        values.insert(mirror.origin_field.to_string(), Value::from(local_id));
        values.insert(
            mirror.parent_field.to_string(),
            parent_mirror.map_or(Value::Bool(false), Value::from),
        );

        match self.find_mirror(mirror, local_id)? {
            Some(id) => {
                self.local.write(mirror.model, &[id], &values)?;
                debug!(model = mirror.model, id, origin = local_id, "updated mirror");
            }
            None => {
                let id = self.local.create(mirror.model, &values)?;
                info!(model = mirror.model, id, origin = local_id, "created mirror");
            }
        }
        Ok(())
    }

    fn find_mirror(&self, mirror: &MirrorSpec, origin: i64) -> SyncResult<Option<i64>> {
        let domain = Domain::leaf(mirror.origin_field, "=", origin);
        Ok(self
            .local
            .search(mirror.model, &domain, &SearchOptions::limit(1))?
            .first()
            .copied())
    }
}

fn record_id(record: &Record) -> i64 {
    record.get("id").and_then(Value::as_i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::memory::MemoryOdoo;
    use crate::sync::mapper::{MatchKey, Mapper, Rule};
    use crate::sync::registry::{Dependency, ModelConfig};
    use serde_json::json;

    struct Fixture {
        storage: SqliteStorage,
        registry: Registry,
        backend: BackendConfig,
        remote: MemoryOdoo,
        local: MemoryOdoo,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                storage: SqliteStorage::open_memory().unwrap(),
                registry: registry(),
                backend: BackendConfig::example(),
                remote: MemoryOdoo::new(),
                local: MemoryOdoo::new(),
            }
        }

        fn importer(&mut self) -> Importer<'_> {
            Importer::new(
                &mut self.storage,
                &self.registry,
                &self.backend,
                &self.remote,
                &self.local,
                "test",
            )
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(
            ModelConfig::new("product.category").priority(5).importing(ImportSpec {
                mapper: Mapper::new()
                    .direct(&[("name", "name")])
                    .rule(Rule::many2one("parent_id", "parent_id", "product.category")),
                dependencies: vec![Dependency::Many2One {
                    field: "parent_id",
                    model: "product.category",
                }],
                hooks: vec![ImportHook::Mirror(MirrorSpec {
                    model: "product.public.category",
                    origin_field: "origin_categ_id",
                    parent_field: "parent_id",
                    fields: &[("name", "name")],
                })],
                ..ImportSpec::default()
            }),
        );
        registry.register(ModelConfig::new("res.currency").with_inactive().importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[("name", "name"), ("symbol", "symbol")])
                .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
            ..ImportSpec::default()
        }));
        registry.register(ModelConfig::new("sale.order").importing(ImportSpec {
            mapper: Mapper::new().direct(&[("name", "name")]),
            hooks: vec![
                ImportHook::ImportChildren { field: "order_line", model: "sale.order.line" },
                ImportHook::StateTransitions { field: "state" },
            ],
            ..ImportSpec::default()
        }));
        registry.register(ModelConfig::new("sale.order.line").importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[("name", "name")])
                .rule(Rule::many2one("order_id", "order_id", "sale.order")),
            ..ImportSpec::default()
        }));
        registry.register(ModelConfig::new("product.template").priority(15).importing(ImportSpec {
            mapper: Mapper::new().direct(&[("name", "name")]),
            hooks: vec![
                ImportHook::DeferChildren { field: "attribute_line_ids", model: "product.template.attribute.line" },
                ImportHook::LinkOrDefer { field: "default_variant_id", to: "default_variant_id", model: "product.product" },
            ],
            ..ImportSpec::default()
        }));
        registry
    }

    #[test]
    fn test_import_creates_dependency_first_and_once() {
        let mut fx = Fixture::new();
        fx.remote.insert("product.category", 1, json!({"name": "All", "parent_id": false}));
        fx.remote.insert("product.category", 2, json!({"name": "Chairs", "parent_id": [1, "All"]}));

        let outcome = fx.importer().import_record("product.category", 2, false).unwrap();
        assert_eq!(outcome.action, SyncAction::Created);

        assert_eq!(fx.remote.count_calls("read", "product.category"), 2);
        let parent_local = Binder::new(&fx.storage, "main", "product.category")
            .to_internal(1, true)
            .unwrap()
            .unwrap();
        let child_local = outcome.binding.unwrap().local_id;
        assert_eq!(fx.local.get("product.category", child_local).unwrap()["parent_id"], json!(parent_local));

        // second run: both bound, nothing duplicated
        let again = fx.importer().import_record("product.category", 2, true).unwrap();
        assert_eq!(again.action, SyncAction::Updated);
        assert_eq!(fx.local.all("product.category").len(), 2);
        assert_eq!(fx.storage.list_bindings("main", Some("product.category"), None).unwrap().len(), 2);
    }

    #[test]
    fn test_mirror_follows_category_tree() {
        let mut fx = Fixture::new();
        fx.remote.insert("product.category", 1, json!({"name": "All", "parent_id": false}));
        fx.remote.insert("product.category", 2, json!({"name": "Chairs", "parent_id": [1, "All"]}));

        fx.importer().import_record("product.category", 2, false).unwrap();

        let mirrors = fx.local.all("product.public.category");
        assert_eq!(mirrors.len(), 2);
        let root = mirrors.iter().find(|m| m["name"] == json!("All")).unwrap();
        let chairs = mirrors.iter().find(|m| m["name"] == json!("Chairs")).unwrap();
        assert_eq!(chairs["parent_id"], root["id"]);

        fx.remote.insert("product.category", 2, json!({"name": "Seats", "parent_id": [1, "All"]}));
        fx.importer().import_record("product.category", 2, true).unwrap();
        assert_eq!(fx.local.all("product.public.category").len(), 2, "mirror updated in place");
    }

    #[test]
    fn test_up_to_date_records_are_skipped() {
        let mut fx = Fixture::new();
        fx.remote.insert(
            "product.category",
            1,
            json!({"name": "All", "parent_id": false, "write_date": "2020-01-01 00:00:00"}),
        );
        fx.importer().import_record("product.category", 1, false).unwrap();

        let outcome = fx.importer().import_record("product.category", 1, false).unwrap();
        assert_eq!(outcome.action, SyncAction::Skipped(SkipReason::UpToDate));
        assert!(!outcome.wrote());

        let forced = fx.importer().import_record("product.category", 1, true).unwrap();
        assert_eq!(forced.action, SyncAction::Updated);
    }

    #[test]
    fn test_missing_required_reference_writes_nothing() {
        let mut fx = Fixture::new();
        fx.remote.insert("sale.order.line", 5, json!({"name": "Line", "order_id": [9, "SO9"]}));

        let err = fx.importer().import_record("sale.order.line", 5, false).unwrap_err();
        assert!(matches!(err, SyncError::Mapping(_)));
        assert!(fx.local.all("sale.order.line").is_empty());
        assert!(fx.storage.binding_by_external("main", "sale.order.line", 5).unwrap().is_none());
    }

    #[test]
    fn test_parent_cycle_fails_without_local_writes() {
        let mut fx = Fixture::new();
        fx.remote.insert("product.category", 1, json!({"name": "North", "parent_id": [2, "South"]}));
        fx.remote.insert("product.category", 2, json!({"name": "South", "parent_id": [1, "North"]}));

        let err = fx.importer().import_record("product.category", 1, false).unwrap_err();
        assert!(matches!(err, SyncError::Mapping(ref msg) if msg.contains("product.category with remote id 1")));
        assert!(fx.local.all("product.category").is_empty());
        assert!(fx.local.all("product.public.category").is_empty());
        assert_eq!(fx.local.count_calls("create", "product.category"), 0);
        assert!(fx.storage.list_bindings("main", Some("product.category"), None).unwrap().is_empty());
    }

    #[test]
    fn test_vanished_remote_record_resets_binding() {
        let mut fx = Fixture::new();
        fx.remote.insert("product.category", 1, json!({"name": "All", "parent_id": false}));
        let binding = fx.importer().import_record("product.category", 1, false).unwrap().binding.unwrap();

        fx.remote.remove("product.category", 1);
        let err = fx.importer().import_record("product.category", 1, false).unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { id: 1, .. }));
        assert_eq!(fx.storage.get_binding(binding.id).unwrap().unwrap().external_id, 0);
    }

    #[test]
    fn test_natural_key_match_adopts_archived_local_record() {
        let mut fx = Fixture::new();
        fx.local.insert("res.currency", 3, json!({"name": "TRY", "symbol": "TL", "active": false}));
        fx.remote.insert("res.currency", 31, json!({"name": "TRY", "symbol": "₺"}));

        let outcome = fx.importer().import_record("res.currency", 31, false).unwrap();
        assert_eq!(outcome.action, SyncAction::Matched);
        assert_eq!(outcome.binding.unwrap().local_id, 3);
        assert_eq!(fx.local.all("res.currency").len(), 1);
        assert_eq!(fx.local.get("res.currency", 3).unwrap()["symbol"], json!("₺"));
    }

    #[test]
    fn test_sale_order_children_and_state() {
        let mut fx = Fixture::new();
        fx.remote.insert("sale.order", 10, json!({"name": "SO10", "state": "sale", "order_line": [100, 101]}));
        fx.remote.insert("sale.order.line", 100, json!({"name": "A", "order_id": [10, "SO10"]}));
        fx.remote.insert("sale.order.line", 101, json!({"name": "B", "order_id": [10, "SO10"]}));

        let outcome = fx.importer().import_record("sale.order", 10, false).unwrap();
        let order = outcome.binding.unwrap().local_id;

        assert_eq!(fx.local.all("sale.order.line").len(), 2);
        assert_eq!(fx.local.count_calls("action_confirm", "sale.order"), 1);
        assert_eq!(fx.local.get("sale.order", order).unwrap()["state"], json!("sale"));
    }

    #[test]
    fn test_deferred_children_and_default_variant() {
        let mut fx = Fixture::new();
        fx.remote.insert(
            "product.template",
            7,
            json!({"name": "Chair", "attribute_line_ids": [70, 71], "default_variant_id": [700, "Chair"]}),
        );

        fx.importer().import_record("product.template", 7, false).unwrap();

        let jobs = fx.storage.list_jobs(Some("main"), None, None).unwrap();
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().any(|j| j.model == "product.product" && j.record_id == 700));
        assert_eq!(
            jobs.iter().filter(|j| j.model == "product.template.attribute.line").count(),
            2
        );
    }

    #[test]
    fn test_is_up_to_date() {
        let synced = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", SERVER_DATETIME_FORMAT)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert!(is_up_to_date(Some(synced), Some(&json!("2024-05-01 09:59:59"))));
        assert!(is_up_to_date(Some(synced), Some(&json!("2024-05-01 10:00:00.123456"))));
        assert!(!is_up_to_date(Some(synced), Some(&json!("2024-05-01 10:00:01"))));
        assert!(!is_up_to_date(None, Some(&json!("2024-05-01 09:00:00"))));
        assert!(!is_up_to_date(Some(synced), Some(&json!(false))));
    }
}
