//! Per-model sync configuration.
//!
//! Every synchronized model is described by a [`ModelConfig`] table: its
//! mappers, the records it depends on, post-sync hooks and batch filters.
//! The orchestrators receive a [`Registry`] explicitly and look models up
//! by name.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::rpc::{many2one_id, x2many_ids, Domain, Record};

use super::mapper::Mapper;
use super::types::{SyncError, SyncResult};

/// Default queue priority. Lower runs first.
pub const DEFAULT_PRIORITY: i64 = 10;

/// A record the synced record refers to, resolved before mapping.
#[derive(Debug, Clone)]
pub enum Dependency {
    Many2One {
        field: &'static str,
        model: &'static str,
    },
    X2Many {
        field: &'static str,
        model: &'static str,
    },
    /// `(model_field, id_field)` pair naming the owner at runtime. The
    /// owner model must be one of `allowed`.
    Polymorphic {
        model_field: &'static str,
        id_field: &'static str,
        allowed: &'static [&'static str],
    },
}

impl Dependency {
    /// Referenced `(model, id)` pairs of `record`.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` when a polymorphic owner model is not allowed.
    pub fn targets(&self, record: &Record) -> SyncResult<Vec<(&'static str, i64)>> {
        Ok(match self {
            Self::Many2One { field, model } => record
                .get(*field)
                .and_then(many2one_id)
                .map(|id| vec![(*model, id)])
                .unwrap_or_default(),
            Self::X2Many { field, model } => record
                .get(*field)
                .map(x2many_ids)
                .unwrap_or_default()
                .into_iter()
                .map(|id| (*model, id))
                .collect(),
            Self::Polymorphic {
                model_field,
                id_field,
                allowed,
            } => {
                let owner = record.get(*model_field).and_then(Value::as_str).unwrap_or_default();
                let Some(model) = allowed.iter().find(|m| **m == owner) else {
                    return Err(SyncError::Unsupported(format!(
                        "owner model '{owner}' is not one of {}",
                        allowed.join(", ")
                    )));
                };
                record
                    .get(*id_field)
                    .and_then(many2one_id)
                    .map(|id| vec![(*model, id)])
                    .unwrap_or_default()
            }
        })
    }
}

/// A denormalized record kept in sync with an imported one.
#[derive(Debug, Clone)]
pub struct MirrorSpec {
    /// Local model of the mirror records.
    pub model: &'static str,
    /// Mirror field pointing at the imported local record.
    pub origin_field: &'static str,
    /// Parent field, on both the imported model and the mirror.
    pub parent_field: &'static str,
    /// `(remote field, mirror field)` copies.
    pub fields: &'static [(&'static str, &'static str)],
}

/// Secondary work after a record is imported.
#[derive(Debug, Clone)]
pub enum ImportHook {
    /// Import every child record now.
    ImportChildren {
        field: &'static str,
        model: &'static str,
    },
    /// Enqueue one import job per child record.
    DeferChildren {
        field: &'static str,
        model: &'static str,
    },
    /// Import the referenced records, then write the bound ones into the
    /// local many2many `to`.
    Link {
        field: &'static str,
        to: &'static str,
        model: &'static str,
    },
    /// Write the local many2one `to` if the reference is bound, otherwise
    /// enqueue its import.
    LinkOrDefer {
        field: &'static str,
        to: &'static str,
        model: &'static str,
    },
    Mirror(MirrorSpec),
    /// Move the local record to the remote state through its transition
    /// methods.
    StateTransitions { field: &'static str },
}

/// Secondary work after a record is exported.
#[derive(Debug, Clone)]
pub enum ExportHook {
    /// Export every child record after the parent.
    ExportChildren {
        field: &'static str,
        model: &'static str,
    },
    /// Move the remote record to the local state through its transition
    /// methods.
    StateTransitions { field: &'static str },
}

/// Extra restriction applied by batch imports.
#[derive(Debug, Clone)]
pub enum BatchFilter {
    /// `field` must reference an already bound record of `model`.
    BoundIn {
        field: &'static str,
        model: &'static str,
    },
    Static(Domain),
}

#[derive(Debug, Clone, Default)]
pub struct ImportSpec {
    pub mapper: Mapper,
    pub dependencies: Vec<Dependency>,
    pub hooks: Vec<ImportHook>,
    pub batch_filters: Vec<BatchFilter>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportSpec {
    pub mapper: Mapper,
    pub dependencies: Vec<Dependency>,
    pub hooks: Vec<ExportHook>,
}

/// Sync configuration of one model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Local model name, also the binding model.
    pub name: &'static str,
    /// Model name on the remote backend.
    pub remote_model: &'static str,
    pub priority: i64,
    /// Search archived records too.
    pub include_inactive: bool,
    pub import: Option<ImportSpec>,
    pub export: Option<ExportSpec>,
}

impl ModelConfig {
    /// A model with the same name on both sides and default priority.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            remote_model: name,
            priority: DEFAULT_PRIORITY,
            include_inactive: false,
            import: None,
            export: None,
        }
    }

    #[must_use]
    pub fn remote(mut self, remote_model: &'static str) -> Self {
        self.remote_model = remote_model;
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    #[must_use]
    pub fn importing(mut self, spec: ImportSpec) -> Self {
        self.import = Some(spec);
        self
    }

    #[must_use]
    pub fn exporting(mut self, spec: ExportSpec) -> Self {
        self.export = Some(spec);
        self
    }

    /// Import configuration.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for export-only models.
    pub fn import_spec(&self) -> SyncResult<&ImportSpec> {
        self.import
            .as_ref()
            .ok_or_else(|| SyncError::Unsupported(format!("{} cannot be imported", self.name)))
    }

    /// Export configuration.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for import-only models.
    pub fn export_spec(&self) -> SyncResult<&ExportSpec> {
        self.export
            .as_ref()
            .ok_or_else(|| SyncError::Unsupported(format!("{} cannot be exported", self.name)))
    }
}

/// All configured models, by local name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: BTreeMap<&'static str, ModelConfig>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The models shipped with odoo-sync.
    #[must_use]
    pub fn builtin() -> Self {
        crate::models::builtin()
    }

    /// Add or replace a model configuration.
    pub fn register(&mut self, config: ModelConfig) {
        self.models.insert(config.name, config);
    }

    /// Look up a model.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> SyncResult<&ModelConfig> {
        self.models
            .get(name)
            .ok_or_else(|| SyncError::UnknownModel(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Queue priority of `model`, default when unknown.
    #[must_use]
    pub fn priority_of(&self, model: &str) -> i64 {
        self.models.get(model).map_or(DEFAULT_PRIORITY, |c| c.priority)
    }
}

/// Methods moving a sale-like record from `current` to `target` state.
///
/// States are never written directly: confirmation, cancellation and
/// locking have side effects only the state methods trigger.
#[must_use]
pub fn transition_methods(current: &str, target: &str) -> Vec<&'static str> {
    if current == target {
        return Vec::new();
    }

    let mut methods = Vec::new();
    match target {
        "draft" | "sent" => {
            if current != "draft" && current != "sent" {
                if current != "cancel" {
                    methods.push("action_cancel");
                }
                methods.push("action_draft");
            }
        }
        "sale" | "done" => {
            match current {
                "cancel" => methods.extend(["action_draft", "action_confirm"]),
                "draft" | "sent" => methods.push("action_confirm"),
                "done" => methods.push("action_unlock"),
                _ => {}
            }
            if target == "done" && current != "done" {
                methods.push("action_done");
            }
        }
        "cancel" => methods.push("action_cancel"),
        _ => {}
    }
    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_dependency_targets() {
        let source = record(json!({
            "categ_id": [4, "All"],
            "uom_id": false,
            "feature_icon_ids": [1, 2],
        }));

        let categ = Dependency::Many2One { field: "categ_id", model: "product.category" };
        assert_eq!(categ.targets(&source).unwrap(), vec![("product.category", 4)]);

        let uom = Dependency::Many2One { field: "uom_id", model: "uom.uom" };
        assert!(uom.targets(&source).unwrap().is_empty());

        let icons = Dependency::X2Many { field: "feature_icon_ids", model: "feature.icon" };
        assert_eq!(icons.targets(&source).unwrap(), vec![("feature.icon", 1), ("feature.icon", 2)]);
    }

    #[test]
    fn test_polymorphic_owner_guard() {
        let owner = Dependency::Polymorphic {
            model_field: "owner_model",
            id_field: "owner_id",
            allowed: &["product.template", "product.product"],
        };

        let ok = record(json!({"owner_model": "product.product", "owner_id": 9}));
        assert_eq!(owner.targets(&ok).unwrap(), vec![("product.product", 9)]);

        let bad = record(json!({"owner_model": "res.partner", "owner_id": 9}));
        assert!(matches!(owner.targets(&bad), Err(SyncError::Unsupported(_))));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = Registry::new();
        registry.register(ModelConfig::new("res.partner").priority(5));

        assert_eq!(registry.get("res.partner").unwrap().priority, 5);
        assert_eq!(registry.priority_of("res.partner"), 5);
        assert_eq!(registry.priority_of("res.users"), DEFAULT_PRIORITY);
        assert!(matches!(registry.get("stock.move"), Err(SyncError::UnknownModel(_))));
        assert!(registry.get("res.partner").unwrap().import_spec().is_err());
    }

    #[test]
    fn test_transition_methods() {
        assert!(transition_methods("sale", "sale").is_empty());
        assert_eq!(transition_methods("draft", "sale"), vec!["action_confirm"]);
        assert_eq!(transition_methods("cancel", "sale"), vec!["action_draft", "action_confirm"]);
        assert_eq!(transition_methods("draft", "done"), vec!["action_confirm", "action_done"]);
        assert_eq!(transition_methods("sale", "cancel"), vec!["action_cancel"]);
        assert_eq!(transition_methods("sale", "draft"), vec!["action_cancel", "action_draft"]);
        assert_eq!(transition_methods("cancel", "draft"), vec!["action_draft"]);
        assert_eq!(transition_methods("done", "sale"), vec!["action_unlock"]);
        assert!(transition_methods("draft", "unknown").is_empty());
    }
}
