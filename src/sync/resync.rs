//! Re-synchronize one binding from its authoritative side.

use serde::Serialize;

use crate::config::{BackendConfig, MainRecord};
use crate::rpc::OdooRpc;
use crate::storage::{Binding, JobKind, NewJob, SqliteStorage};

use super::exporter::Exporter;
use super::importer::Importer;
use super::registry::{ModelConfig, Registry};
use super::types::{SyncError, SyncOutcome, SyncResult};

/// What a resync of one binding does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "direction")]
pub enum ResyncPlan {
    /// Forced export of the local record.
    Export { local_id: i64 },
    /// Forced import of the remote record.
    Import { external_id: i64 },
}

/// Decide how to resync `binding`.
///
/// Exports when the backend treats the local side as main and the model can
/// be exported; every other case is a forced import.
///
/// # Errors
///
/// Returns `Unsupported` when an import is needed but the model is
/// export-only, or the binding has lost its external id.
pub fn plan_resync(config: &ModelConfig, backend: &BackendConfig, binding: &Binding) -> SyncResult<ResyncPlan> {
    if backend.main_record == MainRecord::Local && config.export.is_some() {
        return Ok(ResyncPlan::Export {
            local_id: binding.local_id,
        });
    }

    config.import_spec()?;
    if !binding.is_bound() {
        return Err(SyncError::Unsupported(format!(
            "binding {} of {} has no external id to import from",
            binding.id, config.name
        )));
    }
    Ok(ResyncPlan::Import {
        external_id: binding.external_id,
    })
}

impl ResyncPlan {
    /// The equivalent deferred job.
    #[must_use]
    pub fn job(&self, config: &ModelConfig, backend: &BackendConfig) -> NewJob {
        let (kind, record_id) = match *self {
            Self::Export { local_id } => (JobKind::ExportRecord, local_id),
            Self::Import { external_id } => (JobKind::ImportRecord, external_id),
        };
        NewJob {
            backend: backend.name.clone(),
            kind,
            model: config.name.to_string(),
            record_id,
            force: true,
            priority: config.priority,
            payload: None,
        }
    }

    /// Run the plan now.
    ///
    /// # Errors
    ///
    /// Propagates the import or export error.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        storage: &mut SqliteStorage,
        registry: &Registry,
        backend: &BackendConfig,
        remote: &dyn OdooRpc,
        local: &dyn OdooRpc,
        model: &str,
        actor: &str,
    ) -> SyncResult<SyncOutcome> {
        match *self {
            Self::Export { local_id } => {
                Exporter::new(storage, registry, backend, remote, local, actor).export_record(model, local_id, true)
            }
            Self::Import { external_id } => {
                Importer::new(storage, registry, backend, remote, local, actor).import_record(model, external_id, true)
            }
        }
    }
}
