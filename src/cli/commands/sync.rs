//! Single-record sync commands: import, export, resync and import-field.
//!
//! Each command either runs immediately against both databases or, with
//! `--defer`, enqueues a job for `osync jobs run`.

use super::{Connections, Globals, Workspace};
use crate::error::{Error, Result};
use crate::storage::{Enqueued, JobKind, NewJob};
use crate::sync::{
    import_field, plan_resync, Direction, Exporter, FieldImportRequest, FieldImportStats, Importer,
    Registry, SyncOutcome,
};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct DeferredOutput<'a> {
    deferred: bool,
    backend: &'a str,
    kind: JobKind,
    model: &'a str,
    record_id: i64,
    #[serde(flatten)]
    enqueued: Enqueued,
}

fn print_deferred(job: &NewJob, enqueued: Enqueued, json: bool) -> Result<()> {
    if json {
        let output = DeferredOutput {
            deferred: true,
            backend: &job.backend,
            kind: job.kind,
            model: &job.model,
            record_id: job.record_id,
            enqueued,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if enqueued.duplicate {
        println!(
            "Already queued: job #{} ({} {} {})",
            enqueued.job_id, job.kind, job.model, job.record_id
        );
    } else {
        println!(
            "Queued job #{} ({} {} {})",
            enqueued.job_id, job.kind, job.model, job.record_id
        );
        println!("Run it with: osync jobs run");
    }
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    let verb = match outcome.direction {
        Direction::Import => "Imported",
        Direction::Export => "Exported",
    };
    let action = if outcome.wrote() {
        outcome.action.to_string().green()
    } else {
        outcome.action.to_string().dimmed()
    };
    println!("{verb} {}: {action}", outcome.model.bold());
    if let Some(binding) = &outcome.binding {
        println!(
            "  Binding #{}: local {} <-> external {}",
            binding.id, binding.local_id, binding.external_id
        );
    }
    Ok(())
}

/// Reject unknown models before touching config or database.
fn check_model(model: &str) -> Result<Registry> {
    let registry = Registry::builtin();
    registry.get(model)?;
    Ok(registry)
}

/// Execute `osync import`.
///
/// # Errors
///
/// Returns an error if the model is unknown, the backend cannot be reached
/// or the import fails.
pub fn import(
    globals: &Globals<'_>,
    model: &str,
    external_id: i64,
    force: bool,
    defer: bool,
    json: bool,
) -> Result<()> {
    let registry = check_model(model)?;
    if registry.get(model)?.import.is_none() {
        return Err(Error::Unsupported(format!("{model} cannot be imported")));
    }
    let Workspace {
        config,
        mut storage,
        actor,
        ..
    } = globals.workspace()?;
    let backend = config.backend(globals.backend)?;

    if defer {
        let job = NewJob {
            backend: backend.name.clone(),
            kind: JobKind::ImportRecord,
            model: model.to_string(),
            record_id: external_id,
            force,
            priority: registry.priority_of(model),
            payload: None,
        };
        let enqueued = storage.enqueue_job(&job, &actor)?;
        return print_deferred(&job, enqueued, json);
    }

    let conn = Connections::open(&config, backend)?;
    let outcome = Importer::new(&mut storage, &registry, backend, &conn.remote, &conn.local, &actor)
        .import_record(model, external_id, force)?;
    info!(model, external_id, action = %outcome.action, "import finished");
    print_outcome(&outcome, json)
}

/// Execute `osync export`.
///
/// # Errors
///
/// Returns an error if the model is unknown or not exportable, the backend
/// cannot be reached or the export fails.
pub fn export(
    globals: &Globals<'_>,
    model: &str,
    local_id: i64,
    force: bool,
    defer: bool,
    json: bool,
) -> Result<()> {
    let registry = check_model(model)?;
    if registry.get(model)?.export.is_none() {
        return Err(Error::Unsupported(format!("{model} cannot be exported")));
    }
    let Workspace {
        config,
        mut storage,
        actor,
        ..
    } = globals.workspace()?;
    let backend = config.backend(globals.backend)?;

    if defer {
        let job = NewJob {
            backend: backend.name.clone(),
            kind: JobKind::ExportRecord,
            model: model.to_string(),
            record_id: local_id,
            force,
            priority: registry.priority_of(model),
            payload: None,
        };
        let enqueued = storage.enqueue_job(&job, &actor)?;
        return print_deferred(&job, enqueued, json);
    }

    let conn = Connections::open(&config, backend)?;
    let outcome = Exporter::new(&mut storage, &registry, backend, &conn.remote, &conn.local, &actor)
        .export_record(model, local_id, force)?;
    info!(model, local_id, action = %outcome.action, "export finished");
    print_outcome(&outcome, json)
}

/// Execute `osync resync`.
///
/// The binding's own backend is used, whatever `--backend` says.
///
/// # Errors
///
/// Returns `BindingNotFound`, `InvalidArgument` if the binding belongs to
/// another model, or the sync error.
pub fn resync(globals: &Globals<'_>, model: &str, binding_id: i64, defer: bool, json: bool) -> Result<()> {
    let registry = check_model(model)?;
    let Workspace {
        config,
        mut storage,
        actor,
        ..
    } = globals.workspace()?;

    let binding = storage
        .get_binding(binding_id)?
        .ok_or(Error::BindingNotFound { id: binding_id })?;
    if binding.model != model {
        return Err(Error::InvalidArgument(format!(
            "binding {binding_id} belongs to {}, not {model}",
            binding.model
        )));
    }
    let backend = config.backend(Some(binding.backend.as_str()))?;
    let model_config = registry.get(model)?;
    let plan = plan_resync(model_config, backend, &binding)?;

    if defer {
        let job = plan.job(model_config, backend);
        let enqueued = storage.enqueue_job(&job, &actor)?;
        return print_deferred(&job, enqueued, json);
    }

    let conn = Connections::open(&config, backend)?;
    let outcome = plan.execute(
        &mut storage,
        &registry,
        backend,
        &conn.remote,
        &conn.local,
        model,
        &actor,
    )?;
    print_outcome(&outcome, json)
}

/// Execute `osync import-field`.
///
/// # Errors
///
/// Returns an error if a model is unknown, the backend cannot be reached or
/// a read/write fails.
pub fn import_field_command(
    globals: &Globals<'_>,
    request: &FieldImportRequest,
    defer: bool,
    json: bool,
) -> Result<()> {
    let registry = check_model(&request.model)?;
    if let Some(related) = &request.related_model {
        registry.get(related)?;
    }
    let Workspace {
        config,
        mut storage,
        actor,
        ..
    } = globals.workspace()?;
    let backend = config.backend(globals.backend)?;

    if defer {
        let job = NewJob {
            backend: backend.name.clone(),
            kind: JobKind::ImportField,
            model: request.model.clone(),
            record_id: 0,
            force: false,
            priority: registry.priority_of(&request.model),
            payload: Some(serde_json::to_string(request)?),
        };
        let enqueued = storage.enqueue_job(&job, &actor)?;
        return print_deferred(&job, enqueued, json);
    }

    let conn = Connections::open(&config, backend)?;
    let stats = import_field(&storage, &registry, backend, &conn.remote, &conn.local, request)?;
    print_field_stats(request, &stats, json)
}

fn print_field_stats(request: &FieldImportRequest, stats: &FieldImportStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }

    println!(
        "{}.{} -> {}",
        request.model.bold(),
        request.field,
        request.to_field
    );
    println!("  Bound records: {}", stats.bindings);
    println!("  Written:       {}", stats.written.to_string().green());
    println!("  Skipped:       {}", stats.skipped);
    Ok(())
}
