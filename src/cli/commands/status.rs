//! Status command implementation.

use super::Globals;
use crate::error::Result;
use crate::storage::{BindingCount, JobState};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    config: PathBuf,
    /// Config problem, if the file cannot be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    config_error: Option<String>,
    backends: Vec<String>,
    default_backend: Option<String>,
    bindings: Vec<BindingCount>,
    jobs: JobBreakdown,
}

#[derive(Serialize, Default)]
struct JobBreakdown {
    pending: usize,
    started: usize,
    done: usize,
    failed: usize,
}

/// Execute status command.
///
/// Reports binding totals per backend and model and the job queue by
/// state. A broken config file is reported, not raised, so the database
/// can still be inspected.
pub fn execute(globals: &Globals<'_>, json: bool) -> Result<()> {
    let storage = globals.open_storage()?;
    let database = globals.db_path()?;
    let config = globals.config_path()?;

    let (backends, default_backend, config_error) = match globals.load_config() {
        Ok(c) => (c.backend_names(), c.default_backend, None),
        Err(e) => (Vec::new(), None, Some(e.to_string())),
    };

    let bindings = storage.binding_counts()?;
    let mut jobs = JobBreakdown::default();
    for (state, count) in storage.job_counts()? {
        match state {
            JobState::Pending => jobs.pending = count,
            JobState::Started => jobs.started = count,
            JobState::Done => jobs.done = count,
            JobState::Failed => jobs.failed = count,
        }
    }

    if json {
        let output = StatusOutput {
            database,
            config,
            config_error,
            backends,
            default_backend,
            bindings,
            jobs,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "odoo-sync Status".bold());
    println!("================");
    println!();
    println!("Database: {}", database.display());
    println!("Config:   {}", config.display());
    if let Some(err) = &config_error {
        println!("  {} {err}", "!".red());
    }
    if !backends.is_empty() {
        let default = default_backend.as_deref().unwrap_or_default();
        let names: Vec<String> = backends
            .iter()
            .map(|b| if b == default { format!("{b} (default)") } else { b.clone() })
            .collect();
        println!("Backends: {}", names.join(", "));
    }
    println!();

    if bindings.is_empty() {
        println!("No bindings yet.");
    } else {
        println!("{}", "Bindings".cyan().bold());
        for count in &bindings {
            println!(
                "  {:<12} {:<45} {:>6} {}",
                count.backend,
                count.model,
                count.bound,
                format!("/ {}", count.total).dimmed()
            );
        }
    }
    println!();

    println!("{}", "Jobs".cyan().bold());
    println!("  Pending: {}", jobs.pending);
    println!("  Started: {}", jobs.started);
    println!("  Done:    {}", jobs.done);
    if jobs.failed > 0 {
        println!("  Failed:  {}", jobs.failed.to_string().red());
        println!();
        println!("Inspect with: osync jobs list --state failed");
    } else {
        println!("  Failed:  0");
    }

    Ok(())
}
