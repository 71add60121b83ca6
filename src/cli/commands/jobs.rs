//! Job queue commands.

use super::{format_ms, truncate, Connections, Globals, Workspace};
use crate::cli::JobsCommands;
use crate::error::{Error, Result};
use crate::queue::{Worker, WorkerStats};
use crate::storage::{Job, JobState, SqliteStorage};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct JobListOutput {
    count: usize,
    jobs: Vec<Job>,
}

#[derive(Serialize)]
struct RetryOutput {
    requeued: Vec<i64>,
}

/// Execute jobs commands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, a job is missing or
/// a job state transition is not allowed.
pub fn execute(command: &JobsCommands, globals: &Globals<'_>, json: bool) -> Result<()> {
    match command {
        JobsCommands::List {
            state,
            this_backend,
            limit,
        } => {
            let state = state
                .as_deref()
                .map(str::parse::<JobState>)
                .transpose()
                .map_err(Error::InvalidArgument)?;
            let storage = globals.open_storage()?;
            let backend = if *this_backend {
                let config = globals.load_config()?;
                Some(config.backend(globals.backend)?.name.clone())
            } else {
                None
            };
            list(&storage, backend.as_deref(), state, *limit, json)
        }
        JobsCommands::Show { id } => show(&globals.open_storage()?, *id, json),
        JobsCommands::Run { limit } => run(globals, *limit, json),
        JobsCommands::Retry { ids } => retry(globals, ids, json),
    }
}

fn state_label(state: JobState) -> String {
    match state {
        JobState::Pending => state.as_str().yellow().to_string(),
        JobState::Started => state.as_str().cyan().to_string(),
        JobState::Done => state.as_str().green().to_string(),
        JobState::Failed => state.as_str().red().to_string(),
    }
}

fn list(
    storage: &SqliteStorage,
    backend: Option<&str>,
    state: Option<JobState>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let jobs = storage.list_jobs(backend, state, Some(limit))?;

    if crate::is_csv() {
        println!("id,backend,kind,model,record_id,state,priority,attempts,error");
        for j in &jobs {
            println!(
                "{},{},{},{},{},{},{},{},{}",
                j.id,
                crate::csv_escape(&j.backend),
                j.kind,
                crate::csv_escape(&j.model),
                j.record_id,
                j.state,
                j.priority,
                j.attempts,
                crate::csv_escape(j.error.as_deref().unwrap_or_default())
            );
        }
    } else if json {
        let output = JobListOutput {
            count: jobs.len(),
            jobs,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if jobs.is_empty() {
        println!("No jobs found.");
    } else {
        println!("Jobs ({} shown):", jobs.len());
        println!();
        for j in &jobs {
            println!(
                "  #{:<6} {:<8} {:<14} {} {} {}",
                j.id,
                state_label(j.state),
                j.kind.as_str(),
                j.model,
                j.record_id,
                format!("[{} p{}]", j.backend, j.priority).dimmed()
            );
            if let Some(error) = &j.error {
                println!("          {}", truncate(error, 100).red());
            }
        }
    }

    Ok(())
}

fn show(storage: &SqliteStorage, id: i64, json: bool) -> Result<()> {
    let job = storage.get_job(id)?.ok_or(Error::JobNotFound { id })?;

    if json {
        println!("{}", serde_json::to_string(&job)?);
        return Ok(());
    }

    println!("{} #{} {}", "Job".bold(), job.id, job.uuid.dimmed());
    println!("  State:    {}", state_label(job.state));
    println!("  Backend:  {}", job.backend);
    println!("  Kind:     {}", job.kind);
    println!("  Model:    {}", job.model);
    println!("  Record:   {}", job.record_id);
    println!("  Force:    {}", job.force);
    println!("  Priority: {}", job.priority);
    println!("  Attempts: {}", job.attempts);
    println!("  Created:  {}", format_ms(job.created_at));
    if let Some(started) = job.started_at {
        println!("  Started:  {}", format_ms(started));
    }
    if let Some(finished) = job.finished_at {
        println!("  Finished: {}", format_ms(finished));
    }
    if let Some(payload) = &job.payload {
        println!("  Payload:  {payload}");
    }
    if let Some(result) = &job.result {
        println!("  Result:   {result}");
    }
    if let Some(error) = &job.error {
        println!("  Error:    {}", error.red());
    }
    Ok(())
}

fn run(globals: &Globals<'_>, limit: Option<usize>, json: bool) -> Result<()> {
    let Workspace {
        config,
        mut storage,
        registry,
        actor,
    } = globals.workspace()?;
    let backend = config.backend(globals.backend)?;

    if storage.next_pending_job(Some(&backend.name))?.is_none() {
        print_run(&WorkerStats::default(), &backend.name, json)?;
        return Ok(());
    }

    let conn = Connections::open(&config, backend)?;
    let stats = Worker::new(&mut storage, &registry, backend, &conn.remote, &conn.local, &actor).run(limit)?;
    print_run(&stats, &backend.name, json)
}

fn print_run(stats: &WorkerStats, backend: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }

    if stats.jobs.is_empty() {
        println!("No pending jobs for {backend}.");
        return Ok(());
    }

    for report in &stats.jobs {
        let detail = report.error.as_deref().map(|e| truncate(e, 100)).unwrap_or_default();
        println!(
            "  #{:<6} {:<8} {} {} {} {}",
            report.job_id,
            state_label(report.state),
            report.kind.as_str(),
            report.model,
            report.record_id,
            detail.red()
        );
    }
    println!();
    println!("Done: {}  Failed: {}", stats.done.to_string().green(), stats.failed);
    if stats.failed > 0 {
        println!("Retry with: osync jobs retry <id>...");
    }
    Ok(())
}

fn retry(globals: &Globals<'_>, ids: &[i64], json: bool) -> Result<()> {
    let mut storage = globals.open_storage()?;
    let actor = globals.actor();

    let mut requeued = Vec::with_capacity(ids.len());
    for &id in ids {
        storage.requeue_job(id, &actor)?;
        requeued.push(id);
    }

    if json {
        println!("{}", serde_json::to_string(&RetryOutput { requeued })?);
    } else {
        for id in &requeued {
            println!("Requeued job #{id}");
        }
    }
    Ok(())
}
