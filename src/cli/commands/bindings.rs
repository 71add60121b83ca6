//! Binding inspection commands.

use super::{format_ms, Globals};
use crate::cli::BindingsCommands;
use crate::error::{Error, Result};
use crate::storage::events::Event;
use crate::storage::{Binding, SqliteStorage};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct BindingListOutput<'a> {
    backend: &'a str,
    count: usize,
    bindings: Vec<Binding>,
}

#[derive(Serialize)]
struct HistoryEntry {
    event: String,
    actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    created_at: i64,
}

impl From<Event> for HistoryEntry {
    fn from(event: Event) -> Self {
        Self {
            event: event.event_type.to_string(),
            actor: event.actor,
            old_value: event.old_value,
            new_value: event.new_value,
            comment: event.comment,
            created_at: event.created_at,
        }
    }
}

#[derive(Serialize)]
struct BindingShowOutput {
    binding: Binding,
    history: Vec<HistoryEntry>,
}

/// Execute bindings commands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the binding is
/// missing.
pub fn execute(command: &BindingsCommands, globals: &Globals<'_>, json: bool) -> Result<()> {
    let storage = globals.open_storage()?;
    match command {
        BindingsCommands::List { model, limit } => {
            let config = globals.load_config()?;
            let backend = config.backend(globals.backend)?;
            list(&storage, &backend.name, model.as_deref(), *limit, json)
        }
        BindingsCommands::Show { id } => show(&storage, *id, json),
    }
}

fn list(storage: &SqliteStorage, backend: &str, model: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let bindings = storage.list_bindings(backend, model, Some(limit))?;

    if crate::is_csv() {
        println!("id,backend,model,local_id,external_id,sync_date");
        for b in &bindings {
            println!(
                "{},{},{},{},{},{}",
                b.id,
                crate::csv_escape(&b.backend),
                crate::csv_escape(&b.model),
                b.local_id,
                b.external_id,
                b.sync_date.map(format_ms).unwrap_or_default()
            );
        }
    } else if json {
        let output = BindingListOutput {
            backend,
            count: bindings.len(),
            bindings,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if bindings.is_empty() {
        println!("No bindings found.");
    } else {
        println!("Bindings on {} ({} shown):", backend.bold(), bindings.len());
        println!();
        for b in &bindings {
            let external = if b.is_bound() {
                b.external_id.to_string()
            } else {
                "gone".red().to_string()
            };
            let synced = b.sync_date.map_or_else(|| "never".to_string(), format_ms);
            println!(
                "  #{:<6} {:<40} {:>8} <-> {:<8} {}",
                b.id,
                b.model,
                b.local_id,
                external,
                synced.dimmed()
            );
        }
    }

    Ok(())
}

fn show(storage: &SqliteStorage, id: i64, json: bool) -> Result<()> {
    let binding = storage.get_binding(id)?.ok_or(Error::BindingNotFound { id })?;
    let history: Vec<HistoryEntry> = storage
        .binding_history(id, Some(50))?
        .into_iter()
        .map(HistoryEntry::from)
        .collect();

    if json {
        println!("{}", serde_json::to_string(&BindingShowOutput { binding, history })?);
        return Ok(());
    }

    println!("{} #{}", "Binding".bold(), binding.id);
    println!("  Backend:     {}", binding.backend);
    println!("  Model:       {}", binding.model);
    println!("  Local ID:    {}", binding.local_id);
    if binding.is_bound() {
        println!("  External ID: {}", binding.external_id);
    } else {
        println!("  External ID: {}", "0 (remote record gone)".red());
    }
    println!(
        "  Last sync:   {}",
        binding.sync_date.map_or_else(|| "never".to_string(), format_ms)
    );
    if let Some(hash) = &binding.content_hash {
        println!("  Hash:        {}", &hash[..hash.len().min(12)]);
    }

    if !history.is_empty() {
        println!();
        println!("{}", "History".cyan().bold());
        for entry in &history {
            let detail = match (&entry.old_value, &entry.new_value, &entry.comment) {
                (_, _, Some(comment)) => comment.clone(),
                (Some(old), Some(new), None) => format!("{old} -> {new}"),
                _ => String::new(),
            };
            println!(
                "  {} {:<18} {} {}",
                format_ms(entry.created_at).dimmed(),
                entry.event,
                entry.actor.dimmed(),
                detail
            );
        }
    }

    Ok(())
}
