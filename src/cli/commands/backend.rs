//! Backend inspection commands.

use super::Globals;
use crate::cli::BackendCommands;
use crate::config::{BackendConfig, Config};
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct BackendSummary<'a> {
    name: &'a str,
    version: &'a str,
    url: &'a str,
    database: &'a str,
    main_record: crate::config::MainRecord,
    default: bool,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    backend: &'a str,
    server_version: String,
    configured_version: &'a str,
    uid: i64,
    version_matches: bool,
}

/// Execute backend commands.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the backend is unknown.
pub fn execute(command: &BackendCommands, globals: &Globals<'_>, json: bool) -> Result<()> {
    let config = globals.load_config()?;
    match command {
        BackendCommands::List => list(&config, json),
        BackendCommands::Show { name } => {
            show(config.backend(name.as_deref().or(globals.backend))?, json)
        }
        BackendCommands::Check { name } => {
            check(config.backend(name.as_deref().or(globals.backend))?, json)
        }
    }
}

fn list(config: &Config, json: bool) -> Result<()> {
    let default = config.default_backend.as_deref();
    let summaries: Vec<BackendSummary<'_>> = config
        .backends
        .iter()
        .map(|b| BackendSummary {
            name: &b.name,
            version: &b.version,
            url: &b.connection.url,
            database: &b.connection.database,
            main_record: b.main_record,
            default: default == Some(b.name.as_str()),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string(&summaries)?);
    } else if summaries.is_empty() {
        println!("No backends configured.");
    } else {
        for s in &summaries {
            let marker = if s.default { "*".green().to_string() } else { " ".to_string() };
            println!(
                "{marker} {} {} {}",
                s.name.bold(),
                format!("v{}", s.version).dimmed(),
                format!("{} / {}", s.url, s.database).dimmed()
            );
        }
    }
    Ok(())
}

/// Copy of the backend without secrets.
fn redacted(backend: &BackendConfig) -> BackendConfig {
    let mut copy = backend.clone();
    if copy.connection.password.is_some() {
        copy.connection.password = Some("********".to_string());
    }
    copy
}

fn show(backend: &BackendConfig, json: bool) -> Result<()> {
    let backend = redacted(backend);
    if json {
        println!("{}", serde_json::to_string(&backend)?);
        return Ok(());
    }

    println!("{}", backend.name.bold());
    println!("  Version:     {}", backend.version);
    println!("  Main record: {:?}", backend.main_record);
    println!("  URL:         {}", backend.connection.url);
    println!("  Database:    {}", backend.connection.database);
    println!("  Username:    {}", backend.connection.username);
    if let Some(lang) = &backend.default_lang {
        println!("  Language:    {lang}");
    }
    if !backend.constants.is_empty() {
        println!();
        println!("  Constants:");
        for (key, value) in &backend.constants {
            println!("    {key} = {value}");
        }
    }
    if !backend.domain_filters.is_empty() {
        println!();
        println!("  Domain filters:");
        for (model, domain) in &backend.domain_filters {
            println!("    {model}: {}", serde_json::to_string(domain)?);
        }
    }
    Ok(())
}

fn check(backend: &BackendConfig, json: bool) -> Result<()> {
    let client = backend.connect()?;
    let server_version = client.server_version()?;
    let version_matches = server_version
        .split('.')
        .next()
        .is_some_and(|major| Some(major) == backend.version.split('.').next());

    if json {
        let output = CheckOutput {
            backend: &backend.name,
            server_version,
            configured_version: &backend.version,
            uid: client.uid(),
            version_matches,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {} (uid {})", "✓".green(), backend.name.bold(), client.uid());
    println!("  Server version: {server_version}");
    if !version_matches {
        println!(
            "  {} configured version is {}; version-dependent mappings follow the config",
            "!".yellow(),
            backend.version
        );
    }
    Ok(())
}
