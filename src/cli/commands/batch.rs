//! Batch scheduling commands.

use super::{Globals, Workspace};
use crate::cli::BatchCommands;
use crate::error::{Error, Result};
use crate::rpc::Domain;
use crate::sync::{BatchExporter, BatchImporter, BatchStats, Registry};
use colored::Colorize;

/// Execute batch commands.
///
/// # Errors
///
/// Returns an error if the domain is invalid, the model is unknown or the
/// search fails.
pub fn execute(command: &BatchCommands, globals: &Globals<'_>, json: bool) -> Result<()> {
    let (model, domain, force, import) = match command {
        BatchCommands::Import { model, domain, force } => (model, domain, *force, true),
        BatchCommands::Export { model, domain, force } => (model, domain, *force, false),
    };

    let registry = Registry::builtin();
    registry.get(model)?;
    let domain = parse_domain(domain.as_deref())?;

    let Workspace {
        config,
        mut storage,
        actor,
        ..
    } = globals.workspace()?;
    let backend = config.backend(globals.backend)?;

    let stats = if import {
        let remote = backend.connect()?;
        BatchImporter::new(&mut storage, &registry, backend, &remote, &actor).run(model, &domain, force)?
    } else {
        let local = config.local.connect(None)?;
        BatchExporter::new(&mut storage, &registry, backend, &local, &actor).run(model, &domain, force)?
    };

    print_stats(&stats, import, json)
}

fn parse_domain(text: Option<&str>) -> Result<Domain> {
    match text {
        None => Ok(Domain::new()),
        Some(text) => Domain::parse(text).map_err(|e| Error::InvalidArgument(format!("--domain: {e}"))),
    }
}

fn print_stats(stats: &BatchStats, import: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }

    let direction = if import { "import" } else { "export" };
    println!("Batch {direction} of {}", stats.model.bold());
    println!("  Found:    {}", stats.found);
    println!("  Enqueued: {}", stats.enqueued.to_string().green());
    if stats.duplicates > 0 {
        println!("  Already queued: {}", stats.duplicates);
    }
    if stats.enqueued > 0 {
        println!();
        println!("Run them with: osync jobs run");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domain_errors_mention_domain() {
        assert!(parse_domain(None).unwrap().is_empty());
        assert_eq!(parse_domain(Some(r#"[["active", "=", true]]"#)).unwrap().terms().len(), 1);

        let err = parse_domain(Some("[oops]")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.hint().is_some());
    }
}
