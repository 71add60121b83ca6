//! odoo-sync CLI entry point.

use clap::Parser;
use osync::cli::commands::{self, Globals};
use osync::cli::{Cli, Commands, OutputFormat};
use osync::error::Error;
use osync::sync::FieldImportRequest;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.format == OutputFormat::Csv {
        osync::CSV_OUTPUT.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR --format json OR non-TTY stdout
    let json = cli.json
        || cli.format == OutputFormat::Json
        || (cli.format != OutputFormat::Csv && !std::io::IsTerminal::is_terminal(&std::io::stdout()));

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let globals = Globals {
        db: cli.db.as_deref(),
        config: cli.config.as_deref(),
        backend: cli.backend.as_deref(),
        actor: cli.actor.as_deref(),
    };

    match &cli.command {
        Commands::Init { force } => commands::init::execute(&globals, *force, json),
        Commands::Version => commands::version::execute(json),
        Commands::Status => commands::status::execute(&globals, json),
        Commands::Models => commands::models::execute(json),
        Commands::Backend { command } => commands::backend::execute(command, &globals, json),

        // Single records
        Commands::Import {
            model,
            external_id,
            force,
            defer,
        } => commands::sync::import(&globals, model, *external_id, *force, *defer, json),
        Commands::Export {
            model,
            local_id,
            force,
            defer,
        } => commands::sync::export(&globals, model, *local_id, *force, *defer, json),
        Commands::Resync {
            model,
            binding_id,
            defer,
        } => commands::sync::resync(&globals, model, *binding_id, *defer, json),
        Commands::ImportField {
            model,
            field,
            to_field,
            related_model,
            defer,
        } => {
            let request = FieldImportRequest {
                model: model.clone(),
                field: field.clone(),
                to_field: to_field.clone(),
                related_model: related_model.clone(),
            };
            commands::sync::import_field_command(&globals, &request, *defer, json)
        }

        // Batches and queue
        Commands::Batch { command } => commands::batch::execute(command, &globals, json),
        Commands::Bindings { command } => commands::bindings::execute(command, &globals, json),
        Commands::Jobs { command } => commands::jobs::execute(command, &globals, json),

        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
