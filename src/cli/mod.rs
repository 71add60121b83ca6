//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
    /// Comma-separated values
    Csv,
}

pub mod commands;

/// odoo-sync - Bind and synchronize records between Odoo databases
#[derive(Parser, Debug)]
#[command(name = "osync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.odoo-sync/data/osync.db)
    #[arg(long, global = true, env = "OSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Config file path (default: ~/.odoo-sync/config.json)
    #[arg(long, global = true, env = "OSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend to operate on (default: the config's default_backend)
    #[arg(short, long, global = true, env = "OSYNC_BACKEND")]
    pub backend: Option<String>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "OSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and a config template
    Init {
        /// Overwrite an existing database and config
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show bindings and job queue totals
    Status,

    /// List the models that can be synchronized
    Models,

    /// Inspect configured backends
    Backend {
        #[command(subcommand)]
        command: BackendCommands,
    },

    /// Import one remote record into the local database
    Import {
        /// Local model name (e.g. product.template)
        model: String,

        /// Record id on the backend
        external_id: i64,

        /// Import even if the binding is up to date
        #[arg(long)]
        force: bool,

        /// Enqueue a job instead of running now
        #[arg(long)]
        defer: bool,
    },

    /// Export one local record to the backend
    Export {
        /// Local model name (e.g. sale.order)
        model: String,

        /// Local record id
        local_id: i64,

        /// Write even if the mapped values are unchanged
        #[arg(long)]
        force: bool,

        /// Enqueue a job instead of running now
        #[arg(long)]
        defer: bool,
    },

    /// Enqueue jobs for every record matching a domain
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },

    /// Re-synchronize a binding from its authoritative side
    Resync {
        /// Local model name
        model: String,

        /// Binding ID
        binding_id: i64,

        /// Enqueue a job instead of running now
        #[arg(long)]
        defer: bool,
    },

    /// Copy one remote field into a local field for every bound record
    ImportField {
        /// Local model name
        model: String,

        /// Field to read on the backend
        field: String,

        /// Local field to write
        to_field: String,

        /// Resolve the value as a many2one of this model through its bindings
        #[arg(long)]
        related_model: Option<String>,

        /// Enqueue a job instead of running now
        #[arg(long)]
        defer: bool,
    },

    /// Binding inspection
    Bindings {
        #[command(subcommand)]
        command: BindingsCommands,
    },

    /// Job queue management
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand, Debug)]
pub enum BackendCommands {
    /// List configured backends
    List,

    /// Show one backend's settings (passwords redacted)
    Show {
        /// Backend name (default: the selected backend)
        name: Option<String>,
    },

    /// Log in to a backend and report its server version
    Check {
        /// Backend name (default: the selected backend)
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Enqueue imports for remote records matching a domain
    Import {
        /// Local model name
        model: String,

        /// Extra search domain as JSON, e.g. '[["write_date", ">", "2024-01-01"]]'
        #[arg(long)]
        domain: Option<String>,

        /// Import even if bindings are up to date
        #[arg(long)]
        force: bool,
    },

    /// Enqueue exports for local records matching a domain
    Export {
        /// Local model name
        model: String,

        /// Extra search domain as JSON
        #[arg(long)]
        domain: Option<String>,

        /// Write even if mapped values are unchanged
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BindingsCommands {
    /// List bindings of the selected backend
    List {
        /// Filter by model
        model: Option<String>,

        /// Maximum bindings to return
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show a binding and its history
    Show {
        /// Binding ID
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsCommands {
    /// List jobs, newest first
    List {
        /// Filter by state (pending, started, done, failed)
        #[arg(short, long)]
        state: Option<String>,

        /// Only jobs of the selected backend
        #[arg(long)]
        this_backend: bool,

        /// Maximum jobs to return
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show one job
    Show {
        /// Job ID
        id: i64,
    },

    /// Run pending jobs of the selected backend
    Run {
        /// Stop after this many jobs
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Put failed or stuck jobs back into the queue
    Retry {
        /// Job IDs
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}
