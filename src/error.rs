//! Error types for the odoo-sync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for job runners and scripts
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::rpc::RpcError;
use crate::sync::SyncError;

/// Result type alias for odoo-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    BackendNotFound,
    ModelNotFound,
    BindingNotFound,
    JobNotFound,
    RecordNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Synchronization (exit 5)
    MappingError,
    UnsupportedRecord,

    // Remote (exit 6)
    RpcError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::BackendNotFound => "BACKEND_NOT_FOUND",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::BindingNotFound => "BINDING_NOT_FOUND",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MappingError => "MAPPING_ERROR",
            Self::UnsupportedRecord => "UNSUPPORTED_RECORD",
            Self::RpcError => "RPC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::BackendNotFound
            | Self::ModelNotFound
            | Self::BindingNotFound
            | Self::JobNotFound
            | Self::RecordNotFound => 3,
            Self::InvalidArgument => 4,
            Self::MappingError | Self::UnsupportedRecord => 5,
            Self::RpcError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same command later may succeed.
    ///
    /// True for transient remote failures, locked databases and mapping
    /// errors (a missing dependency can be imported in the meantime).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RpcError | Self::DatabaseError | Self::MappingError | Self::InvalidArgument
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in odoo-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `osync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Backend not found: {name}")]
    BackendNotFound {
        name: String,
        /// Names of the configured backends for hint display.
        available: Vec<String>,
    },

    #[error("Model not registered: {model}")]
    ModelNotFound { model: String },

    #[error("Binding not found: {id}")]
    BindingNotFound { id: i64 },

    #[error("Job not found: {id}")]
    JobNotFound { id: i64 },

    #[error("Record not found: {model},{id}")]
    RecordNotFound { model: String, id: i64 },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Unsupported record: {0}")]
    Unsupported(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Mapping(msg) => Self::Mapping(msg),
            SyncError::RecordNotFound { model, id } => Self::RecordNotFound { model, id },
            SyncError::UnknownModel(model) => Self::ModelNotFound { model },
            SyncError::Unsupported(msg) => Self::Unsupported(msg),
            SyncError::Rpc(e) => Self::Rpc(e),
            SyncError::Database(msg) => Self::Other(format!("Database error: {msg}")),
            SyncError::Config(msg) => Self::Config(msg),
        }
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::BackendNotFound { .. } => ErrorCode::BackendNotFound,
            Self::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            Self::BindingNotFound { .. } => ErrorCode::BindingNotFound,
            Self::JobNotFound { .. } => ErrorCode::JobNotFound,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::Mapping(_) => ErrorCode::MappingError,
            Self::Unsupported(_) => ErrorCode::UnsupportedRecord,
            Self::Rpc(_) => ErrorCode::RpcError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `osync init` to create the database and config".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::BackendNotFound { available, .. } => {
                if available.is_empty() {
                    Some("No backends configured. Add one to the config file (see `osync init`).".to_string())
                } else {
                    Some(format!("Configured backends: {}", available.join(", ")))
                }
            }

            Self::ModelNotFound { model } => Some(format!(
                "'{model}' has no sync configuration. Use `osync models` to list supported models."
            )),

            Self::BindingNotFound { id } => Some(format!(
                "No binding with ID {id}. Use `osync bindings list <model>` to see bindings."
            )),

            Self::JobNotFound { id } => Some(format!(
                "No job with ID {id}. Use `osync jobs list` to see queued jobs."
            )),

            Self::Mapping(_) => Some(
                "A referenced record is not bound yet. Import the dependency first \
                 or re-run with --force."
                    .to_string(),
            ),

            Self::Rpc(_) => Some(
                "Check the backend URL and credentials with `osync backend check <name>`.".to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("domain") {
                    Some(
                        "Domains are JSON arrays, e.g. '[[\"name\", \"=\", \"Foo\"], [\"active\", \"=\", true]]'"
                            .to_string(),
                    )
                } else {
                    None
                }
            }

            Self::RecordNotFound { .. }
            | Self::Unsupported(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
