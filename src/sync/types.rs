//! Types shared by the sync orchestrators.

use serde::Serialize;

use crate::rpc::RpcError;
use crate::storage::Binding;

/// Which way a record travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote backend to local database.
    Import,
    /// Local database to remote backend.
    Export,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A required reference could not be resolved.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The source record does not exist (any more).
    #[error("Record not found: {model},{id}")]
    RecordNotFound { model: String, id: i64 },

    /// No configuration registered for the model.
    #[error("Model not registered: {0}")]
    UnknownModel(String),

    /// The record cannot be synchronized (e.g. disallowed owner model).
    #[error("Unsupported record: {0}")]
    Unsupported(String),

    /// A remote call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Missing or invalid backend configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        use crate::error::Error;
        match err {
            Error::Rpc(e) => Self::Rpc(e),
            Error::RecordNotFound { model, id } => Self::RecordNotFound { model, id },
            Error::Mapping(msg) => Self::Mapping(msg),
            Error::Unsupported(msg) => Self::Unsupported(msg),
            Error::ModelNotFound { model } => Self::UnknownModel(model),
            Error::Config(msg) => Self::Config(msg),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Why a record was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The binding was synced after the last remote change.
    UpToDate,
    /// The mapped values hash equals the last exported hash.
    Unchanged,
    /// The record is already being synced further up the dependency chain.
    InProgress,
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "reason")]
pub enum SyncAction {
    /// A new target record was created.
    Created,
    /// An existing, unbound target record was adopted.
    Matched,
    /// The bound target record was written.
    Updated,
    /// Nothing was written.
    Skipped(SkipReason),
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Matched => write!(f, "matched"),
            Self::Updated => write!(f, "updated"),
            Self::Skipped(SkipReason::UpToDate) => write!(f, "skipped (up to date)"),
            Self::Skipped(SkipReason::Unchanged) => write!(f, "skipped (unchanged)"),
            Self::Skipped(SkipReason::InProgress) => write!(f, "skipped (in progress)"),
        }
    }
}

/// Result of synchronizing one record.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub model: String,
    pub direction: Direction,
    pub action: SyncAction,
    /// Binding after the sync; `None` when skipped before binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
}

impl SyncOutcome {
    /// Whether anything was written on the target side.
    #[must_use]
    pub fn wrote(&self) -> bool {
        !matches!(self.action, SyncAction::Skipped(_))
    }
}

/// Statistics for a batch scheduling run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchStats {
    pub model: String,
    /// Ids found by the search.
    pub found: usize,
    /// New jobs enqueued.
    pub enqueued: usize,
    /// Ids that already had an identical pending job.
    pub duplicates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_become_database_errors() {
        let err: SyncError = crate::error::Error::JobNotFound { id: 3 }.into();
        assert!(matches!(err, SyncError::Database(_)));

        let err: SyncError = crate::error::Error::RecordNotFound {
            model: "res.partner".into(),
            id: 4,
        }
        .into();
        assert!(matches!(err, SyncError::RecordNotFound { id: 4, .. }));
    }

    #[test]
    fn test_action_display_and_json() {
        assert_eq!(SyncAction::Skipped(SkipReason::UpToDate).to_string(), "skipped (up to date)");
        let json = serde_json::to_value(SyncAction::Skipped(SkipReason::Unchanged)).unwrap();
        assert_eq!(json["action"], "skipped");
        assert_eq!(json["reason"], "unchanged");
        assert_eq!(serde_json::to_value(SyncAction::Created).unwrap()["action"], "created");
    }
}
