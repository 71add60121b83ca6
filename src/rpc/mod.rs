//! Odoo RPC layer.
//!
//! Both sides of a synchronization are Odoo databases, so both are reached
//! through the same [`OdooRpc`] trait:
//!
//! - [`jsonrpc`] - HTTP client for the `/jsonrpc` endpoint
//! - [`domain`] - Search domain builder and parser
//!
//! Records travel as plain JSON objects ([`Record`]); relational values keep
//! the shapes Odoo returns (`[id, "name"]` for many2one, id lists for x2many)
//! and the helpers below normalize them.

pub mod domain;
pub mod jsonrpc;
#[cfg(test)]
pub mod memory;

pub use domain::Domain;
pub use jsonrpc::JsonRpcClient;

use serde_json::Value;

/// A record as read from or written to Odoo.
pub type Record = serde_json::Map<String, Value>;

/// Result type for RPC operations.
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Errors raised by an RPC transport.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Odoo answered with a JSON-RPC error object.
    #[error("Odoo error on {model}.{method}: {message}")]
    Server {
        model: String,
        method: String,
        message: String,
    },

    /// `common.login` returned `false`.
    #[error("Authentication failed for {username}@{database}")]
    Authentication { database: String, username: String },

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// The blocking runtime could not be created.
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Options for search calls.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub offset: usize,
    pub limit: Option<usize>,
    pub order: Option<String>,
    /// Include archived records (`active_test: false` in the context).
    pub include_inactive: bool,
}

impl SearchOptions {
    /// Options returning at most `limit` records.
    #[must_use]
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Builder-style switch for archived records.
    #[must_use]
    pub fn with_inactive(mut self, include_inactive: bool) -> Self {
        self.include_inactive = include_inactive;
        self
    }
}

/// Model-level operations against one Odoo database.
///
/// Implemented by [`JsonRpcClient`] for real servers and by an in-memory
/// database in tests.
pub trait OdooRpc {
    /// Search ids matching `domain`.
    fn search(&self, model: &str, domain: &Domain, options: &SearchOptions) -> RpcResult<Vec<i64>>;

    /// Read `fields` of the given ids. An empty field list reads every field.
    /// Ids that do not exist are omitted from the result.
    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> RpcResult<Vec<Record>>;

    /// Create a record and return its id.
    fn create(&self, model: &str, values: &Record) -> RpcResult<i64>;

    /// Write `values` on every id.
    fn write(&self, model: &str, ids: &[i64], values: &Record) -> RpcResult<()>;

    /// Call a public model method on `ids` (e.g. `action_confirm`).
    fn call(&self, model: &str, method: &str, ids: &[i64]) -> RpcResult<Value>;

    /// Search then read in one go.
    fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> RpcResult<Vec<Record>> {
        let ids = self.search(model, domain, options)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(model, &ids, fields)
    }
}

/// Extract the id of a many2one value.
///
/// Accepts `[id, "display name"]`, a bare integer, or `false`/`null`.
#[must_use]
pub fn many2one_id(value: &Value) -> Option<i64> {
    match value {
        Value::Array(pair) => pair.first().and_then(Value::as_i64),
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        _ => None,
    }
}

/// Extract the ids of an x2many value.
///
/// Accepts a plain id list as returned by `read`, or a `[[6, 0, ids]]`
/// replace command as produced by mappers.
#[must_use]
pub fn x2many_ids(value: &Value) -> Vec<i64> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    for item in items {
        match item {
            Value::Number(n) => ids.extend(n.as_i64()),
            Value::Array(command) if command.first().and_then(Value::as_i64) == Some(6) => {
                if let Some(Value::Array(inner)) = command.get(2) {
                    ids.extend(inner.iter().filter_map(Value::as_i64));
                }
            }
            _ => {}
        }
    }
    ids
}

/// Build a `[[6, 0, ids]]` replace command.
#[must_use]
pub fn replace_command(ids: &[i64]) -> Value {
    serde_json::json!([[6, 0, ids]])
}

/// Odoo's notion of an empty value: `false`, `null`, `""`, `0` or `[]`.
#[must_use]
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(_) => false,
    }
}
