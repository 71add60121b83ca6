//! odoo-sync - Bind and synchronize records between Odoo databases
//!
//! This crate provides the core functionality for the `osync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Config file, backends and path resolution
//! - [`rpc`] - Odoo JSON-RPC client and the [`rpc::OdooRpc`] trait
//! - [`storage`] - SQLite bindings, job queue and audit events
//! - [`sync`] - Binder, mapper, importer, exporter and batch scheduling
//! - [`models`] - Built-in per-model sync configuration
//! - [`queue`] - Job runner
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod rpc;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};

/// Global CSV output flag (set when `--format csv`).
pub static CSV_OUTPUT: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if CSV output is requested.
#[inline]
pub fn is_csv() -> bool {
    CSV_OUTPUT.load(std::sync::atomic::Ordering::Relaxed)
}

/// Escape a value for CSV output (wrap in quotes if it contains commas, quotes, or newlines).
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
