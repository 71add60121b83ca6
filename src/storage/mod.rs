//! SQLite storage layer for odoo-sync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for binding and job history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Bindings and job queue storage

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::{
    Binding, BindingCount, Enqueued, Job, JobKind, JobState, MutationContext, NewJob,
    SqliteStorage,
};
