//! Deferred job execution.
//!
//! Jobs are persisted by [`crate::storage::SqliteStorage`]; the [`Worker`]
//! drains the pending ones of a backend in priority order, one at a time.

mod worker;

pub use worker::{JobReport, Worker, WorkerStats};
