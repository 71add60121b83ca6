//! Record synchronization between the local database and a remote backend.
//!
//! - **Binder**: identity lookups over the binding table
//! - **Mapper**: declarative field rules between the two representations
//! - **Registry**: per-model configuration (mappers, dependencies, hooks)
//! - **Importer / Exporter**: single-record pipelines with recursive
//!   dependency resolution
//! - **Batch**: domain searches that enqueue one job per record
//!
//! # Example
//!
//! ```ignore
//! use osync::sync::{Importer, Registry};
//!
//! let registry = Registry::builtin();
//! let mut importer = Importer::new(&mut storage, &registry, &backend, &remote, &local, "cli");
//! let outcome = importer.import_record("sale.order", 42, false)?;
//! println!("{}", outcome.action);
//! ```

mod batch;
mod binder;
mod exporter;
mod field_import;
mod hash;
mod html;
mod importer;
pub mod mapper;
pub mod registry;
mod resync;
mod types;

pub use batch::{import_domain, BatchExporter, BatchImporter};
pub use binder::Binder;
pub use exporter::Exporter;
pub use field_import::{import_field, FieldImportRequest, FieldImportStats};
pub use hash::{content_hash, has_changed};
pub use html::clean_html;
pub use importer::{is_up_to_date, Importer};
pub use mapper::{MapContext, MappedRecord, Mapper, Rule};
pub use registry::{ModelConfig, Registry, DEFAULT_PRIORITY};
pub use resync::{plan_resync, ResyncPlan};
pub use types::{
    BatchStats, Direction, SkipReason, SyncAction, SyncError, SyncOutcome, SyncResult,
};
