//! schemadocs engine
//!
//! Turns configured databases into a markdown documentation tree:
//! - Accessors and their registry
//! - Accessor runner (one file per accessor per table)
//! - Sync orchestrator
//! - Reconciler for output no longer backed by configuration
//! - Reporter seam for progress and events

pub mod accessors;
pub mod reconcile;
pub mod reporter;
pub mod runner;
pub mod sync;

pub use accessors::{
    accessor_by_name, resolve_accessors, Accessor, ColumnsAccessor, DescriptionAccessor,
    DEFAULT_ACCESSORS,
};
pub use reconcile::{remove_unused_databases, valid_database_folders, ReconcileError, ReconcileReport};
pub use reporter::{RecordedTask, RecordingReporter, Reporter, SyncEvent, TaskId, TracingReporter};
pub use runner::{run_accessors, AccessorFailure, TableOutcome};
pub use sync::{sync_databases, FailureScope, SyncError, SyncFailure, SyncSummary};
