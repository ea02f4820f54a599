//! Background reconciliation between the system-of-record and the index.
//!
//! Rows carry a dirty flag set on every mutation; each cycle selects the
//! oldest dirty rows, projects them into index documents, writes them,
//! and clears the flag only when the row was not mutated again while the
//! cycle ran. Soft-deleted rows are removed from the index instead.

pub mod metrics;
pub mod scheduler;

pub use metrics::{init_sync_metrics, SyncMetrics, SYNC_METRICS};
pub use scheduler::{CycleReport, SyncScheduler};
