//! Prometheus metrics for the index sync scheduler

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram,
};

/// Sync scheduler metrics collection
pub struct SyncMetrics {
    /// Number of completed sync cycles
    pub cycles_total: Counter,

    /// Number of cycles that ended with an error
    pub cycles_failed: Counter,

    /// Number of ticks skipped because a cycle was still running
    pub ticks_skipped: Counter,

    /// Documents written to the index
    pub items_synced: Counter,

    /// Items whose index write failed
    pub items_failed: Counter,

    /// Documents removed for soft-deleted items
    pub documents_removed: Counter,

    /// Cycle duration in seconds
    pub cycle_duration: Histogram,

    /// Rows currently marked dirty, sampled at cycle start
    pub dirty_backlog: Gauge,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            cycles_total: register_counter!(
                "sync_cycles_total",
                "Total number of completed sync cycles"
            )
            .unwrap(),

            cycles_failed: register_counter!(
                "sync_cycles_failed_total",
                "Total number of sync cycles that ended with an error"
            )
            .unwrap(),

            ticks_skipped: register_counter!(
                "sync_ticks_skipped_total",
                "Ticks skipped because the previous cycle was still running"
            )
            .unwrap(),

            items_synced: register_counter!(
                "sync_items_synced_total",
                "Documents successfully written to the index"
            )
            .unwrap(),

            items_failed: register_counter!(
                "sync_items_failed_total",
                "Items whose index write failed"
            )
            .unwrap(),

            documents_removed: register_counter!(
                "sync_documents_removed_total",
                "Index documents removed for soft-deleted items"
            )
            .unwrap(),

            cycle_duration: register_histogram!(
                "sync_cycle_duration_seconds",
                "Sync cycle duration in seconds",
                vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
            )
            .unwrap(),

            dirty_backlog: register_gauge!(
                "sync_dirty_backlog",
                "Rows currently marked dirty, sampled at cycle start"
            )
            .unwrap(),
        }
    }

    /// Record a completed cycle
    pub fn record_cycle(&self, synced: usize, failed: usize, removed: usize, duration_secs: f64) {
        self.cycles_total.inc();
        self.items_synced.inc_by(synced as f64);
        self.items_failed.inc_by(failed as f64);
        self.documents_removed.inc_by(removed as f64);
        self.cycle_duration.observe(duration_secs);
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Global sync metrics instance
    pub static ref SYNC_METRICS: SyncMetrics = SyncMetrics::new();
}

/// Initialize sync metrics (idempotent)
pub fn init_sync_metrics() {
    lazy_static::initialize(&SYNC_METRICS);
}
