//! The dirty-flag sync cycle and its interval driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::search::{ContentDocument, IndexStore};
use crate::store::ContentStore;
use crate::sync::metrics::SYNC_METRICS;

/// Outcome of one reconciliation cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Dirty rows selected this cycle (live and deleted)
    pub selected: usize,

    /// Documents written to the index
    pub synced: usize,

    /// Items that stayed dirty because their index write failed
    pub failed: usize,

    /// Index documents removed for soft-deleted rows
    pub removed: usize,
}

/// Periodically reconciles dirty rows into the index.
///
/// One cycle runs at a time: a tick that fires while the previous cycle
/// is still in flight is skipped, not queued. The dirty flag is cleared
/// per item only when the row's `updated_at` still matches the value
/// captured at selection, so writes landing mid-cycle keep their rows
/// scheduled for the next one.
pub struct SyncScheduler {
    store: Arc<dyn ContentStore>,
    index: Arc<dyn IndexStore>,
    config: SyncConfig,
    in_flight: AtomicBool,
    shutdown: Notify,
}

impl SyncScheduler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        index: Arc<dyn IndexStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            index,
            config,
            in_flight: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Spawn the interval loop. Ticks that would overlap a running cycle
    /// are skipped.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let scheduler = self;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(scheduler.config.poll_interval_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                poll_interval_secs = scheduler.config.poll_interval_secs,
                batch_size = scheduler.config.effective_batch_size(),
                "Sync scheduler started"
            );

            loop {
                tokio::select! {
                    _ = scheduler.shutdown.notified() => break,
                    _ = interval.tick() => {
                        if scheduler
                            .in_flight
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                        {
                            SYNC_METRICS.ticks_skipped.inc();
                            tracing::warn!("Previous sync cycle still running, skipping tick");
                            continue;
                        }

                        match scheduler.run_cycle().await {
                            Ok(report) if report.selected > 0 => {
                                tracing::info!(
                                    selected = report.selected,
                                    synced = report.synced,
                                    failed = report.failed,
                                    removed = report.removed,
                                    "Sync cycle completed"
                                );
                            }
                            Ok(_) => {}
                            Err(err) => {
                                SYNC_METRICS.cycles_failed.inc();
                                tracing::error!(error = %err, "Sync cycle failed");
                            }
                        }

                        scheduler.in_flight.store(false, Ordering::SeqCst);
                    }
                }
            }

            tracing::info!("Sync scheduler stopped");
        })
    }

    /// Request the interval loop to stop after the current cycle
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run one reconciliation cycle. Also callable directly, outside the
    /// interval loop.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let start = std::time::Instant::now();
        let batch = self.config.effective_batch_size();

        SYNC_METRICS
            .dirty_backlog
            .set(self.store.count_dirty().await? as f64);

        let live = self.store.list_dirty(batch).await?;
        let deleted = self.store.list_deleted_dirty(batch).await?;

        let mut report = CycleReport {
            selected: live.len() + deleted.len(),
            ..Default::default()
        };
        if report.selected == 0 {
            return Ok(report);
        }

        // Snapshot `updated_at` per row at selection time; the clear is
        // conditional on it so a concurrent write is never lost.
        let mut snapshots: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        let mut documents = Vec::with_capacity(live.len());

        for item in &live {
            match self.store.load_projection(&item.id).await {
                Ok(Some(source)) => {
                    snapshots.insert(item.id, item.updated_at);
                    documents.push(ContentDocument::from(&source));
                }
                Ok(None) => {
                    // Broken reference (e.g. owner row missing); leave
                    // the flag set and surface the row in the logs
                    report.failed += 1;
                    tracing::warn!(content_id = %item.id, "Projection unavailable, item stays dirty");
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(content_id = %item.id, error = %err, "Projection load failed");
                }
            }
        }

        if !documents.is_empty() {
            match self.index.upsert_batch(&documents).await {
                Ok(upsert) => {
                    for (id_text, reason) in &upsert.failed {
                        report.failed += 1;
                        tracing::warn!(content_id = %id_text, reason = %reason, "Index write failed, item stays dirty");
                    }
                    for id_text in &upsert.succeeded {
                        report.synced += 1;
                        self.clear_flag(id_text, &snapshots).await;
                    }
                }
                Err(err) => {
                    report.failed += documents.len();
                    tracing::error!(error = %err, "Index batch write failed, items stay dirty");
                }
            }
        }

        if !deleted.is_empty() {
            let ids: Vec<String> = deleted.iter().map(|item| item.id.to_string()).collect();
            match self.index.delete_by_ids(&ids).await {
                Ok(_) => {
                    for item in &deleted {
                        report.removed += 1;
                        if let Err(err) =
                            self.store.mark_synced(&item.id, item.updated_at).await
                        {
                            tracing::warn!(content_id = %item.id, error = %err, "Failed to clear dirty flag");
                        }
                    }
                }
                Err(err) => {
                    report.failed += deleted.len();
                    tracing::error!(error = %err, "Index deletion failed, items stay dirty");
                }
            }
        }

        SYNC_METRICS.record_cycle(
            report.synced,
            report.failed,
            report.removed,
            start.elapsed().as_secs_f64(),
        );
        Ok(report)
    }

    async fn clear_flag(&self, id_text: &str, snapshots: &HashMap<Uuid, DateTime<Utc>>) {
        let Ok(id) = Uuid::parse_str(id_text) else {
            tracing::warn!(content_id = %id_text, "Index reported a malformed document id");
            return;
        };
        let Some(seen_updated_at) = snapshots.get(&id) else {
            return;
        };
        match self.store.mark_synced(&id, *seen_updated_at).await {
            Ok(true) => {}
            Ok(false) => {
                // Mutated while the cycle ran; next cycle picks it up
                tracing::debug!(content_id = %id, "Row changed mid-cycle, dirty flag kept");
            }
            Err(err) => {
                tracing::warn!(content_id = %id, error = %err, "Failed to clear dirty flag");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, ContentItem, ContentKind, Role};
    use crate::search::{SearchRequest, SearchResult, UpsertReport};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::collections::HashSet;

    /// In-memory index that can be told to fail specific documents
    #[derive(Default)]
    struct FlakyIndex {
        documents: DashMap<String, ContentDocument>,
        fail_ids: HashSet<String>,
    }

    #[async_trait]
    impl IndexStore for FlakyIndex {
        async fn upsert_batch(
            &self,
            documents: &[ContentDocument],
        ) -> SearchResult<UpsertReport> {
            let mut report = UpsertReport::default();
            for document in documents {
                let id = document.id.clone();
                if self.fail_ids.contains(&id) {
                    report.failed.push((id, "injected failure".to_string()));
                } else {
                    self.documents.insert(id.clone(), document.clone());
                    report.succeeded.push(id);
                }
            }
            Ok(report)
        }

        async fn delete_by_ids(&self, document_ids: &[String]) -> SearchResult<usize> {
            for id in document_ids {
                self.documents.remove(id);
            }
            Ok(document_ids.len())
        }

        async fn query(
            &self,
            _request: &SearchRequest,
        ) -> SearchResult<Vec<crate::search::index::IndexHit>> {
            Ok(Vec::new())
        }

        async fn doc_count(&self) -> SearchResult<u64> {
            Ok(self.documents.len() as u64)
        }
    }

    async fn seeded_store(items: usize) -> (Arc<InMemoryStore>, Vec<ContentItem>) {
        let store = Arc::new(InMemoryStore::new());
        let owner = Actor {
            id: Uuid::new_v4(),
            display_name: "Owner".to_string(),
            role: Role::User,
            is_active: true,
        };
        store.upsert_actor(&owner).await.unwrap();

        let mut created = Vec::new();
        for i in 0..items {
            let item = ContentItem::new(
                ContentKind::Question,
                format!("Question {}", i),
                "Body".to_string(),
                owner.id,
            );
            store.insert_content(&item).await.unwrap();
            created.push(item);
        }
        (store, created)
    }

    fn scheduler(
        store: Arc<InMemoryStore>,
        index: Arc<FlakyIndex>,
    ) -> SyncScheduler {
        SyncScheduler::new(store, index, SyncConfig::default())
    }

    #[tokio::test]
    async fn test_cycle_syncs_dirty_items_and_clears_flags() {
        let (store, items) = seeded_store(3).await;
        let index = Arc::new(FlakyIndex::default());
        let scheduler = scheduler(store.clone(), index.clone());

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.selected, 3);
        assert_eq!(report.synced, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(index.doc_count().await.unwrap(), 3);

        for item in &items {
            let row = store.get_content(&item.id).await.unwrap().unwrap();
            assert!(!row.need_sync);
        }
        assert_eq!(store.count_dirty().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_idle_cycle_selects_nothing() {
        let (store, _) = seeded_store(0).await;
        let index = Arc::new(FlakyIndex::default());
        let scheduler = scheduler(store, index);

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_failed_item_dirty() {
        let (store, items) = seeded_store(10).await;
        let mut index = FlakyIndex::default();
        index.fail_ids.insert(items[4].id.to_string());
        let index = Arc::new(index);
        let scheduler = scheduler(store.clone(), index.clone());

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.selected, 10);
        assert_eq!(report.synced, 9);
        assert_eq!(report.failed, 1);

        // The failed item keeps its flag and is retried next cycle
        let row = store.get_content(&items[4].id).await.unwrap().unwrap();
        assert!(row.need_sync);
        assert_eq!(store.count_dirty().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_item_is_removed_from_index() {
        let (store, items) = seeded_store(1).await;
        let index = Arc::new(FlakyIndex::default());
        let scheduler = scheduler(store.clone(), index.clone());

        // First cycle indexes the item
        scheduler.run_cycle().await.unwrap();
        assert_eq!(index.doc_count().await.unwrap(), 1);

        // Soft-delete and reconcile again
        let mut item = store.get_content(&items[0].id).await.unwrap().unwrap();
        item.soft_delete();
        store.update_content(&item).await.unwrap();

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(index.doc_count().await.unwrap(), 0);
        assert_eq!(store.count_dirty().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mid_cycle_write_keeps_flag() {
        let (store, items) = seeded_store(1).await;
        let index = Arc::new(FlakyIndex::default());
        let scheduler = scheduler(store.clone(), index.clone());

        // Simulate a write landing between selection and flag clearing:
        // the snapshot the scheduler captured no longer matches.
        let stale_snapshot: HashMap<Uuid, DateTime<Utc>> =
            HashMap::from([(items[0].id, items[0].updated_at)]);

        let mut item = store.get_content(&items[0].id).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        item.touch();
        store.update_content(&item).await.unwrap();

        scheduler
            .clear_flag(&items[0].id.to_string(), &stale_snapshot)
            .await;

        let row = store.get_content(&items[0].id).await.unwrap().unwrap();
        assert!(row.need_sync);
    }

    #[tokio::test]
    async fn test_batch_size_limits_selection() {
        let (store, _) = seeded_store(5).await;
        let index = Arc::new(FlakyIndex::default());
        let config = SyncConfig {
            batch_size: 2,
            ..Default::default()
        };
        let scheduler = SyncScheduler::new(store.clone(), index, config);

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(store.count_dirty().await.unwrap(), 3);
    }
}
