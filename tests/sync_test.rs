//! Index synchronization scenarios: dirty selection, partial failures,
//! deletions, and the interval loop guard

mod common;

use std::sync::Arc;

use common::{create_cmd, test_env, FlakyIndex};
use content_workflow_manager::config::SyncConfig;
use content_workflow_manager::models::{ContentKind, ContentStatus};
use content_workflow_manager::search::IndexStore;
use content_workflow_manager::store::ContentStore;
use content_workflow_manager::sync::SyncScheduler;

#[tokio::test]
async fn test_lifecycle_changes_flow_into_index() {
    let env = test_env().await;
    let index = Arc::new(FlakyIndex::default());
    let scheduler = SyncScheduler::new(env.store.clone(), index.clone(), SyncConfig::default());

    let item = env
        .engine
        .create(&env.owner.id, create_cmd(ContentKind::Question, "Sync me"))
        .await
        .unwrap();

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);
    let doc = index.documents.get(&item.id.to_string()).unwrap().clone();
    assert_eq!(doc.status, "DRAFT");

    // Publish and reconcile again: the document follows the row
    env.engine.publish(&item.id, &env.owner.id).await.unwrap();
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);
    let doc = index.documents.get(&item.id.to_string()).unwrap().clone();
    assert_eq!(doc.status, ContentStatus::Published.to_string());

    // Nothing dirty left
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.selected, 0);
}

#[tokio::test]
async fn test_partial_batch_failure_syncs_the_rest() {
    let env = test_env().await;

    let mut ids = Vec::new();
    for i in 0..10 {
        let item = env
            .engine
            .create(
                &env.owner.id,
                create_cmd(ContentKind::Question, &format!("Item {}", i)),
            )
            .await
            .unwrap();
        ids.push(item.id);
    }

    let mut index = FlakyIndex::default();
    index.fail_ids.insert(ids[3].to_string());
    let index = Arc::new(index);
    let scheduler = SyncScheduler::new(env.store.clone(), index.clone(), SyncConfig::default());

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.selected, 10);
    assert_eq!(report.synced, 9);
    assert_eq!(report.failed, 1);
    assert_eq!(index.doc_count().await.unwrap(), 9);

    // Only the failed item remains dirty
    assert_eq!(env.store.count_dirty().await.unwrap(), 1);
    let row = env.store.get_content(&ids[3]).await.unwrap().unwrap();
    assert!(row.need_sync);
}

#[tokio::test]
async fn test_soft_delete_removes_index_document() {
    let env = test_env().await;
    let index = Arc::new(FlakyIndex::default());
    let scheduler = SyncScheduler::new(env.store.clone(), index.clone(), SyncConfig::default());

    let item = env
        .engine
        .create(&env.owner.id, create_cmd(ContentKind::Post, "Short lived"))
        .await
        .unwrap();
    scheduler.run_cycle().await.unwrap();
    assert_eq!(index.doc_count().await.unwrap(), 1);

    env.engine.soft_delete(&item.id, &env.owner.id).await.unwrap();
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(index.doc_count().await.unwrap(), 0);
    assert_eq!(env.store.count_dirty().await.unwrap(), 0);
}

#[tokio::test]
async fn test_index_outage_keeps_everything_dirty() {
    let env = test_env().await;
    let index = Arc::new(FlakyIndex::default());
    index.take_down();
    let scheduler = SyncScheduler::new(env.store.clone(), index.clone(), SyncConfig::default());

    env.engine
        .create(&env.owner.id, create_cmd(ContentKind::Question, "Stuck"))
        .await
        .unwrap();

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.synced, 0);
    assert_eq!(env.store.count_dirty().await.unwrap(), 1);
}

#[tokio::test]
async fn test_interval_loop_start_and_shutdown() {
    let env = test_env().await;
    let index = Arc::new(FlakyIndex::default());
    let config = SyncConfig {
        poll_interval_secs: 1,
        ..Default::default()
    };
    let scheduler = Arc::new(SyncScheduler::new(
        env.store.clone(),
        index.clone(),
        config,
    ));

    env.engine
        .create(&env.owner.id, create_cmd(ContentKind::Question, "Looped"))
        .await
        .unwrap();

    let handle = scheduler.clone().start();
    // First tick fires immediately
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    scheduler.shutdown();
    handle.await.unwrap();

    assert_eq!(index.doc_count().await.unwrap(), 1);
    assert_eq!(env.store.count_dirty().await.unwrap(), 0);
}
