//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use content_workflow_manager::models::{
    Actor, ContentKind, ContentStatus, CreateContent, Role,
};
use content_workflow_manager::search::{
    ContentDocument, IndexHit, IndexStore, SearchRequest, SearchResult, UpsertReport,
};
use content_workflow_manager::slug::SlugGenerator;
use content_workflow_manager::store::{ContentStore, InMemoryStore};
use content_workflow_manager::workflow::WorkflowEngine;

pub fn actor(role: Role) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        display_name: format!("{} user", role),
        role,
        is_active: true,
    }
}

pub fn create_cmd(kind: ContentKind, title: &str) -> CreateContent {
    CreateContent {
        kind,
        title: title.to_string(),
        body: format!("Body text for {}", title),
        category_id: None,
        topic_id: None,
        tag_ids: vec![],
        priority: None,
    }
}

/// Engine over an in-memory store, pre-seeded with an owner and a
/// moderator
pub struct TestEnv {
    pub store: Arc<InMemoryStore>,
    pub engine: WorkflowEngine,
    pub owner: Actor,
    pub moderator: Actor,
}

pub async fn test_env() -> TestEnv {
    let store = Arc::new(InMemoryStore::new());
    let owner = actor(Role::User);
    let moderator = actor(Role::Moderator);
    store.upsert_actor(&owner).await.unwrap();
    store.upsert_actor(&moderator).await.unwrap();

    let engine = WorkflowEngine::new(store.clone(), store.clone(), SlugGenerator::default());
    TestEnv {
        store,
        engine,
        owner,
        moderator,
    }
}

/// In-memory [`IndexStore`] with failure and latency injection.
/// Queries do a case-insensitive substring match over title and body.
#[derive(Default)]
pub struct FlakyIndex {
    pub documents: DashMap<String, ContentDocument>,
    pub fail_ids: HashSet<String>,
    pub fail_all: AtomicBool,
    pub query_delay: Option<Duration>,
}

impl FlakyIndex {
    pub fn take_down(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    fn check_up(&self, what: &str) -> SearchResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(content_workflow_manager::search::SearchError::SearchFailed(
                format!("injected {} failure", what),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IndexStore for FlakyIndex {
    async fn upsert_batch(&self, documents: &[ContentDocument]) -> SearchResult<UpsertReport> {
        self.check_up("upsert")?;
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
        self.check_up("delete")?;
        for id in document_ids {
            self.documents.remove(id);
        }
        Ok(document_ids.len())
    }

    async fn query(&self, request: &SearchRequest) -> SearchResult<Vec<IndexHit>> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_up("query")?;

        let needle = request.text.to_lowercase();
        let mut hits = Vec::new();
        for entry in self.documents.iter() {
            let doc = entry.value();
            let kind = ContentKind::from_str(&doc.kind).unwrap();
            let status = ContentStatus::from_str(&doc.status).unwrap();
            if let Some(want) = request.kind {
                if kind != want {
                    continue;
                }
            }
            if let Some(want) = request.status {
                if status != want {
                    continue;
                }
            }
            if !needle.is_empty()
                && !doc.title.to_lowercase().contains(&needle)
                && !doc.body.to_lowercase().contains(&needle)
            {
                continue;
            }
            hits.push(IndexHit {
                id: Uuid::from_str(&doc.id).unwrap(),
                kind,
                status,
                title: doc.title.clone(),
                slug: doc.slug.clone(),
                view_count: doc.view_count,
                updated_at: doc.updated_at,
                score: 1.0,
            });
        }
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn doc_count(&self) -> SearchResult<u64> {
        Ok(self.documents.len() as u64)
    }
}
