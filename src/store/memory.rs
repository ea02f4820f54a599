use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, ApprovalLogEntry, CategorySummary, ContentItem, ContentKind, TagSummary, TopicSummary,
};
use crate::store::{
    dirty_order, AuditSink, ContentFilter, ContentQuery, ContentStore, ProjectionSource,
};

/// In-memory store (for MVP and testing). Also serves as the audit sink:
/// entries are appended to a write-once log.
#[derive(Clone)]
pub struct InMemoryStore {
    contents: Arc<DashMap<Uuid, ContentItem>>,
    actors: Arc<DashMap<Uuid, Actor>>,
    categories: Arc<DashMap<Uuid, CategorySummary>>,
    topics: Arc<DashMap<Uuid, TopicSummary>>,
    tags: Arc<DashMap<Uuid, TagSummary>>,
    audit_log: Arc<RwLock<Vec<ApprovalLogEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            contents: Arc::new(DashMap::new()),
            actors: Arc::new(DashMap::new()),
            categories: Arc::new(DashMap::new()),
            topics: Arc::new(DashMap::new()),
            tags: Arc::new(DashMap::new()),
            audit_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of the audit log (test inspection; the core never reads it)
    pub fn audit_entries(&self) -> Vec<ApprovalLogEntry> {
        self.audit_log.read().expect("audit log lock poisoned").clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_content(&self, item: &ContentItem) -> Result<()> {
        self.contents.insert(item.id, item.clone());
        tracing::debug!(content_id = %item.id, kind = %item.kind, "Content saved");
        Ok(())
    }

    async fn get_content(&self, id: &Uuid) -> Result<Option<ContentItem>> {
        Ok(self.contents.get(id).map(|entry| entry.clone()))
    }

    async fn update_content(&self, item: &ContentItem) -> Result<()> {
        if self.contents.contains_key(&item.id) {
            self.contents.insert(item.id, item.clone());
            tracing::debug!(content_id = %item.id, status = %item.status, "Content updated");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Content {} not found", item.id)))
        }
    }

    async fn list_dirty(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .contents
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|item| item.need_sync && !item.is_deleted())
            .collect();

        items.sort_by(dirty_order);
        items.truncate(limit);
        Ok(items)
    }

    async fn list_deleted_dirty(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .contents
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|item| item.need_sync && item.is_deleted())
            .collect();

        items.sort_by(dirty_order);
        items.truncate(limit);
        Ok(items)
    }

    async fn mark_synced(&self, id: &Uuid, seen_updated_at: DateTime<Utc>) -> Result<bool> {
        match self.contents.get_mut(id) {
            Some(mut entry) => {
                // A write that landed after the sync snapshot keeps the flag
                if entry.updated_at == seen_updated_at {
                    entry.mark_synced();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Err(AppError::NotFound(format!("Content {} not found", id))),
        }
    }

    async fn count_dirty(&self) -> Result<u64> {
        let count = self
            .contents
            .iter()
            .filter(|entry| entry.value().need_sync)
            .count();
        Ok(count as u64)
    }

    async fn slug_exists(&self, kind: ContentKind, slug: &str) -> Result<bool> {
        Ok(self
            .contents
            .iter()
            .any(|entry| entry.value().kind == kind && entry.value().slug == slug))
    }

    async fn find_by_slug(&self, kind: ContentKind, slug: &str) -> Result<Option<ContentItem>> {
        Ok(self
            .contents
            .iter()
            .find(|entry| entry.value().kind == kind && entry.value().slug == slug)
            .map(|entry| entry.value().clone()))
    }

    async fn list_contents(
        &self,
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .contents
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|item| filter.matches(item))
            .collect();

        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn query_text(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .contents
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|item| query.matches(item))
            .collect();

        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items.truncate(query.limit);
        Ok(items)
    }

    async fn load_projection(&self, id: &Uuid) -> Result<Option<ProjectionSource>> {
        let item = match self.contents.get(id) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        let owner = self
            .actors
            .get(&item.owner_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", item.owner_id)))?;

        let category = item
            .category_id
            .and_then(|cid| self.categories.get(&cid).map(|entry| entry.clone()));
        let topic = item
            .topic_id
            .and_then(|tid| self.topics.get(&tid).map(|entry| entry.clone()));

        let tag_ids: Vec<Uuid> = item.tag_ids.iter().copied().collect();
        let tags = self.get_tags(&tag_ids).await?;

        Ok(Some(ProjectionSource {
            item,
            owner,
            category,
            topic,
            tags,
        }))
    }

    async fn upsert_actor(&self, actor: &Actor) -> Result<()> {
        self.actors.insert(actor.id, actor.clone());
        Ok(())
    }

    async fn get_actor(&self, id: &Uuid) -> Result<Option<Actor>> {
        Ok(self.actors.get(id).map(|entry| entry.clone()))
    }

    async fn upsert_category(&self, category: &CategorySummary) -> Result<()> {
        self.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: &Uuid) -> Result<Option<CategorySummary>> {
        Ok(self.categories.get(id).map(|entry| entry.clone()))
    }

    async fn upsert_topic(&self, topic: &TopicSummary) -> Result<()> {
        self.topics.insert(topic.id, topic.clone());
        Ok(())
    }

    async fn get_topic(&self, id: &Uuid) -> Result<Option<TopicSummary>> {
        Ok(self.topics.get(id).map(|entry| entry.clone()))
    }

    async fn upsert_tag(&self, tag: &TagSummary) -> Result<()> {
        self.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    async fn get_tags(&self, ids: &[Uuid]) -> Result<Vec<TagSummary>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|entry| entry.clone()))
            .collect())
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn append(&self, entry: &ApprovalLogEntry) -> Result<()> {
        self.audit_log
            .write()
            .map_err(|_| AppError::Internal("audit log lock poisoned".to_string()))?
            .push(entry.clone());
        tracing::debug!(
            entity_id = %entry.entity_id,
            action = %entry.action,
            "Approval log entry appended"
        );
        Ok(())
    }
}
