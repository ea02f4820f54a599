use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, ApprovalLogEntry, CategorySummary, ContentItem, ContentKind, TagSummary, TopicSummary,
};
use crate::store::{
    dirty_order, AuditSink, ContentFilter, ContentQuery, ContentStore, ProjectionSource,
};

/// Persistent store using the Sled embedded database.
/// One tree per concern; rows are bincode-encoded.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    contents_tree: sled::Tree,
    slugs_tree: sled::Tree,
    audit_tree: sled::Tree,
    actors_tree: sled::Tree,
    categories_tree: sled::Tree,
    topics_tree: sled::Tree,
    tags_tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)
            .map_err(|e| AppError::Database(format!("Failed to open Sled database: {}", e)))?;

        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| AppError::Database(format!("Failed to open {} tree: {}", name, e)))
        };

        let contents_tree = open_tree("contents")?;
        let slugs_tree = open_tree("slugs")?;
        let audit_tree = open_tree("approval_log")?;
        let actors_tree = open_tree("actors")?;
        let categories_tree = open_tree("categories")?;
        let topics_tree = open_tree("topics")?;
        let tags_tree = open_tree("tags")?;

        tracing::info!("Initialized Sled store at {:?}", path_ref);

        Ok(Self {
            db: Arc::new(db),
            contents_tree,
            slugs_tree,
            audit_tree,
            actors_tree,
            categories_tree,
            topics_tree,
            tags_tree,
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize row: {}", e)))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize row: {}", e)))
    }

    fn id_key(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    fn slug_key(kind: ContentKind, slug: &str) -> Vec<u8> {
        format!("{}:{}", kind, slug).into_bytes()
    }

    fn put<T: Serialize>(tree: &sled::Tree, key: Vec<u8>, value: &T) -> Result<()> {
        tree.insert(key, Self::encode(value)?)
            .map_err(|e| AppError::Database(format!("Failed to write row: {}", e)))?;
        Ok(())
    }

    fn get_row<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>> {
        match tree
            .get(key)
            .map_err(|e| AppError::Database(format!("Failed to read row: {}", e)))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Maintain the kind-scoped slug index across inserts and updates
    fn reindex_slug(&self, previous: Option<&ContentItem>, item: &ContentItem) -> Result<()> {
        if let Some(prev) = previous {
            if !prev.slug.is_empty() && prev.slug != item.slug {
                self.slugs_tree
                    .remove(Self::slug_key(prev.kind, &prev.slug))
                    .map_err(|e| {
                        AppError::Database(format!("Failed to remove slug index: {}", e))
                    })?;
            }
        }
        if !item.slug.is_empty() {
            self.slugs_tree
                .insert(Self::slug_key(item.kind, &item.slug), Self::id_key(&item.id))
                .map_err(|e| AppError::Database(format!("Failed to update slug index: {}", e)))?;
        }
        Ok(())
    }

    fn scan_contents<F>(&self, mut keep: F) -> Result<Vec<ContentItem>>
    where
        F: FnMut(&ContentItem) -> bool,
    {
        let mut items = Vec::new();
        for result in self.contents_tree.iter() {
            let (_, value) = result
                .map_err(|e| AppError::Database(format!("Failed to iterate contents: {}", e)))?;
            let item: ContentItem = Self::decode(&value)?;
            if keep(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn flush_contents(&self) -> Result<()> {
        self.contents_tree
            .flush()
            .map_err(|e| AppError::Database(format!("Failed to flush contents tree: {}", e)))?;
        Ok(())
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Database(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SledStore {
    async fn insert_content(&self, item: &ContentItem) -> Result<()> {
        Self::put(&self.contents_tree, Self::id_key(&item.id), item)?;
        self.reindex_slug(None, item)?;
        self.flush_contents()?;
        tracing::debug!(content_id = %item.id, kind = %item.kind, "Content saved to Sled");
        Ok(())
    }

    async fn get_content(&self, id: &Uuid) -> Result<Option<ContentItem>> {
        Self::get_row(&self.contents_tree, &Self::id_key(id))
    }

    async fn update_content(&self, item: &ContentItem) -> Result<()> {
        let previous: ContentItem = Self::get_row(&self.contents_tree, &Self::id_key(&item.id))?
            .ok_or_else(|| AppError::NotFound(format!("Content {} not found", item.id)))?;

        Self::put(&self.contents_tree, Self::id_key(&item.id), item)?;
        self.reindex_slug(Some(&previous), item)?;
        self.flush_contents()?;
        tracing::debug!(content_id = %item.id, status = %item.status, "Content updated in Sled");
        Ok(())
    }

    async fn list_dirty(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let mut items = self.scan_contents(|item| item.need_sync && !item.is_deleted())?;
        items.sort_by(dirty_order);
        items.truncate(limit);
        Ok(items)
    }

    async fn list_deleted_dirty(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let mut items = self.scan_contents(|item| item.need_sync && item.is_deleted())?;
        items.sort_by(dirty_order);
        items.truncate(limit);
        Ok(items)
    }

    async fn mark_synced(&self, id: &Uuid, seen_updated_at: DateTime<Utc>) -> Result<bool> {
        let mut item: ContentItem = Self::get_row(&self.contents_tree, &Self::id_key(id))?
            .ok_or_else(|| AppError::NotFound(format!("Content {} not found", id)))?;

        if item.updated_at != seen_updated_at {
            return Ok(false);
        }

        item.mark_synced();
        Self::put(&self.contents_tree, Self::id_key(id), &item)?;
        self.flush_contents()?;
        Ok(true)
    }

    async fn count_dirty(&self) -> Result<u64> {
        let items = self.scan_contents(|item| item.need_sync)?;
        Ok(items.len() as u64)
    }

    async fn slug_exists(&self, kind: ContentKind, slug: &str) -> Result<bool> {
        self.slugs_tree
            .contains_key(Self::slug_key(kind, slug))
            .map_err(|e| AppError::Database(format!("Failed to query slug index: {}", e)))
    }

    async fn find_by_slug(&self, kind: ContentKind, slug: &str) -> Result<Option<ContentItem>> {
        match self
            .slugs_tree
            .get(Self::slug_key(kind, slug))
            .map_err(|e| AppError::Database(format!("Failed to query slug index: {}", e)))?
        {
            Some(id_bytes) => {
                let id = Uuid::from_slice(&id_bytes)
                    .map_err(|e| AppError::Serialization(format!("Corrupt slug index: {}", e)))?;
                self.get_content(&id).await
            }
            None => Ok(None),
        }
    }

    async fn list_contents(
        &self,
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut items = self.scan_contents(|item| filter.matches(item))?;
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn query_text(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        let mut items = self.scan_contents(|item| query.matches(item))?;
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items.truncate(query.limit);
        Ok(items)
    }

    async fn load_projection(&self, id: &Uuid) -> Result<Option<ProjectionSource>> {
        let item = match self.get_content(id).await? {
            Some(item) => item,
            None => return Ok(None),
        };

        let owner: Actor = Self::get_row(&self.actors_tree, &Self::id_key(&item.owner_id))?
            .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", item.owner_id)))?;

        let category = match item.category_id {
            Some(cid) => Self::get_row(&self.categories_tree, &Self::id_key(&cid))?,
            None => None,
        };
        let topic = match item.topic_id {
            Some(tid) => Self::get_row(&self.topics_tree, &Self::id_key(&tid))?,
            None => None,
        };

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
        Self::put(&self.actors_tree, Self::id_key(&actor.id), actor)
    }

    async fn get_actor(&self, id: &Uuid) -> Result<Option<Actor>> {
        Self::get_row(&self.actors_tree, &Self::id_key(id))
    }

    async fn upsert_category(&self, category: &CategorySummary) -> Result<()> {
        Self::put(&self.categories_tree, Self::id_key(&category.id), category)
    }

    async fn get_category(&self, id: &Uuid) -> Result<Option<CategorySummary>> {
        Self::get_row(&self.categories_tree, &Self::id_key(id))
    }

    async fn upsert_topic(&self, topic: &TopicSummary) -> Result<()> {
        Self::put(&self.topics_tree, Self::id_key(&topic.id), topic)
    }

    async fn get_topic(&self, id: &Uuid) -> Result<Option<TopicSummary>> {
        Self::get_row(&self.topics_tree, &Self::id_key(id))
    }

    async fn upsert_tag(&self, tag: &TagSummary) -> Result<()> {
        Self::put(&self.tags_tree, Self::id_key(&tag.id), tag)
    }

    async fn get_tags(&self, ids: &[Uuid]) -> Result<Vec<TagSummary>> {
        let mut tags = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tag) = Self::get_row::<TagSummary>(&self.tags_tree, &Self::id_key(id))? {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}

#[async_trait]
impl AuditSink for SledStore {
    async fn append(&self, entry: &ApprovalLogEntry) -> Result<()> {
        Self::put(&self.audit_tree, Self::id_key(&entry.id), entry)?;
        self.audit_tree
            .flush()
            .map_err(|e| AppError::Database(format!("Failed to flush approval log: {}", e)))?;
        tracing::debug!(
            entity_id = %entry.entity_id,
            action = %entry.action,
            "Approval log entry appended to Sled"
        );
        Ok(())
    }
}
