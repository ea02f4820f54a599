pub mod factory;
pub mod memory;
pub mod sled_store;

pub use factory::create_store;
pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Actor, ApprovalLogEntry, CategorySummary, ContentItem, ContentKind, ContentStatus, TagSummary,
    TopicSummary,
};

/// System-of-record contract for content and its reference data.
///
/// The dirty flag (`need_sync`) is owned by the rows in this store: every
/// mutating write sets it, and only [`ContentStore::mark_synced`] clears
/// it — guarded by the `updated_at` snapshot so a concurrent write is
/// never silently lost.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a new content item
    async fn insert_content(&self, item: &ContentItem) -> Result<()>;

    /// Point read by id (including soft-deleted rows)
    async fn get_content(&self, id: &Uuid) -> Result<Option<ContentItem>>;

    /// Overwrite an existing content item
    async fn update_content(&self, item: &ContentItem) -> Result<()>;

    /// Non-deleted rows with the dirty flag set, oldest-updated first,
    /// limited to `limit`
    async fn list_dirty(&self, limit: usize) -> Result<Vec<ContentItem>>;

    /// Soft-deleted rows whose index document has not been removed yet
    async fn list_deleted_dirty(&self, limit: usize) -> Result<Vec<ContentItem>>;

    /// Clear the dirty flag iff the row has not been mutated since
    /// `seen_updated_at`. Returns whether the flag was cleared.
    async fn mark_synced(&self, id: &Uuid, seen_updated_at: DateTime<Utc>) -> Result<bool>;

    /// Number of rows currently marked dirty (deleted rows included)
    async fn count_dirty(&self) -> Result<u64>;

    /// Whether a slug is already taken within the kind
    async fn slug_exists(&self, kind: ContentKind, slug: &str) -> Result<bool>;

    /// Lookup by slug within the kind
    async fn find_by_slug(&self, kind: ContentKind, slug: &str) -> Result<Option<ContentItem>>;

    /// List rows matching a filter, newest-updated first
    async fn list_contents(&self, filter: &ContentFilter, limit: usize)
        -> Result<Vec<ContentItem>>;

    /// Relational text lookup for the search gateway: case-insensitive
    /// substring match over title and body, non-deleted rows only,
    /// ordered by update recency (the store's native ranking)
    async fn query_text(&self, query: &ContentQuery) -> Result<Vec<ContentItem>>;

    /// Fully-populated projection for one item: the row plus shallow
    /// owner/category/topic/tag summaries, loaded explicitly (no lazy
    /// traversal)
    async fn load_projection(&self, id: &Uuid) -> Result<Option<ProjectionSource>>;

    // Reference data

    async fn upsert_actor(&self, actor: &Actor) -> Result<()>;
    async fn get_actor(&self, id: &Uuid) -> Result<Option<Actor>>;

    async fn upsert_category(&self, category: &CategorySummary) -> Result<()>;
    async fn get_category(&self, id: &Uuid) -> Result<Option<CategorySummary>>;

    async fn upsert_topic(&self, topic: &TopicSummary) -> Result<()>;
    async fn get_topic(&self, id: &Uuid) -> Result<Option<TopicSummary>>;

    async fn upsert_tag(&self, tag: &TagSummary) -> Result<()>;
    /// Resolve a set of tag ids; missing ids are simply absent from the result
    async fn get_tags(&self, ids: &[Uuid]) -> Result<Vec<TagSummary>>;
}

/// Append-only audit sink for moderated transitions. Entries are written
/// once and never read back by this core.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &ApprovalLogEntry) -> Result<()>;
}

/// Filter for listing content rows
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub kinds: Vec<ContentKind>,
    pub statuses: Vec<ContentStatus>,
    pub owner_id: Option<Uuid>,
    pub include_deleted: bool,
}

impl ContentFilter {
    pub fn matches(&self, item: &ContentItem) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&item.kind);
        let status_match = self.statuses.is_empty() || self.statuses.contains(&item.status);
        let owner_match = self
            .owner_id
            .map(|owner| item.owner_id == owner)
            .unwrap_or(true);
        let deleted_match = self.include_deleted || !item.is_deleted();
        kind_match && status_match && owner_match && deleted_match
    }
}

/// Text query against the system-of-record
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub text: String,
    pub kind: Option<ContentKind>,
    pub status: Option<ContentStatus>,
    pub limit: usize,
}

impl ContentQuery {
    pub fn matches(&self, item: &ContentItem) -> bool {
        if item.is_deleted() {
            return false;
        }
        if let Some(kind) = self.kind {
            if item.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        let needle = self.text.to_lowercase();
        needle.is_empty()
            || item.title.to_lowercase().contains(&needle)
            || item.body.to_lowercase().contains(&needle)
    }
}

/// Everything the index projection needs, loaded in one explicit query
#[derive(Debug, Clone)]
pub struct ProjectionSource {
    pub item: ContentItem,
    pub owner: Actor,
    pub category: Option<CategorySummary>,
    pub topic: Option<TopicSummary>,
    pub tags: Vec<TagSummary>,
}

/// Stable ordering for dirty selection: oldest update first, id as the
/// tiebreaker so batches are deterministic.
pub(crate) fn dirty_order(a: &ContentItem, b: &ContentItem) -> std::cmp::Ordering {
    a.updated_at
        .cmp(&b.updated_at)
        .then_with(|| a.id.cmp(&b.id))
}
