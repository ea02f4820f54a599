use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Represents a workflow-bearing content item in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier
    pub id: Uuid,

    /// Content kind (determines the status graph)
    pub kind: ContentKind,

    /// Current workflow status
    pub status: ContentStatus,

    /// Human-readable title
    pub title: String,

    /// Body text
    pub body: String,

    /// Owning user
    pub owner_id: Uuid,

    /// Category reference
    pub category_id: Option<Uuid>,

    /// Topic reference
    pub topic_id: Option<Uuid>,

    /// Tag references
    pub tag_ids: BTreeSet<Uuid>,

    /// URL-safe identifier, unique within the kind
    pub slug: String,

    /// View counter (public reads only)
    pub view_count: u64,

    /// Pinned to the top of listings
    pub is_pinned: bool,

    /// Editorially featured
    pub is_featured: bool,

    /// Work-request priority (WorkRequest kind only)
    pub priority: Option<Priority>,

    /// Assigned worker (WorkRequest kind only)
    pub assignee_id: Option<Uuid>,

    /// Stale-index marker; cleared only by a successful sync cycle
    pub need_sync: bool,

    /// When the item was published
    pub published_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker; set items are excluded from public reads
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    /// Create a new item in its kind's initial status
    pub fn new(kind: ContentKind, title: String, body: String, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            status: kind.initial_status(),
            title,
            body,
            owner_id,
            category_id: None,
            topic_id: None,
            tag_ids: BTreeSet::new(),
            slug: String::new(),
            view_count: 0,
            is_pinned: false,
            is_featured: false,
            priority: None,
            assignee_id: None,
            // New items have no index document yet
            need_sync: true,
            published_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Apply a status change and mark the row for reindexing
    pub fn set_status(&mut self, status: ContentStatus) {
        self.status = status;
        self.touch();
    }

    /// Record a mutation: bump `updated_at` and set the dirty flag
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.need_sync = true;
    }

    /// Clear the dirty flag. Only the sync scheduler calls this.
    pub fn mark_synced(&mut self) {
        self.need_sync = false;
    }

    /// Soft delete: the row is retained for audit but leaves public reads
    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.touch();
    }

    pub fn increment_view_count(&mut self) {
        self.view_count += 1;
        self.touch();
    }

    pub fn add_tag(&mut self, tag_id: Uuid) {
        self.tag_ids.insert(tag_id);
    }

    pub fn remove_tag(&mut self, tag_id: &Uuid) {
        self.tag_ids.remove(tag_id);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    pub fn is_draft(&self) -> bool {
        self.status == ContentStatus::Draft
    }

    pub fn is_pending_approval(&self) -> bool {
        self.status == ContentStatus::PendingApproval
    }

    /// True when the owner matches the given actor id
    pub fn is_owned_by(&self, actor_id: &Uuid) -> bool {
        self.owner_id == *actor_id
    }
}

/// Content kinds sharing the workflow machinery
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    Question,
    Post,
    WorkRequest,
}

impl ContentKind {
    /// Status a freshly created item of this kind starts in
    pub fn initial_status(&self) -> ContentStatus {
        match self {
            ContentKind::Question | ContentKind::Post => ContentStatus::Draft,
            ContentKind::WorkRequest => ContentStatus::Open,
        }
    }
}

/// Workflow statuses across all kinds; each kind's transition table
/// restricts which of these it can actually reach.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    // Question / Post lifecycle
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Published,
    Archived,
    // WorkRequest lifecycle
    Open,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

/// Work-request priority levels
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Validated command for creating a draft
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContent {
    pub kind: ContentKind,

    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(min = 1))]
    pub body: String,

    pub category_id: Option<Uuid>,

    pub topic_id: Option<Uuid>,

    #[serde(default)]
    pub tag_ids: Vec<Uuid>,

    pub priority: Option<Priority>,
}

/// Validated command for editing fields; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateContent {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    #[validate(length(min = 1))]
    pub body: Option<String>,

    pub category_id: Option<Uuid>,

    pub topic_id: Option<Uuid>,

    pub tag_ids: Option<Vec<Uuid>>,

    pub is_pinned: Option<bool>,

    pub is_featured: Option<bool>,

    pub priority: Option<Priority>,
}
