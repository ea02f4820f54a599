//! Orchestrates content mutations: permission checks, transition-table
//! validation, slug maintenance, dirty-flag upkeep, and the moderation
//! audit trail.
//!
//! Every mutating operation runs the same sequence: load the row, check
//! the actor's relationship to it, validate the status edge, apply the
//! change, write back. Moderated transitions additionally append an
//! audit entry; when the append fails, the prior row is restored so the
//! trail never misses a recorded transition.

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, ApprovalAction, ApprovalLogEntry, ContentItem, ContentStatus, CreateContent,
    UpdateContent,
};
use crate::slug::SlugGenerator;
use crate::store::{AuditSink, ContentFilter, ContentStore};
use crate::workflow::transitions::check_transition;

/// Core service coordinating the content lifecycle
pub struct WorkflowEngine {
    store: Arc<dyn ContentStore>,
    audit: Arc<dyn AuditSink>,
    slugs: SlugGenerator,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ContentStore>,
        audit: Arc<dyn AuditSink>,
        slugs: SlugGenerator,
    ) -> Self {
        Self {
            store,
            audit,
            slugs,
        }
    }

    /// Create a draft owned by the actor. References must resolve;
    /// the slug is derived from the title and made unique within the kind.
    pub async fn create(&self, actor_id: &Uuid, cmd: CreateContent) -> Result<ContentItem> {
        cmd.validate()?;
        let actor = self.require_actor(actor_id).await?;

        if let Some(category_id) = &cmd.category_id {
            self.store
                .get_category(category_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))?;
        }
        if let Some(topic_id) = &cmd.topic_id {
            self.store
                .get_topic(topic_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", topic_id)))?;
        }
        self.require_tags(&cmd.tag_ids).await?;

        let mut item = ContentItem::new(cmd.kind, cmd.title, cmd.body, actor.id);
        item.category_id = cmd.category_id;
        item.topic_id = cmd.topic_id;
        item.tag_ids = cmd.tag_ids.into_iter().collect();
        item.priority = cmd.priority;
        item.slug = self
            .slugs
            .unique_slug(self.store.as_ref(), item.kind, &item.title, &item.id)
            .await?;

        self.store.insert_content(&item).await?;
        tracing::info!(
            content_id = %item.id,
            kind = %item.kind,
            slug = %item.slug,
            "Content created"
        );
        Ok(item)
    }

    /// Edit fields on an item. Owner or moderator only. A title change
    /// regenerates the slug; any accepted edit re-dirties the row.
    pub async fn update(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        cmd: UpdateContent,
    ) -> Result<ContentItem> {
        cmd.validate()?;
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "edit")?;

        if let Some(title) = cmd.title {
            if title != item.title {
                item.title = title;
                item.slug = self
                    .slugs
                    .unique_slug(self.store.as_ref(), item.kind, &item.title, &item.id)
                    .await?;
            }
        }
        if let Some(body) = cmd.body {
            item.body = body;
        }
        if let Some(category_id) = cmd.category_id {
            self.store
                .get_category(&category_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))?;
            item.category_id = Some(category_id);
        }
        if let Some(topic_id) = cmd.topic_id {
            self.store
                .get_topic(&topic_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", topic_id)))?;
            item.topic_id = Some(topic_id);
        }
        if let Some(tag_ids) = cmd.tag_ids {
            self.require_tags(&tag_ids).await?;
            item.tag_ids = tag_ids.into_iter().collect();
        }
        // Pin/feature flags are moderator-only curation controls
        if cmd.is_pinned.is_some() || cmd.is_featured.is_some() {
            if !actor.is_moderator() {
                return Err(AppError::Unauthorized(
                    "Only moderators can pin or feature content".to_string(),
                ));
            }
            if let Some(pinned) = cmd.is_pinned {
                item.is_pinned = pinned;
            }
            if let Some(featured) = cmd.is_featured {
                item.is_featured = featured;
            }
        }
        if let Some(priority) = cmd.priority {
            item.priority = Some(priority);
        }

        item.touch();
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Content updated");
        Ok(item)
    }

    /// Soft delete: row is retained but leaves public reads; the dirty
    /// flag stays set so the next sync cycle removes the index document.
    pub async fn soft_delete(&self, id: &Uuid, actor_id: &Uuid) -> Result<()> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "delete")?;

        item.soft_delete();
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Content soft-deleted");
        Ok(())
    }

    /// Owner submits a draft for moderation. No audit entry; the trail
    /// records moderator decisions only.
    pub async fn submit_for_approval(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;

        if !item.is_owned_by(&actor.id) {
            return Err(AppError::Unauthorized(
                "Only the owner can submit content for approval".to_string(),
            ));
        }
        check_transition(item.kind, item.status, ContentStatus::PendingApproval)?;

        item.set_status(ContentStatus::PendingApproval);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Content submitted for approval");
        Ok(item)
    }

    /// Moderator approves a pending item. Appends an audit entry
    /// atomically with the status write.
    pub async fn approve(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        comment: Option<String>,
    ) -> Result<ContentItem> {
        self.moderate(
            id,
            actor_id,
            ContentStatus::Approved,
            ApprovalAction::Approve,
            comment,
        )
        .await
    }

    /// Moderator rejects a pending item. The reason is mandatory and is
    /// preserved in the audit entry.
    pub async fn reject(&self, id: &Uuid, actor_id: &Uuid, reason: String) -> Result<ContentItem> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "Rejection reason must not be empty".to_string(),
            ));
        }
        self.moderate(
            id,
            actor_id,
            ContentStatus::Rejected,
            ApprovalAction::Reject,
            Some(reason),
        )
        .await
    }

    /// Moderator sends a pending item back for rework. Lands in REJECTED
    /// like a rejection (the owner resumes editing via REJECTED → DRAFT)
    /// but the audit action distinguishes the intent.
    pub async fn request_changes(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        comment: String,
    ) -> Result<ContentItem> {
        if comment.trim().is_empty() {
            return Err(AppError::Validation(
                "Change-request comment must not be empty".to_string(),
            ));
        }
        self.moderate(
            id,
            actor_id,
            ContentStatus::Rejected,
            ApprovalAction::RequestChanges,
            Some(comment),
        )
        .await
    }

    /// Owner resumes editing a rejected item
    pub async fn resume_draft(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;

        if !item.is_owned_by(&actor.id) {
            return Err(AppError::Unauthorized(
                "Only the owner can resume a rejected draft".to_string(),
            ));
        }
        check_transition(item.kind, item.status, ContentStatus::Draft)?;

        item.set_status(ContentStatus::Draft);
        self.store.update_content(&item).await?;
        Ok(item)
    }

    /// Publish from APPROVED, or directly from DRAFT. Owner or moderator.
    pub async fn publish(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "publish")?;
        check_transition(item.kind, item.status, ContentStatus::Published)?;

        item.set_status(ContentStatus::Published);
        item.published_at = Some(item.updated_at);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Content published");
        Ok(item)
    }

    /// Archive a published post
    pub async fn archive(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "archive")?;
        check_transition(item.kind, item.status, ContentStatus::Archived)?;

        item.set_status(ContentStatus::Archived);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Content archived");
        Ok(item)
    }

    /// Assign an open work request to a worker. Moderator-or-above.
    pub async fn assign(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        assignee_id: &Uuid,
    ) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        if !actor.is_moderator() {
            return Err(AppError::Unauthorized(
                "Only moderators can assign work requests".to_string(),
            ));
        }
        let assignee = self.require_actor(assignee_id).await?;
        let mut item = self.load_active(id).await?;
        check_transition(item.kind, item.status, ContentStatus::Assigned)?;

        item.assignee_id = Some(assignee.id);
        item.set_status(ContentStatus::Assigned);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, assignee_id = %assignee.id, "Work request assigned");
        Ok(item)
    }

    /// Assignee starts work
    pub async fn start_progress(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_assignee(&item, &actor)?;
        check_transition(item.kind, item.status, ContentStatus::InProgress)?;

        item.set_status(ContentStatus::InProgress);
        self.store.update_content(&item).await?;
        Ok(item)
    }

    /// Assignee completes work
    pub async fn complete(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_assignee(&item, &actor)?;
        check_transition(item.kind, item.status, ContentStatus::Completed)?;

        item.set_status(ContentStatus::Completed);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Work request completed");
        Ok(item)
    }

    /// Cancel a work request from any non-terminal state. Owner or
    /// moderator.
    pub async fn cancel(&self, id: &Uuid, actor_id: &Uuid) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "cancel")?;
        check_transition(item.kind, item.status, ContentStatus::Cancelled)?;

        item.set_status(ContentStatus::Cancelled);
        self.store.update_content(&item).await?;
        tracing::info!(content_id = %item.id, "Work request cancelled");
        Ok(item)
    }

    /// Attach tags. Owner or moderator; every tag id must resolve.
    pub async fn add_tags(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        tag_ids: &[Uuid],
    ) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "tag")?;
        self.require_tags(tag_ids).await?;

        for tag_id in tag_ids {
            item.add_tag(*tag_id);
        }
        item.touch();
        self.store.update_content(&item).await?;
        Ok(item)
    }

    /// Detach tags. Missing ids are ignored.
    pub async fn remove_tags(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        tag_ids: &[Uuid],
    ) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        let mut item = self.load_active(id).await?;
        self.require_owner_or_moderator(&item, &actor, "tag")?;

        for tag_id in tag_ids {
            item.remove_tag(tag_id);
        }
        item.touch();
        self.store.update_content(&item).await?;
        Ok(item)
    }

    /// Count a public read. Published items only; the bump re-dirties the
    /// row so the counter reaches the index on the next cycle.
    pub async fn increment_view_count(&self, id: &Uuid) -> Result<u64> {
        let mut item = self.load_active(id).await?;
        if !item.is_published() {
            return Err(AppError::Validation(
                "View counts apply to published content only".to_string(),
            ));
        }
        item.increment_view_count();
        self.store.update_content(&item).await?;
        Ok(item.view_count)
    }

    /// Point read, excluding soft-deleted rows
    pub async fn get(&self, id: &Uuid) -> Result<ContentItem> {
        self.load_active(id).await
    }

    /// Moderation queue: items awaiting review, newest-updated first.
    /// Moderator-or-above.
    pub async fn pending_queue(
        &self,
        actor_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let actor = self.require_actor(actor_id).await?;
        if !actor.is_moderator() {
            return Err(AppError::Unauthorized(
                "Only moderators can view the moderation queue".to_string(),
            ));
        }
        let filter = ContentFilter {
            statuses: vec![ContentStatus::PendingApproval],
            ..Default::default()
        };
        self.store.list_contents(&filter, limit).await
    }

    /// Everything an actor owns, newest-updated first. Drafts and
    /// rejected items included; soft-deleted rows are not.
    pub async fn list_owned(&self, owner_id: &Uuid, limit: usize) -> Result<Vec<ContentItem>> {
        let filter = ContentFilter {
            owner_id: Some(*owner_id),
            ..Default::default()
        };
        self.store.list_contents(&filter, limit).await
    }

    // Internal helpers

    /// Shared path for moderator decisions on pending items: validate the
    /// edge, write the status, append the audit entry. If the append
    /// fails, the prior row is restored so status and trail stay in step.
    async fn moderate(
        &self,
        id: &Uuid,
        actor_id: &Uuid,
        to: ContentStatus,
        action: ApprovalAction,
        comment: Option<String>,
    ) -> Result<ContentItem> {
        let actor = self.require_actor(actor_id).await?;
        if !actor.is_moderator() {
            return Err(AppError::Unauthorized(format!(
                "Role {} cannot moderate content",
                actor.role
            )));
        }

        let mut item = self.load_active(id).await?;
        check_transition(item.kind, item.status, to)?;

        let snapshot = item.clone();
        let previous = item.status;
        item.set_status(to);
        self.store.update_content(&item).await?;

        let entry = ApprovalLogEntry::record(&item, actor.id, previous, action, comment);
        if let Err(err) = self.audit.append(&entry).await {
            // Roll the row back; a transition without its audit entry
            // must not survive.
            tracing::error!(
                content_id = %item.id,
                error = %err,
                "Audit append failed, reverting status write"
            );
            self.store.update_content(&snapshot).await?;
            return Err(err);
        }

        tracing::info!(
            content_id = %item.id,
            action = %action,
            from = %previous,
            to = %item.status,
            moderator_id = %actor.id,
            "Moderation recorded"
        );
        Ok(item)
    }

    async fn load_active(&self, id: &Uuid) -> Result<ContentItem> {
        let item = self
            .store
            .get_content(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Content {} not found", id)))?;
        if item.is_deleted() {
            return Err(AppError::NotFound(format!("Content {} not found", id)));
        }
        Ok(item)
    }

    async fn require_actor(&self, id: &Uuid) -> Result<Actor> {
        let actor = self
            .store
            .get_actor(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", id)))?;
        if !actor.is_active {
            return Err(AppError::Unauthorized(
                "Actor account is deactivated".to_string(),
            ));
        }
        Ok(actor)
    }

    async fn require_tags(&self, tag_ids: &[Uuid]) -> Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let found = self.store.get_tags(tag_ids).await?;
        if found.len() != tag_ids.len() {
            return Err(AppError::NotFound(
                "One or more tags do not exist".to_string(),
            ));
        }
        Ok(())
    }

    fn require_owner_or_moderator(
        &self,
        item: &ContentItem,
        actor: &Actor,
        verb: &str,
    ) -> Result<()> {
        if item.is_owned_by(&actor.id) || actor.is_moderator() {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "Only the owner or a moderator can {} this content",
                verb
            )))
        }
    }

    fn require_assignee(&self, item: &ContentItem, actor: &Actor) -> Result<()> {
        if item.assignee_id == Some(actor.id) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Only the assignee can act on this work request".to_string(),
            ))
        }
    }
}
