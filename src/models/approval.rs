use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{ContentItem, ContentKind, ContentStatus};

/// Append-only record of a moderated status transition.
/// Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub id: Uuid,
    pub entity_kind: ContentKind,
    pub entity_id: Uuid,
    pub actor_id: Uuid,
    pub previous_status: ContentStatus,
    pub new_status: ContentStatus,
    pub action: ApprovalAction,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalLogEntry {
    /// Record a moderation action against an item that has already
    /// transitioned to its new status.
    pub fn record(
        item: &ContentItem,
        actor_id: Uuid,
        previous_status: ContentStatus,
        action: ApprovalAction,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind: item.kind,
            entity_id: item.id,
            actor_id,
            previous_status,
            new_status: item.status,
            action,
            comment,
            created_at: Utc::now(),
        }
    }

    pub fn is_approval(&self) -> bool {
        self.action == ApprovalAction::Approve
    }

    pub fn is_rejection(&self) -> bool {
        self.action == ApprovalAction::Reject
    }
}

/// Moderation actions that produce an audit entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Approve,
    Reject,
    RequestChanges,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_captures_transition() {
        let mut item = ContentItem::new(
            ContentKind::Question,
            "Title".to_string(),
            "Body".to_string(),
            Uuid::new_v4(),
        );
        item.status = ContentStatus::PendingApproval;
        let previous = item.status;
        item.set_status(ContentStatus::Approved);

        let actor = Uuid::new_v4();
        let entry = ApprovalLogEntry::record(
            &item,
            actor,
            previous,
            ApprovalAction::Approve,
            Some("ok".to_string()),
        );

        assert_eq!(entry.entity_id, item.id);
        assert_eq!(entry.entity_kind, ContentKind::Question);
        assert_eq!(entry.previous_status, ContentStatus::PendingApproval);
        assert_eq!(entry.new_status, ContentStatus::Approved);
        assert!(entry.is_approval());
        assert!(!entry.is_rejection());
    }
}
