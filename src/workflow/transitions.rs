//! Per-kind status graphs as static adjacency data.
//!
//! Every transition is validated against these tables before any mutation;
//! an edge that is not listed fails with `InvalidTransition` naming both
//! the current and the requested status.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::error::{AppError, Result};
use crate::models::{ContentKind, ContentStatus};

type Edge = (ContentStatus, ContentStatus);

use ContentStatus::*;

/// Question lifecycle: moderated draft-to-publish with a rework loop.
/// DRAFT → PUBLISHED is the direct-publish path for trusted owners.
const QUESTION_EDGES: &[Edge] = &[
    (Draft, PendingApproval),
    (Draft, Published),
    (PendingApproval, Approved),
    (PendingApproval, Rejected),
    (Approved, Published),
    (Rejected, Draft),
];

/// Post lifecycle: same as Question plus a terminal ARCHIVED edge.
const POST_EDGES: &[Edge] = &[
    (Draft, PendingApproval),
    (Draft, Published),
    (PendingApproval, Approved),
    (PendingApproval, Rejected),
    (Approved, Published),
    (Rejected, Draft),
    (Published, Archived),
];

/// WorkRequest lifecycle: linear progress with cancellation from any
/// non-terminal state.
const WORK_REQUEST_EDGES: &[Edge] = &[
    (Open, Assigned),
    (Open, Cancelled),
    (Assigned, InProgress),
    (Assigned, Cancelled),
    (InProgress, Completed),
    (InProgress, Cancelled),
];

static TRANSITION_TABLES: Lazy<HashMap<ContentKind, HashSet<Edge>>> = Lazy::new(|| {
    HashMap::from([
        (ContentKind::Question, QUESTION_EDGES.iter().copied().collect()),
        (ContentKind::Post, POST_EDGES.iter().copied().collect()),
        (
            ContentKind::WorkRequest,
            WORK_REQUEST_EDGES.iter().copied().collect(),
        ),
    ])
});

/// Whether the kind's table contains the edge `from → to`
pub fn is_allowed(kind: ContentKind, from: ContentStatus, to: ContentStatus) -> bool {
    TRANSITION_TABLES
        .get(&kind)
        .map(|edges| edges.contains(&(from, to)))
        .unwrap_or(false)
}

/// Validate an edge, producing the caller-facing error on a miss
pub fn check_transition(kind: ContentKind, from: ContentStatus, to: ContentStatus) -> Result<()> {
    if is_allowed(kind, from, to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// A status with no outgoing edges for the kind
pub fn is_terminal(kind: ContentKind, status: ContentStatus) -> bool {
    TRANSITION_TABLES
        .get(&kind)
        .map(|edges| !edges.iter().any(|(from, _)| *from == status))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_happy_path() {
        let k = ContentKind::Question;
        assert!(is_allowed(k, Draft, PendingApproval));
        assert!(is_allowed(k, PendingApproval, Approved));
        assert!(is_allowed(k, PendingApproval, Rejected));
        assert!(is_allowed(k, Approved, Published));
        assert!(is_allowed(k, Rejected, Draft));
        assert!(is_allowed(k, Draft, Published));
    }

    #[test]
    fn test_published_is_terminal_for_questions() {
        assert!(is_terminal(ContentKind::Question, Published));
        assert!(!is_allowed(ContentKind::Question, Published, Draft));
        assert!(!is_allowed(ContentKind::Question, Published, Archived));
    }

    #[test]
    fn test_post_archive_edge() {
        assert!(is_allowed(ContentKind::Post, Published, Archived));
        assert!(!is_terminal(ContentKind::Post, Published));
        assert!(is_terminal(ContentKind::Post, Archived));
    }

    #[test]
    fn test_work_request_lifecycle() {
        let k = ContentKind::WorkRequest;
        assert!(is_allowed(k, Open, Assigned));
        assert!(is_allowed(k, Assigned, InProgress));
        assert!(is_allowed(k, InProgress, Completed));
        // Cancellation reachable from every non-terminal state
        assert!(is_allowed(k, Open, Cancelled));
        assert!(is_allowed(k, Assigned, Cancelled));
        assert!(is_allowed(k, InProgress, Cancelled));
        // Terminal states
        assert!(is_terminal(k, Completed));
        assert!(is_terminal(k, Cancelled));
        assert!(!is_allowed(k, Completed, Open));
        assert!(!is_allowed(k, Cancelled, Open));
    }

    #[test]
    fn test_edges_do_not_leak_across_kinds() {
        // Work-request states mean nothing to a Question and vice versa
        assert!(!is_allowed(ContentKind::Question, Open, Assigned));
        assert!(!is_allowed(ContentKind::WorkRequest, Draft, PendingApproval));
    }

    #[test]
    fn test_missing_edge_names_both_statuses() {
        let err = check_transition(ContentKind::Question, Published, Draft).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PUBLISHED"));
        assert!(msg.contains("DRAFT"));
    }
}
