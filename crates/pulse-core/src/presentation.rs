//! How an activity looks in a client feed.
//!
//! [`ActivityType::presentation`] is an exhaustive `match`, so adding a
//! variant to [`ActivityType`] does not compile until it has an icon,
//! priority and color here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityEvent, ActivityType};
use crate::ids::{ActivityId, ProjectId, TaskId, UserId};

/// How prominently a client should surface an activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background noise (edits, syncs).
    Low,
    /// Regular feed item.
    Normal,
    /// Worth a toast (completions, assignments, deletions).
    High,
}

/// Display attributes for one activity type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Presentation {
    /// Icon name from the client icon set.
    pub icon: &'static str,
    /// Feed prominence.
    pub priority: Priority,
    /// Hex accent color.
    pub color: &'static str,
}

const fn p(icon: &'static str, priority: Priority, color: &'static str) -> Presentation {
    Presentation {
        icon,
        priority,
        color,
    }
}

impl ActivityType {
    /// Display attributes for this activity type.
    pub const fn presentation(self) -> Presentation {
        use Priority::{High, Low, Normal};
        match self {
            Self::ProjectCreated => p("folder-plus", Normal, "#2563eb"),
            Self::ProjectUpdated => p("folder-pen", Low, "#64748b"),
            Self::ProjectArchived => p("archive", Normal, "#6b7280"),
            Self::MemberAdded => p("user-plus", Normal, "#0d9488"),
            Self::MemberRemoved => p("user-minus", Normal, "#b45309"),
            Self::TaskCreated => p("square-plus", Normal, "#2563eb"),
            Self::TaskUpdated => p("pencil", Low, "#64748b"),
            Self::TaskAssigned => p("user-check", High, "#7c3aed"),
            Self::TaskStatusChanged => p("arrow-right-left", Normal, "#0891b2"),
            Self::TaskCompleted => p("circle-check", High, "#16a34a"),
            Self::TaskReopened => p("rotate-ccw", Normal, "#d97706"),
            Self::TaskDeleted => p("trash", High, "#dc2626"),
            Self::CommentAdded => p("message-square", Normal, "#0ea5e9"),
            Self::CommentEdited => p("message-square-text", Low, "#64748b"),
            Self::CommentDeleted => p("message-square-x", Low, "#9ca3af"),
            Self::AttachmentUploaded => p("paperclip", Normal, "#4f46e5"),
            Self::AttachmentDeleted => p("file-x", Low, "#9ca3af"),
            Self::GithubCommitLinked => p("git-commit", Low, "#24292f"),
            Self::GithubPrLinked => p("git-pull-request", Normal, "#8250df"),
            Self::GithubIssueSynced => p("github", Low, "#24292f"),
        }
    }
}

/// The client-facing rendering of an [`ActivityEvent`].
///
/// Computed at delivery time and never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    /// Source activity ID.
    pub event_id: ActivityId,
    /// Source activity type.
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Producer description.
    pub description: String,
    /// Commit time of the source activity.
    pub timestamp: DateTime<Utc>,
    /// Acting user.
    pub actor: UserId,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Affected task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// One-line summary for the feed.
    pub display_message: String,
    /// Icon name.
    pub icon: String,
    /// Feed prominence.
    pub priority: Priority,
    /// Hex accent color.
    pub color: String,
}

impl BroadcastMessage {
    /// Derive the client rendering of `event`.
    pub fn from_event(event: &ActivityEvent) -> Self {
        let look = event.activity_type.presentation();
        let verb = event.activity_type.verb();
        let display_message = if event.description.is_empty() {
            format!("User {} {verb}", event.actor_user_id)
        } else {
            format!("User {} {verb}: {}", event.actor_user_id, event.description)
        };
        Self {
            event_id: event.id,
            activity_type: event.activity_type,
            description: event.description.clone(),
            timestamp: event.timestamp,
            actor: event.actor_user_id,
            project_id: event.project_id,
            task_id: event.task_id,
            display_message,
            icon: look.icon.to_owned(),
            priority: look.priority,
            color: look.color.to_owned(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
