//! Activity events produced by business services after they commit.
//!
//! The realtime core never creates these; it only reads them to decide who
//! should hear about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActivityId, ProjectId, TaskId, UserId};
use crate::scope::ScopeKey;

/// Closed set of domain occurrences the tracker records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    /// A project was created.
    ProjectCreated,
    /// Project metadata changed.
    ProjectUpdated,
    /// A project was archived.
    ProjectArchived,
    /// A user joined a project.
    MemberAdded,
    /// A user left or was removed from a project.
    MemberRemoved,
    /// A task was created.
    TaskCreated,
    /// Task fields changed.
    TaskUpdated,
    /// A task was assigned to someone.
    TaskAssigned,
    /// A task moved between workflow columns.
    TaskStatusChanged,
    /// A task was completed.
    TaskCompleted,
    /// A completed task was reopened.
    TaskReopened,
    /// A task was deleted.
    TaskDeleted,
    /// A comment was posted.
    CommentAdded,
    /// A comment was edited.
    CommentEdited,
    /// A comment was deleted.
    CommentDeleted,
    /// A file was attached.
    AttachmentUploaded,
    /// An attachment was removed.
    AttachmentDeleted,
    /// A GitHub commit was linked to a task.
    GithubCommitLinked,
    /// A GitHub pull request was linked to a task.
    GithubPrLinked,
    /// A GitHub issue was synchronized.
    GithubIssueSynced,
}

impl ActivityType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 20] = [
        Self::ProjectCreated,
        Self::ProjectUpdated,
        Self::ProjectArchived,
        Self::MemberAdded,
        Self::MemberRemoved,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskAssigned,
        Self::TaskStatusChanged,
        Self::TaskCompleted,
        Self::TaskReopened,
        Self::TaskDeleted,
        Self::CommentAdded,
        Self::CommentEdited,
        Self::CommentDeleted,
        Self::AttachmentUploaded,
        Self::AttachmentDeleted,
        Self::GithubCommitLinked,
        Self::GithubPrLinked,
        Self::GithubIssueSynced,
    ];

    /// Verb phrase used when rendering a human-readable line.
    pub fn verb(self) -> &'static str {
        match self {
            Self::ProjectCreated => "created a project",
            Self::ProjectUpdated => "updated a project",
            Self::ProjectArchived => "archived a project",
            Self::MemberAdded => "added a member",
            Self::MemberRemoved => "removed a member",
            Self::TaskCreated => "created a task",
            Self::TaskUpdated => "updated a task",
            Self::TaskAssigned => "assigned a task",
            Self::TaskStatusChanged => "moved a task",
            Self::TaskCompleted => "completed a task",
            Self::TaskReopened => "reopened a task",
            Self::TaskDeleted => "deleted a task",
            Self::CommentAdded => "commented",
            Self::CommentEdited => "edited a comment",
            Self::CommentDeleted => "deleted a comment",
            Self::AttachmentUploaded => "uploaded a file",
            Self::AttachmentDeleted => "removed a file",
            Self::GithubCommitLinked => "linked a commit",
            Self::GithubPrLinked => "linked a pull request",
            Self::GithubIssueSynced => "synced an issue",
        }
    }
}

/// An immutable record of something that happened in the tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Persisted record ID.
    pub id: ActivityId,
    /// What happened.
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Free-form description written by the producing service.
    pub description: String,
    /// When the producing service committed the change.
    pub timestamp: DateTime<Utc>,
    /// Who did it.
    pub actor_user_id: UserId,
    /// Owning project, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Affected task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// User the action was aimed at (assignee, removed member, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<UserId>,
}

impl ActivityEvent {
    /// Scopes this event is broadcast on: always [`ScopeKey::Global`], then
    /// the project and task scopes when the event carries those IDs.
    pub fn scopes(&self) -> Vec<ScopeKey> {
        let mut scopes = Vec::with_capacity(3);
        scopes.push(ScopeKey::Global);
        if let Some(p) = self.project_id {
            scopes.push(ScopeKey::Project(p));
        }
        if let Some(t) = self.task_id {
            scopes.push(ScopeKey::Task(t));
        }
        scopes
    }

    /// Whether this event belongs on `scope`.
    pub fn matches(&self, scope: ScopeKey) -> bool {
        match scope {
            ScopeKey::Global => true,
            ScopeKey::Project(p) => self.project_id == Some(p),
            ScopeKey::Task(t) => self.task_id == Some(t),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
