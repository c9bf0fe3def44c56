//! In-process collaborators.
//!
//! [`InMemoryActivityStore`] keeps a bounded ring of recent activity and
//! answers backfill queries from it. [`MembershipPolicy`] authorizes project
//! and task scopes from a static membership table. Both back the standalone
//! gateway and the test suites; a deployment embedded in the tracker
//! supplies database-backed implementations instead.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use pulse_core::{AccessTarget, ActivityEvent, ProjectId, StoreError, TaskId, UserId};
use pulse_settings::AccessSettings;

use crate::traits::{AccessPolicy, ActivityQuery, ActivityStore};

// ─────────────────────────────────────────────────────────────────────────────
// Activity store
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded in-memory activity history. Oldest entries fall off first.
#[derive(Debug)]
pub struct InMemoryActivityStore {
    capacity: usize,
    events: RwLock<VecDeque<ActivityEvent>>,
}

impl InMemoryActivityStore {
    /// Store holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn record(&self, event: ActivityEvent) {
        let mut events = self.events.write();
        if events.len() == self.capacity {
            let _ = events.pop_front();
        }
        events.push_back(event);
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn query(&self, query: &ActivityQuery) -> Result<Vec<ActivityEvent>, StoreError> {
        let events = self.events.read();
        let mut hits: Vec<ActivityEvent> = events
            .iter()
            .filter(|e| e.matches(query.scope))
            .filter(|e| query.since.is_none_or(|since| e.timestamp > since))
            .cloned()
            .collect();
        drop(events);

        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(query.limit);
        Ok(hits)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Access policy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Membership {
    members: HashMap<ProjectId, HashSet<UserId>>,
    task_projects: HashMap<TaskId, ProjectId>,
}

/// Project-membership authorization.
///
/// A user may watch a project if they are a member, and a task if they are
/// a member of the task's project. Tasks with no known project are denied.
#[derive(Debug, Default)]
pub struct MembershipPolicy {
    allow_all: bool,
    table: RwLock<Membership>,
}

impl MembershipPolicy {
    /// Policy denying everything until memberships are granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy granting every user every scope.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            table: RwLock::default(),
        }
    }

    /// Build from the `access` settings section.
    pub fn from_settings(settings: &AccessSettings) -> Self {
        let policy = Self {
            allow_all: settings.allow_all,
            table: RwLock::default(),
        };
        for (project, users) in &settings.project_members {
            for user in users {
                policy.grant(ProjectId(*project), UserId(*user));
            }
        }
        for (task, project) in &settings.task_projects {
            policy.link_task(TaskId(*task), ProjectId(*project));
        }
        policy
    }

    /// Make `user` a member of `project`.
    pub fn grant(&self, project: ProjectId, user: UserId) {
        let _ = self
            .table
            .write()
            .members
            .entry(project)
            .or_default()
            .insert(user);
    }

    /// Remove `user` from `project`. Existing subscriptions are unaffected.
    pub fn revoke(&self, project: ProjectId, user: UserId) {
        if let Some(users) = self.table.write().members.get_mut(&project) {
            let _ = users.remove(&user);
        }
    }

    /// Record that `task` belongs to `project`.
    pub fn link_task(&self, task: TaskId, project: ProjectId) {
        let _ = self.table.write().task_projects.insert(task, project);
    }

    fn is_member(table: &Membership, project: ProjectId, user: UserId) -> bool {
        table
            .members
            .get(&project)
            .is_some_and(|users| users.contains(&user))
    }
}

#[async_trait]
impl AccessPolicy for MembershipPolicy {
    async fn can_access(&self, user: UserId, target: AccessTarget) -> bool {
        if self.allow_all {
            return true;
        }
        let table = self.table.read();
        match target {
            AccessTarget::Project(project) => Self::is_member(&table, project, user),
            AccessTarget::Task(task) => table
                .task_projects
                .get(&task)
                .is_some_and(|project| Self::is_member(&table, *project, user)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
