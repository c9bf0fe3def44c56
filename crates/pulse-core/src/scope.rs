//! Broadcast scopes.
//!
//! A [`ScopeKey`] names one broadcast channel. The set is closed: the
//! firehose ([`ScopeKey::Global`]), one channel per project and one per task.
//!
//! The JSON form is tagged so that clients can send it verbatim:
//!
//! ```json
//! {"kind": "global"}
//! {"kind": "project", "id": 7}
//! {"kind": "task", "id": 42}
//! ```
//!
//! The compact text form (`global`, `project:7`, `task:42`) is used in logs,
//! metrics labels and query strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RealtimeError;
use crate::ids::{ProjectId, TaskId};

/// One broadcast channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ScopeKey {
    /// Every activity in the tracker.
    Global,
    /// Activity attached to one project.
    Project(ProjectId),
    /// Activity attached to one task.
    Task(TaskId),
}

/// An entity the authorization collaborator must approve before a session
/// may subscribe to its scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessTarget {
    /// Access to a project.
    Project(ProjectId),
    /// Access to a task.
    Task(TaskId),
}

impl ScopeKey {
    /// The entity whose access must be checked, or `None` for the global
    /// scope which every authenticated user may join.
    pub fn access_target(self) -> Option<AccessTarget> {
        match self {
            Self::Global => None,
            Self::Project(p) => Some(AccessTarget::Project(p)),
            Self::Task(t) => Some(AccessTarget::Task(t)),
        }
    }

    /// Short label for metrics (`global`, `project`, `task`).
    pub fn kind(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project(_) => "project",
            Self::Task(_) => "task",
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Project(p) => write!(f, "project:{p}"),
            Self::Task(t) => write!(f, "task:{t}"),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RealtimeError::InvalidScope(s.to_owned());
        let s = s.trim();
        if s.eq_ignore_ascii_case("global") {
            return Ok(Self::Global);
        }
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        match kind.to_ascii_lowercase().as_str() {
            "project" => id.parse().map(Self::Project).map_err(|_| invalid()),
            "task" => id.parse().map(Self::Task).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for AccessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(p) => write!(f, "project:{p}"),
            Self::Task(t) => write!(f, "task:{t}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
