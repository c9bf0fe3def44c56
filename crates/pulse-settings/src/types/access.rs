//! Authentication and static authorization tables.
//!
//! The gateway binary has no database of its own, so who-is-who and
//! who-may-see-what are read from settings. Map keys are JSON strings
//! holding integers (`"7": [10, 11]`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bearer tokens accepted by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Websocket token to user ID.
    pub tokens: BTreeMap<String, i64>,
    /// Service token required by the activity ingest endpoint. Ingest is
    /// disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_token: Option<String>,
}

/// Who may subscribe to which project and task scopes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessSettings {
    /// Grant every authenticated user every scope.
    pub allow_all: bool,
    /// Project ID to member user IDs.
    pub project_members: BTreeMap<i64, Vec<i64>>,
    /// Task ID to owning project ID.
    pub task_projects: BTreeMap<i64, i64>,
}
