//! Websocket wire protocol.
//!
//! Client frames are flat JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "subscribe", "scope": {"kind": "task", "id": 42}, "lastSeen": "2026-01-01T00:00:00Z", "requestId": "r1"}
//! {"type": "unsubscribe", "all": true}
//! {"type": "heartbeat"}
//! ```
//!
//! Server frames wrap their payload in `data` because a broadcast payload
//! carries its own `type` field (the activity type):
//!
//! ```json
//! {"type": "broadcastMessage", "data": {"eventId": 5, "type": "TASK_COMPLETED", ...}}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RealtimeError;
use crate::ids::{SessionId, SubscriptionId, UserId};
use crate::presentation::BroadcastMessage;
use crate::scope::ScopeKey;

/// Outcome flag carried by acknowledgements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// Request applied.
    Success,
    /// Request rejected.
    Error,
}

/// Frames a client may send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Join a scope, optionally asking for activity since `last_seen`.
    Subscribe {
        /// Scope to join.
        scope: ScopeKey,
        /// Backfill cursor.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen: Option<DateTime<Utc>>,
        /// Echoed back on the ack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Leave one scope, or every scope when `all` is set.
    Unsubscribe {
        /// Scope to leave.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<ScopeKey>,
        /// Leave everything.
        #[serde(default)]
        all: bool,
        /// Echoed back on the ack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Liveness ping.
    Heartbeat {
        /// Echoed back on the ack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ClientFrame {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The request ID the client attached, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Subscribe { request_id, .. }
            | Self::Unsubscribe { request_id, .. }
            | Self::Heartbeat { request_id } => request_id.as_deref(),
        }
    }
}

/// Frames the server sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    /// First frame on every connection.
    ConnectionEstablished {
        /// Session the server assigned.
        session_id: SessionId,
        /// Authenticated user.
        user_id: UserId,
        /// Server time.
        timestamp: String,
    },
    /// Reply to `subscribe`.
    SubscriptionAck {
        /// Outcome.
        status: AckStatus,
        /// Human-readable outcome.
        message: String,
        /// Handle for the accepted subscription.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subscription_id: Option<SubscriptionId>,
        /// Scope the ack refers to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<ScopeKey>,
        /// Error code on rejection.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Echo of the client's request ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Reply to `unsubscribe`.
    UnsubscribeAck {
        /// Outcome.
        status: AckStatus,
        /// Number of subscriptions removed.
        removed: usize,
        /// Echo of the client's request ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Live activity.
    BroadcastMessage(BroadcastMessage),
    /// Backfill reply, newest first.
    RecentActivities {
        /// Scope the backfill was computed for.
        scope: ScopeKey,
        /// Activities after the client's cursor.
        activities: Vec<BroadcastMessage>,
        /// Echo of the client's request ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// Reply to `heartbeat`.
    HeartbeatAck {
        /// Server time of the ack.
        timestamp: String,
        /// Echo of the client's request ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// A request failed outside any ack shape.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable description.
        message: String,
        /// Echo of the client's request ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

/// Millisecond RFC 3339 timestamp, the format every server frame uses.
pub fn wire_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ServerFrame {
    /// Greeting for a freshly connected session.
    pub fn established(session_id: SessionId, user_id: UserId) -> Self {
        Self::ConnectionEstablished {
            session_id,
            user_id,
            timestamp: wire_timestamp(Utc::now()),
        }
    }

    /// Successful subscription ack.
    pub fn subscribed(
        scope: ScopeKey,
        subscription_id: SubscriptionId,
        request_id: Option<String>,
    ) -> Self {
        Self::SubscriptionAck {
            status: AckStatus::Success,
            message: format!("subscribed to {scope}"),
            subscription_id: Some(subscription_id),
            scope: Some(scope),
            code: None,
            request_id,
        }
    }

    /// Rejected subscription ack.
    pub fn subscribe_rejected(
        scope: Option<ScopeKey>,
        error: &RealtimeError,
        request_id: Option<String>,
    ) -> Self {
        Self::SubscriptionAck {
            status: AckStatus::Error,
            message: error.to_string(),
            subscription_id: None,
            scope,
            code: Some(error.code().to_owned()),
            request_id,
        }
    }

    /// Heartbeat ack stamped with `at`.
    pub fn heartbeat_ack(at: DateTime<Utc>, request_id: Option<String>) -> Self {
        Self::HeartbeatAck {
            timestamp: wire_timestamp(at),
            request_id,
        }
    }

    /// Generic error frame.
    pub fn error(code: &str, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self::Error {
            code: code.to_owned(),
            message: message.into(),
            request_id,
        }
    }

    /// Frame type name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connectionEstablished",
            Self::SubscriptionAck { .. } => "subscriptionAck",
            Self::UnsubscribeAck { .. } => "unsubscribeAck",
            Self::BroadcastMessage(_) => "broadcastMessage",
            Self::RecentActivities { .. } => "recentActivities",
            Self::HeartbeatAck { .. } => "heartbeatAck",
            Self::Error { .. } => "error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
