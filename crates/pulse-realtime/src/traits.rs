//! Collaborator contracts.
//!
//! The broadcast core owns no persistence, no identity database and no
//! sockets. It reaches each of those through one of these traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{
    AccessTarget, ActivityEvent, DeliveryError, ScopeKey, ServerFrame, SessionId, StoreError,
    UserId,
};

/// Authorization collaborator. Consulted once per subscribe, never per
/// publish.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Whether `user` may watch `target`.
    async fn can_access(&self, user: UserId, target: AccessTarget) -> bool;
}

/// A backfill request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityQuery {
    /// User the history is fetched for.
    pub user: UserId,
    /// Scope being backfilled.
    pub scope: ScopeKey,
    /// Only activities strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Most rows to return.
    pub limit: usize,
}

/// Persistent activity history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Activities matching `query`, newest first.
    async fn query(&self, query: &ActivityQuery) -> Result<Vec<ActivityEvent>, StoreError>;
}

/// Who a delivery is for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Recipient {
    /// Target connection.
    pub session_id: SessionId,
    /// User owning the connection at dispatch time.
    pub user_id: UserId,
}

/// Outbound path to connected clients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand `frame` to `to`'s connection.
    async fn deliver(&self, to: &Recipient, frame: Arc<ServerFrame>) -> Result<(), DeliveryError>;
}
