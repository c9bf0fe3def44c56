//! Session lifecycle state machine.
//!
//! ```text
//! Connecting ──connect──▶ Connected ◀──unsubscribe (last scope)──┐
//!                            │                                   │
//!                            └────────subscribe────────▶ Subscribed
//!
//! any state ──disconnect──▶ Disconnected (terminal)
//! ```
//!
//! Each session carries an async mutex over its [`SessionPhase`]. Subscribe,
//! unsubscribe and disconnect hold it while they touch the indices, so a
//! disconnect (mark `Disconnected`, drop every subscription, remove from the
//! registry) is never interleaved with a subscribe on the same session: a
//! subscribe that loses the race sees `Disconnected` and fails with
//! [`RealtimeError::SessionClosed`] instead of leaving a subscription behind
//! for a session that no longer exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use pulse_core::{
    ActivityEvent, RealtimeError, Result, ScopeKey, SessionContext, SessionId, SubscriptionId,
    UserId,
};
use tracing::{debug, info};

use crate::backfill::RecentActivityFetcher;
use crate::heartbeat::HeartbeatMonitor;
use crate::registry::{ConnectionRegistry, Session};
use crate::subscriptions::SubscriptionManager;
use crate::telemetry::{SUBSCRIPTIONS_REJECTED_TOTAL, SUBSCRIPTIONS_TOTAL};
use crate::traits::AccessPolicy;

/// Where a session is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Registered, greeting not yet completed.
    Connecting,
    /// Live with no subscriptions.
    Connected,
    /// Live with at least one subscription.
    Subscribed,
    /// Torn down. Terminal.
    Disconnected,
}

/// What to leave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsubscribeTarget {
    /// One scope.
    Scope(ScopeKey),
    /// Every scope the session holds.
    All,
}

/// Result of a successful subscribe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeOutcome {
    /// Handle for the subscription.
    pub subscription_id: SubscriptionId,
    /// Scope joined.
    pub scope: ScopeKey,
    /// `false` if the session already held the scope.
    pub created: bool,
    /// Backfill, present only when the caller supplied a cursor.
    pub backfill: Option<Vec<ActivityEvent>>,
}

/// Result of an unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    /// Subscriptions removed.
    pub removed: usize,
    /// Phase afterwards; `None` if the session was unknown.
    pub phase: Option<SessionPhase>,
}

/// What a disconnect cleaned up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectSummary {
    /// The departed session.
    pub session_id: SessionId,
    /// Its user.
    pub user_id: UserId,
    /// Subscriptions dropped.
    pub subscriptions_removed: usize,
    /// When it connected.
    pub connected_at: DateTime<Utc>,
}

/// Orchestrates registry and index updates for inbound operations.
pub struct SessionLifecycleController {
    registry: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionManager>,
    access: Arc<dyn AccessPolicy>,
    backfill: RecentActivityFetcher,
    heartbeat: HeartbeatMonitor,
}

impl SessionLifecycleController {
    /// Build a controller over shared indices.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        subscriptions: Arc<SubscriptionManager>,
        access: Arc<dyn AccessPolicy>,
        backfill: RecentActivityFetcher,
    ) -> Self {
        let heartbeat = HeartbeatMonitor::new(registry.clone());
        Self {
            registry,
            subscriptions,
            access,
            backfill,
            heartbeat,
        }
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shared subscription index.
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Register the session named by `ctx` for its principal.
    pub async fn on_connect(&self, ctx: &SessionContext) -> Result<Arc<Session>> {
        let user = authenticated_user(ctx)?;
        let session = self.registry.register(ctx.session_id.clone(), user)?;
        *session.phase.lock().await = SessionPhase::Connected;
        info!(session_id = %ctx.session_id, user_id = %user, "session connected");
        Ok(session)
    }

    /// Subscribe after authorization, then backfill when `last_seen` is
    /// given.
    ///
    /// Rejections leave every index untouched.
    pub async fn on_subscribe(
        &self,
        ctx: &SessionContext,
        scope: ScopeKey,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<SubscribeOutcome> {
        let result = self.subscribe_inner(ctx, scope, last_seen).await;
        if let Err(error) = &result {
            counter!(SUBSCRIPTIONS_REJECTED_TOTAL, "code" => error.code()).increment(1);
            debug!(session_id = %ctx.session_id, %scope, %error, "subscribe rejected");
        }
        result
    }

    async fn subscribe_inner(
        &self,
        ctx: &SessionContext,
        scope: ScopeKey,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<SubscribeOutcome> {
        let user = authenticated_user(ctx)?;
        let session = self.owned_session(ctx, user)?;
        let session = session.ok_or_else(|| RealtimeError::UnknownSession(ctx.session_id.clone()))?;

        if let Some(target) = scope.access_target() {
            if !self.access.can_access(user, target).await {
                return Err(RealtimeError::AuthorizationDenied { scope });
            }
        }

        let subscribed = {
            let mut phase = session.phase.lock().await;
            if *phase == SessionPhase::Disconnected {
                return Err(RealtimeError::SessionClosed(ctx.session_id.clone()));
            }
            let subscribed = self.subscriptions.subscribe(session.id(), scope);
            *phase = SessionPhase::Subscribed;
            subscribed
        };
        let _ = self.registry.touch(session.id());

        if subscribed.created {
            counter!(SUBSCRIPTIONS_TOTAL, "kind" => scope.kind()).increment(1);
            info!(session_id = %ctx.session_id, user_id = %user, %scope, "subscribed");
        }

        let backfill = match last_seen {
            Some(since) => Some(self.backfill.recent_activities(user, scope, Some(since)).await),
            None => None,
        };

        Ok(SubscribeOutcome {
            subscription_id: subscribed.id,
            scope,
            created: subscribed.created,
            backfill,
        })
    }

    /// Leave one scope or all of them. Unknown sessions are a no-op.
    pub async fn on_unsubscribe(
        &self,
        ctx: &SessionContext,
        target: UnsubscribeTarget,
    ) -> Result<UnsubscribeOutcome> {
        let user = authenticated_user(ctx)?;
        let Some(session) = self.owned_session(ctx, user)? else {
            return Ok(UnsubscribeOutcome {
                removed: 0,
                phase: None,
            });
        };

        let mut phase = session.phase.lock().await;
        if *phase == SessionPhase::Disconnected {
            return Ok(UnsubscribeOutcome {
                removed: 0,
                phase: Some(SessionPhase::Disconnected),
            });
        }
        let removed = match target {
            UnsubscribeTarget::Scope(scope) => {
                usize::from(self.subscriptions.unsubscribe(session.id(), scope))
            }
            UnsubscribeTarget::All => self.subscriptions.unsubscribe_all(session.id()),
        };
        if self.subscriptions.count_for(session.id()) == 0 && *phase == SessionPhase::Subscribed {
            *phase = SessionPhase::Connected;
        }
        let now = *phase;
        drop(phase);

        let _ = self.registry.touch(session.id());
        debug!(session_id = %ctx.session_id, removed, ?target, "unsubscribed");
        Ok(UnsubscribeOutcome {
            removed,
            phase: Some(now),
        })
    }

    /// Record liveness and return the ack timestamp.
    ///
    /// A heartbeat for an unknown session is acknowledged but changes
    /// nothing; it does not re-register the session. A heartbeat naming
    /// another user's session is rejected and touches nothing.
    pub fn on_heartbeat(&self, ctx: &SessionContext) -> Result<DateTime<Utc>> {
        let user = authenticated_user(ctx)?;
        let _ = self.owned_session(ctx, user)?;
        Ok(self.heartbeat.on_heartbeat(&ctx.session_id))
    }

    /// Tear a session down: drop all its subscriptions and remove it from
    /// the registry as one step. Unknown or already-closed sessions are a
    /// no-op returning `None`.
    pub async fn on_disconnect(&self, session_id: &SessionId) -> Option<DisconnectSummary> {
        let session = self.registry.get(session_id)?;

        let mut phase = session.phase.lock().await;
        if *phase == SessionPhase::Disconnected {
            return None;
        }
        *phase = SessionPhase::Disconnected;
        let removed = self.subscriptions.unsubscribe_all(session_id);
        let _ = self.registry.remove_exact(&session);
        session.mark_closed();
        drop(phase);

        info!(
            session_id = %session_id,
            user_id = %session.user_id(),
            subscriptions_removed = removed,
            "session disconnected"
        );
        Some(DisconnectSummary {
            session_id: session_id.clone(),
            user_id: session.user_id(),
            subscriptions_removed: removed,
            connected_at: session.connected_at(),
        })
    }

    /// Current phase of a registered session.
    pub async fn phase(&self, session_id: &SessionId) -> Option<SessionPhase> {
        let session = self.registry.get(session_id)?;
        let phase = *session.phase.lock().await;
        Some(phase)
    }

    /// The session named by `ctx`, if registered, after checking that the
    /// caller's principal owns it.
    fn owned_session(&self, ctx: &SessionContext, user: UserId) -> Result<Option<Arc<Session>>> {
        match self.registry.get(&ctx.session_id) {
            Some(session) if session.user_id() != user => Err(RealtimeError::AuthenticationRequired),
            other => Ok(other),
        }
    }
}

fn authenticated_user(ctx: &SessionContext) -> Result<UserId> {
    ctx.user_id().ok_or(RealtimeError::AuthenticationRequired)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockAccessPolicy, MockActivityStore};
    use assert_matches::assert_matches;
    use pulse_core::{AccessTarget, ActivityId, ActivityType, Principal, ProjectId, TaskId};

    struct Fixture {
        controller: SessionLifecycleController,
    }

    fn fixture(access: MockAccessPolicy, store: MockActivityStore) -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(SubscriptionManager::new());
        let controller = SessionLifecycleController::new(
            registry,
            subscriptions,
            Arc::new(access),
            RecentActivityFetcher::new(Arc::new(store), 20),
        );
        Fixture { controller }
    }

    fn allow_all() -> MockAccessPolicy {
        let mut access = MockAccessPolicy::new();
        let _ = access.expect_can_access().returning(|_, _| true);
        access
    }

    fn ctx(session: &str, user: i64) -> SessionContext {
        SessionContext::authenticated(session, Principal::new(UserId(user)))
    }

    #[tokio::test]
    async fn connect_requires_principal() {
        let f = fixture(allow_all(), MockActivityStore::new());
        assert_matches!(
            f.controller.on_connect(&SessionContext::anonymous("s1")).await,
            Err(RealtimeError::AuthenticationRequired)
        );
        assert!(f.controller.registry().is_empty());
    }

    #[tokio::test]
    async fn connect_moves_to_connected() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let _ = f.controller.on_connect(&ctx("s1", 10)).await.unwrap();
        assert_eq!(
            f.controller.phase(&"s1".into()).await,
            Some(SessionPhase::Connected)
        );
    }

    #[tokio::test]
    async fn duplicate_connect_is_rejected() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let _ = f.controller.on_connect(&ctx("s1", 10)).await.unwrap();
        assert_matches!(
            f.controller.on_connect(&ctx("s1", 10)).await,
            Err(RealtimeError::DuplicateSession(_))
        );
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_walks_phases() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();

        let out = f
            .controller
            .on_subscribe(&c, ScopeKey::Project(ProjectId(7)), None)
            .await
            .unwrap();
        assert!(out.created);
        assert!(out.backfill.is_none());
        assert_eq!(
            f.controller.phase(&"s1".into()).await,
            Some(SessionPhase::Subscribed)
        );

        let un = f
            .controller
            .on_unsubscribe(&c, UnsubscribeTarget::Scope(ScopeKey::Project(ProjectId(7))))
            .await
            .unwrap();
        assert_eq!(un.removed, 1);
        assert_eq!(un.phase, Some(SessionPhase::Connected));
    }

    #[tokio::test]
    async fn partial_unsubscribe_stays_subscribed() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();
        let _ = f.controller.on_subscribe(&c, ScopeKey::Global, None).await.unwrap();
        let _ = f
            .controller
            .on_subscribe(&c, ScopeKey::Task(TaskId(42)), None)
            .await
            .unwrap();

        let un = f
            .controller
            .on_unsubscribe(&c, UnsubscribeTarget::Scope(ScopeKey::Global))
            .await
            .unwrap();
        assert_eq!(un.phase, Some(SessionPhase::Subscribed));
    }

    #[tokio::test]
    async fn global_subscribe_skips_authorization() {
        let mut access = MockAccessPolicy::new();
        let _ = access.expect_can_access().never();
        let f = fixture(access, MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();
        assert!(f.controller.on_subscribe(&c, ScopeKey::Global, None).await.is_ok());
    }

    #[tokio::test]
    async fn denied_subscribe_mutates_nothing() {
        let mut access = MockAccessPolicy::new();
        let _ = access
            .expect_can_access()
            .withf(|user, target| {
                *user == UserId(10) && *target == AccessTarget::Project(ProjectId(3))
            })
            .times(1)
            .returning(|_, _| false);
        let f = fixture(access, MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();

        assert_matches!(
            f.controller.on_subscribe(&c, ScopeKey::Project(ProjectId(3)), None).await,
            Err(RealtimeError::AuthorizationDenied { scope }) if scope == ScopeKey::Project(ProjectId(3))
        );
        assert_eq!(f.controller.subscriptions().subscription_count(), 0);
        assert_eq!(
            f.controller.phase(&"s1".into()).await,
            Some(SessionPhase::Connected)
        );
    }

    #[tokio::test]
    async fn anonymous_subscribe_is_rejected() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let _ = f.controller.on_connect(&ctx("s1", 10)).await.unwrap();
        assert_matches!(
            f.controller
                .on_subscribe(&SessionContext::anonymous("s1"), ScopeKey::Global, None)
                .await,
            Err(RealtimeError::AuthenticationRequired)
        );
        assert_eq!(f.controller.subscriptions().subscription_count(), 0);
    }

    #[tokio::test]
    async fn foreign_principal_cannot_drive_session() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let _ = f.controller.on_connect(&ctx("s1", 10)).await.unwrap();
        assert_matches!(
            f.controller.on_subscribe(&ctx("s1", 99), ScopeKey::Global, None).await,
            Err(RealtimeError::AuthenticationRequired)
        );
        assert_matches!(
            f.controller.on_unsubscribe(&ctx("s1", 99), UnsubscribeTarget::All).await,
            Err(RealtimeError::AuthenticationRequired)
        );
    }

    #[tokio::test]
    async fn foreign_heartbeat_does_not_touch_session() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let session = f.controller.on_connect(&ctx("s1", 10)).await.unwrap();
        let before = session.last_activity();
        std::thread::sleep(std::time::Duration::from_millis(2));

        assert_matches!(
            f.controller.on_heartbeat(&ctx("s1", 99)),
            Err(RealtimeError::AuthenticationRequired)
        );
        assert_eq!(session.last_activity(), before);
        assert!(f.controller.on_heartbeat(&ctx("s1", 10)).is_ok());
        assert!(session.last_activity() > before);
    }

    #[tokio::test]
    async fn subscribe_unknown_session_fails() {
        let f = fixture(allow_all(), MockActivityStore::new());
        assert_matches!(
            f.controller.on_subscribe(&ctx("ghost", 10), ScopeKey::Global, None).await,
            Err(RealtimeError::UnknownSession(_))
        );
    }

    #[tokio::test]
    async fn unknown_session_unsubscribe_and_disconnect_are_noops() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let out = f
            .controller
            .on_unsubscribe(&ctx("ghost", 10), UnsubscribeTarget::All)
            .await
            .unwrap();
        assert_eq!(out.removed, 0);
        assert_eq!(out.phase, None);
        assert!(f.controller.on_disconnect(&"ghost".into()).await.is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_both_indices() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();
        let _ = f.controller.on_subscribe(&c, ScopeKey::Global, None).await.unwrap();
        let _ = f
            .controller
            .on_subscribe(&c, ScopeKey::Project(ProjectId(7)), None)
            .await
            .unwrap();

        let session = f.controller.registry().get(&"s1".into()).unwrap();
        assert!(!session.is_closed());

        let summary = f.controller.on_disconnect(&"s1".into()).await.unwrap();
        assert!(session.is_closed());
        assert_eq!(summary.subscriptions_removed, 2);
        assert_eq!(summary.user_id, UserId(10));
        assert!(f.controller.registry().is_empty());
        assert_eq!(f.controller.subscriptions().scope_count(), 0);
        assert!(f.controller.subscriptions().is_consistent());
        assert!(f.controller.on_disconnect(&"s1".into()).await.is_none());
    }

    #[tokio::test]
    async fn subscribe_after_disconnect_fails() {
        let f = fixture(allow_all(), MockActivityStore::new());
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();
        let _ = f.controller.on_disconnect(&"s1".into()).await.unwrap();

        assert_matches!(
            f.controller.on_subscribe(&c, ScopeKey::Global, None).await,
            Err(RealtimeError::UnknownSession(_))
        );
        assert_eq!(f.controller.subscriptions().subscription_count(), 0);
    }

    #[tokio::test]
    async fn cursor_triggers_backfill() {
        let mut store = MockActivityStore::new();
        let _ = store.expect_query().times(1).returning(|q| {
            Ok(vec![ActivityEvent {
                id: ActivityId(1),
                activity_type: ActivityType::TaskCreated,
                description: "new".into(),
                timestamp: Utc::now(),
                actor_user_id: q.user,
                project_id: None,
                task_id: None,
                target_user_id: None,
            }])
        });
        let f = fixture(allow_all(), store);
        let c = ctx("s1", 10);
        let _ = f.controller.on_connect(&c).await.unwrap();

        let out = f
            .controller
            .on_subscribe(
                &c,
                ScopeKey::Global,
                Some(Utc::now() - chrono::Duration::minutes(10)),
            )
            .await
            .unwrap();
        assert_eq!(out.backfill.map(|b| b.len()), Some(1));
    }

    #[tokio::test]
    async fn heartbeat_requires_principal_but_not_registration() {
        let f = fixture(allow_all(), MockActivityStore::new());
        assert_matches!(
            f.controller.on_heartbeat(&SessionContext::anonymous("s1")),
            Err(RealtimeError::AuthenticationRequired)
        );
        assert!(f.controller.on_heartbeat(&ctx("ghost", 10)).is_ok());
        assert!(f.controller.registry().is_empty());
    }
}
