//! Activity fan-out.
//!
//! [`ActivityPublisher::publish`] runs synchronously on the caller's thread
//! only long enough to resolve scopes and snapshot their subscribers. Each
//! recipient then gets its own task on a [`TaskTracker`], so a slow or dead
//! connection can only ever delay its own frame.
//!
//! Delivery is best-effort and at most once per recipient per event: a
//! session subscribed to several of the event's scopes receives a single
//! frame, and a failed delivery is logged and forgotten.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use pulse_core::{
    ActivityEvent, BroadcastMessage, DeliveryError, ScopeKey, ServerFrame, SessionId,
};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

use crate::registry::ConnectionRegistry;
use crate::subscriptions::SubscriptionManager;
use crate::telemetry::{
    ACTIVITY_DELIVERIES_SKIPPED_TOTAL, ACTIVITY_DELIVERIES_TOTAL,
    ACTIVITY_DELIVERY_FAILURES_TOTAL, ACTIVITY_PUBLISHED_TOTAL,
};
use crate::traits::{Recipient, Transport};

/// What a publish dispatched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReport {
    /// Scopes the event resolved to, in resolution order.
    pub scopes: Vec<ScopeKey>,
    /// Distinct sessions a delivery was dispatched to.
    pub recipients: usize,
}

/// Resolves events to subscribers and dispatches deliveries.
pub struct ActivityPublisher {
    registry: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionManager>,
    transport: Arc<dyn Transport>,
    tracker: TaskTracker,
    delivery_timeout: Option<Duration>,
}

impl ActivityPublisher {
    /// Publisher over shared indices. `delivery_timeout` bounds each
    /// delivery; `None` waits as long as the transport does.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        subscriptions: Arc<SubscriptionManager>,
        transport: Arc<dyn Transport>,
        delivery_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            subscriptions,
            transport,
            tracker: TaskTracker::new(),
            delivery_timeout,
        }
    }

    /// Dispatch `event` to every current subscriber of its scopes.
    ///
    /// Never blocks on delivery. Must be called from within a Tokio
    /// runtime; outside one the event is dropped with a warning.
    #[instrument(skip_all, fields(event_id = %event.id, activity_type = ?event.activity_type))]
    pub fn publish(&self, event: &ActivityEvent) -> PublishReport {
        counter!(ACTIVITY_PUBLISHED_TOTAL).increment(1);
        let scopes = event.scopes();

        let mut seen: HashSet<SessionId> = HashSet::new();
        let mut targets: Vec<SessionId> = Vec::new();
        for scope in &scopes {
            for session in self.subscriptions.subscribers_of(*scope) {
                if seen.insert(session.clone()) {
                    targets.push(session);
                }
            }
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(recipients = targets.len(), "publish called outside a runtime, dropping event");
            return PublishReport {
                scopes,
                recipients: 0,
            };
        };

        let frame = Arc::new(ServerFrame::BroadcastMessage(BroadcastMessage::from_event(
            event,
        )));
        let recipients = targets.len();
        for session_id in targets {
            let delivery = deliver_one(
                self.registry.clone(),
                self.transport.clone(),
                session_id,
                frame.clone(),
                self.delivery_timeout,
            );
            let _ = self.tracker.spawn_on(delivery, &runtime);
        }

        debug!(?scopes, recipients, "activity dispatched");
        PublishReport { scopes, recipients }
    }

    /// Deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every delivery dispatched so far to finish.
    pub async fn flush(&self) {
        let _ = self.tracker.close();
        self.tracker.wait().await;
        let _ = self.tracker.reopen();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryOutcome {
    Delivered,
    /// The recipient was torn down before the frame reached it.
    Skipped,
    Failed(&'static str),
}

async fn deliver_one(
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Transport>,
    session_id: SessionId,
    frame: Arc<ServerFrame>,
    timeout: Option<Duration>,
) -> DeliveryOutcome {
    // The session may have gone between snapshot and dispatch.
    let Some(user_id) = registry.user_of(&session_id) else {
        debug!(session_id = %session_id, "recipient left before delivery");
        counter!(ACTIVITY_DELIVERIES_SKIPPED_TOTAL).increment(1);
        return DeliveryOutcome::Skipped;
    };
    let recipient = Recipient {
        session_id,
        user_id,
    };

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, transport.deliver(&recipient, frame))
            .await
            .unwrap_or_else(|_| Err(DeliveryError::TimedOut)),
        None => transport.deliver(&recipient, frame).await,
    };

    match result {
        Ok(()) => {
            counter!(ACTIVITY_DELIVERIES_TOTAL).increment(1);
            DeliveryOutcome::Delivered
        }
        // Torn down after the lookup above.
        Err(DeliveryError::Closed) => {
            debug!(session_id = %recipient.session_id, "recipient closed before delivery");
            counter!(ACTIVITY_DELIVERIES_SKIPPED_TOTAL).increment(1);
            DeliveryOutcome::Skipped
        }
        Err(error) => {
            warn!(
                session_id = %recipient.session_id,
                user_id = %recipient.user_id,
                %error,
                "delivery failed"
            );
            counter!(ACTIVITY_DELIVERY_FAILURES_TOTAL, "reason" => error.reason()).increment(1);
            DeliveryOutcome::Failed(error.reason())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
