//! Channel-backed [`Transport`].
//!
//! Each connected session owns a bounded outbox. The socket task drains it.
//! Deliveries fill it with `try_send`, so a stalled client costs a dropped
//! frame rather than a blocked publisher. Direct replies to the client's own
//! requests wait for room, bounded by a deadline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use pulse_core::{DeliveryError, ServerFrame, SessionId};
use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};

use crate::traits::{Recipient, Transport};

#[derive(Debug)]
struct Outbox {
    tx: mpsc::Sender<Arc<ServerFrame>>,
    dropped: AtomicU64,
}

/// Per-session bounded outboxes.
#[derive(Debug)]
pub struct ChannelTransport {
    outboxes: DashMap<SessionId, Outbox>,
    capacity: usize,
}

impl ChannelTransport {
    /// Transport whose outboxes hold `capacity` frames each.
    pub fn new(capacity: usize) -> Self {
        Self {
            outboxes: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Open an outbox for `session`, replacing any previous one, and return
    /// its receiving end.
    pub fn attach(&self, session: &SessionId) -> mpsc::Receiver<Arc<ServerFrame>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let _ = self.outboxes.insert(
            session.clone(),
            Outbox {
                tx,
                dropped: AtomicU64::new(0),
            },
        );
        rx
    }

    /// Close `session`'s outbox. Frames already queued are still readable
    /// by the receiver.
    pub fn detach(&self, session: &SessionId) -> bool {
        self.outboxes.remove(session).is_some()
    }

    /// Queue `frame` for `session` without waiting.
    pub fn send(&self, session: &SessionId, frame: Arc<ServerFrame>) -> Result<(), DeliveryError> {
        let Some(outbox) = self.outboxes.get(session) else {
            return Err(DeliveryError::Closed);
        };
        match outbox.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = outbox.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                Err(DeliveryError::Backpressure { dropped })
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Queue a reply for `session`, waiting up to `wait` for room.
    ///
    /// Replies keep their place behind frames already queued. Only a
    /// client that stays full past the deadline loses the reply.
    pub async fn reply(
        &self,
        session: &SessionId,
        frame: Arc<ServerFrame>,
        wait: Duration,
    ) -> Result<(), DeliveryError> {
        // Clone the sender so no map guard is held across the await.
        let Some(tx) = self.outboxes.get(session).map(|o| o.tx.clone()) else {
            return Err(DeliveryError::Closed);
        };
        match tx.send_timeout(frame, wait).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                let dropped = self.outboxes.get(session).map_or(0, |o| {
                    o.dropped.fetch_add(1, Ordering::Relaxed) + 1
                });
                Err(DeliveryError::Backpressure { dropped })
            }
            Err(SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Frames dropped for `session` because its outbox was full.
    pub fn dropped(&self, session: &SessionId) -> u64 {
        self.outboxes
            .get(session)
            .map_or(0, |o| o.dropped.load(Ordering::Relaxed))
    }

    /// Number of open outboxes.
    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    /// Whether no outbox is open.
    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn deliver(&self, to: &Recipient, frame: Arc<ServerFrame>) -> Result<(), DeliveryError> {
        self.send(&to.session_id, frame)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
