//! Heartbeat bookkeeping and the optional stale-session sweep.
//!
//! Heartbeats are advisory: they refresh a session's last-activity time and
//! nothing else. Transport disconnects remain the authoritative cleanup
//! trigger. Deployments that cannot rely on the transport noticing dead
//! peers can run [`run_stale_sweep`], which disconnects sessions idle for
//! longer than a threshold. An evicted session's [`Session::closed`] fires,
//! which is the transport's cue to drop the connection.
//!
//! [`Session::closed`]: crate::registry::Session::closed

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use pulse_core::SessionId;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::lifecycle::SessionLifecycleController;
use crate::registry::ConnectionRegistry;
use crate::telemetry::STALE_EVICTIONS_TOTAL;

/// Records heartbeats against the registry.
#[derive(Clone, Debug)]
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
}

impl HeartbeatMonitor {
    /// Monitor over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Touch the session and return the ack timestamp.
    ///
    /// Unknown sessions are logged by the registry and still acked.
    pub fn on_heartbeat(&self, session_id: &SessionId) -> DateTime<Utc> {
        let _ = self.registry.touch(session_id);
        Utc::now()
    }
}

/// Disconnect every session idle for at least `stale_after`.
///
/// Returns how many sessions were evicted.
pub async fn sweep_stale_sessions(
    lifecycle: &SessionLifecycleController,
    stale_after: Duration,
) -> usize {
    let stale_after = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(stale_after)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut evicted = 0;
    for session in lifecycle.registry().idle_since(cutoff) {
        if lifecycle.on_disconnect(session.id()).await.is_some() {
            info!(
                session_id = %session.id(),
                last_activity = %session.last_activity(),
                "evicted stale session"
            );
            evicted += 1;
        }
    }
    if evicted > 0 {
        counter!(STALE_EVICTIONS_TOTAL).increment(evicted as u64);
    }
    evicted
}

/// Run [`sweep_stale_sessions`] every `interval` until `cancel` fires.
pub async fn run_stale_sweep(
    lifecycle: Arc<SessionLifecycleController>,
    interval: Duration,
    stale_after: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    // The first tick completes immediately.
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = sweep_stale_sessions(&lifecycle, stale_after).await;
                debug!(evicted, "stale sweep finished");
            }
            () = cancel.cancelled() => {
                debug!("stale sweep cancelled");
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
