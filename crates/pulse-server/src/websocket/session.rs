//! One websocket client from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use pulse_core::{RealtimeError, ServerFrame, SessionContext};
use pulse_realtime::{ChannelTransport, RealtimeHub, Session};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::handler::handle_frame;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_REPLY_DROPS_TOTAL,
};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Ping cadence for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingTiming {
    /// Interval between pings.
    pub interval: Duration,
    /// Silence after which the client is dropped.
    pub timeout: Duration,
}

impl From<&ServerConfig> for PingTiming {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.ping_interval,
            timeout: config.pong_timeout,
        }
    }
}

/// Time of the last frame of any kind from the client.
#[derive(Debug)]
pub struct Liveness {
    last_seen: Mutex<Instant>,
}

impl Liveness {
    /// Liveness starting now.
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Record client activity.
    pub fn mark(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a websocket session for an authenticated client.
///
/// 1. Registers the session with the lifecycle controller, then opens its outbox
/// 2. Queues `connectionEstablished` as the first outbound frame
/// 3. Forwards outbox frames to the socket, pinging on a timer
/// 4. Dispatches inbound frames and queues the replies behind any broadcasts
/// 5. On close, timeout, shutdown or server-side eviction: disconnects, then
///    closes the outbox
#[instrument(skip_all, fields(session_id = %ctx.session_id, user_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    ctx: SessionContext,
    hub: Arc<RealtimeHub>,
    transport: Arc<ChannelTransport>,
    timing: PingTiming,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let session_id = ctx.session_id.clone();

    let (session, outbox) = match open_session(&ctx, &hub, &transport).await {
        Ok(opened) => opened,
        Err(error) => {
            warn!(%error, "connection rejected");
            let frame = ServerFrame::error(error.code(), error.to_string(), None);
            if let Ok(json) = serde_json::to_string(&frame) {
                let _ = ws_tx.send(Message::Text(json.into())).await;
            }
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    let _ = tracing::Span::current().record("user_id", session.user_id().get());

    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let greeting = ServerFrame::established(session_id.clone(), session.user_id());
    if let Err(error) = transport.send(&session_id, Arc::new(greeting)) {
        warn!(%error, "failed to queue greeting");
    }

    let liveness = Arc::new(Liveness::new());
    let mut outbound = tokio::spawn(forward_outbound(
        ws_tx,
        outbox,
        liveness.clone(),
        timing,
        cancel.clone(),
    ));

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            () = session.closed() => {
                info!("session closed by server");
                break;
            }
            next = ws_rx.next() => next,
        };
        let Some(Ok(msg)) = next else { break };
        liveness.mark();

        let text = match msg {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Pong(_) => {
                let _ = hub.registry().touch(&session_id);
                continue;
            }
            Message::Ping(_) => continue,
        };

        for reply in handle_frame(&text, &ctx, hub.lifecycle()).await {
            let kind = reply.kind();
            if let Err(error) = transport
                .reply(&session_id, Arc::new(reply), timing.timeout)
                .await
            {
                warn!(%error, kind, "reply dropped");
                counter!(WS_REPLY_DROPS_TOTAL).increment(1);
            }
        }
    }

    // Disconnect before closing the outbox so no delivery targets a
    // session that is still indexed.
    let summary = hub.lifecycle().on_disconnect(&session_id).await;
    let _ = transport.detach(&session_id);
    cancel.cancel();
    if tokio::time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }

    info!(
        subscriptions_removed = summary.map_or(0, |s| s.subscriptions_removed),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

/// Register the session, then open its outbox.
///
/// A rejected connect leaves the transport untouched, so a duplicate ID can
/// never take over a live session's outbox.
async fn open_session(
    ctx: &SessionContext,
    hub: &RealtimeHub,
    transport: &ChannelTransport,
) -> Result<(Arc<Session>, mpsc::Receiver<Arc<ServerFrame>>), RealtimeError> {
    let session = hub.lifecycle().on_connect(ctx).await?;
    let outbox = transport.attach(&ctx.session_id);
    Ok((session, outbox))
}

async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<Arc<ServerFrame>>,
    liveness: Arc<Liveness>,
    timing: PingTiming,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(timing.interval);
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = outbox.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&*frame) {
                    Ok(json) => {
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => warn!(%error, kind = frame.kind(), "failed to encode frame"),
                }
            }
            _ = ping.tick() => {
                if liveness.idle_for() > timing.timeout {
                    warn!(timeout = ?timing.timeout, "client unresponsive, disconnecting");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    // Wake the inbound loop if the socket side ended first.
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pulse_core::{Principal, UserId};
    use pulse_realtime::memory::{InMemoryActivityStore, MembershipPolicy};

    #[test]
    fn liveness_starts_fresh() {
        let liveness = Liveness::new();
        assert!(liveness.idle_for() < Duration::from_secs(1));
    }

    #[test]
    fn mark_resets_idle() {
        let liveness = Liveness::new();
        *liveness.last_seen.lock() = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        assert!(liveness.idle_for() >= Duration::from_secs(119));
        liveness.mark();
        assert!(liveness.idle_for() < Duration::from_secs(1));
    }

    fn hub_and_transport() -> (RealtimeHub, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::new(4));
        let hub = RealtimeHub::new(
            &pulse_settings::RealtimeSettings::default(),
            Arc::new(MembershipPolicy::allow_all()),
            Arc::new(InMemoryActivityStore::new(8)),
            transport.clone(),
        );
        (hub, transport)
    }

    #[tokio::test]
    async fn duplicate_connect_keeps_live_outbox() {
        let (hub, transport) = hub_and_transport();
        let ctx = SessionContext::authenticated("s1", Principal::new(UserId(10)));
        let (_session, mut outbox) = open_session(&ctx, &hub, &transport).await.unwrap();

        let rejected = open_session(&ctx, &hub, &transport).await;
        assert_matches!(rejected, Err(RealtimeError::DuplicateSession(_)));

        assert_eq!(transport.len(), 1);
        let frame = Arc::new(ServerFrame::heartbeat_ack(chrono::Utc::now(), None));
        transport.send(&ctx.session_id, frame).unwrap();
        assert!(outbox.try_recv().is_ok());
    }

    #[tokio::test]
    async fn rejected_connect_opens_no_outbox() {
        let (hub, transport) = hub_and_transport();
        let anonymous = SessionContext::anonymous("s1");
        assert!(open_session(&anonymous, &hub, &transport).await.is_err());
        assert!(transport.is_empty());
    }

    #[test]
    fn timing_from_config() {
        let config = ServerConfig {
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(20),
            ..ServerConfig::default()
        };
        let timing = PingTiming::from(&config);
        assert_eq!(timing.interval, Duration::from_secs(5));
        assert_eq!(timing.timeout, Duration::from_secs(20));
    }
}
