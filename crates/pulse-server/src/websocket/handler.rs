//! Client frame dispatch: parses inbound text as a [`ClientFrame`] and runs
//! it through the lifecycle controller.

use metrics::counter;
use pulse_core::errors::INVALID_FRAME;
use pulse_core::protocol::AckStatus;
use pulse_core::{BroadcastMessage, ClientFrame, ServerFrame, SessionContext};
use pulse_realtime::{SessionLifecycleController, UnsubscribeTarget};
use tracing::{debug, instrument, warn};

use crate::metrics::WS_FRAMES_RECEIVED_TOTAL;

/// Handle one inbound text frame and return the replies, in send order.
///
/// Never fails: every problem becomes an error frame for the client.
#[instrument(skip_all, fields(session_id = %ctx.session_id, frame, request_id))]
pub async fn handle_frame(
    text: &str,
    ctx: &SessionContext,
    lifecycle: &SessionLifecycleController,
) -> Vec<ServerFrame> {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "invalid client frame");
            counter!(WS_FRAMES_RECEIVED_TOTAL, "type" => "invalid").increment(1);
            return vec![ServerFrame::error(
                INVALID_FRAME,
                format!("invalid frame: {e}"),
                None,
            )];
        }
    };

    let kind = frame_kind(&frame);
    let span = tracing::Span::current();
    let _ = span.record("frame", kind);
    if let Some(id) = frame.request_id() {
        let _ = span.record("request_id", id);
    }
    counter!(WS_FRAMES_RECEIVED_TOTAL, "type" => kind).increment(1);
    debug!("dispatching client frame");

    match frame {
        ClientFrame::Subscribe {
            scope,
            last_seen,
            request_id,
        } => match lifecycle.on_subscribe(ctx, scope, last_seen).await {
            Ok(outcome) => {
                let mut replies = vec![ServerFrame::subscribed(
                    outcome.scope,
                    outcome.subscription_id,
                    request_id.clone(),
                )];
                if let Some(events) = outcome.backfill {
                    replies.push(ServerFrame::RecentActivities {
                        scope: outcome.scope,
                        activities: events.iter().map(BroadcastMessage::from_event).collect(),
                        request_id,
                    });
                }
                replies
            }
            Err(error) => vec![ServerFrame::subscribe_rejected(
                Some(scope),
                &error,
                request_id,
            )],
        },

        ClientFrame::Unsubscribe {
            scope,
            all,
            request_id,
        } => {
            let target = match (all, scope) {
                (true, _) => UnsubscribeTarget::All,
                (false, Some(scope)) => UnsubscribeTarget::Scope(scope),
                (false, None) => {
                    return vec![ServerFrame::error(
                        INVALID_FRAME,
                        "unsubscribe needs a scope or all=true",
                        request_id,
                    )];
                }
            };
            match lifecycle.on_unsubscribe(ctx, target).await {
                Ok(outcome) => vec![ServerFrame::UnsubscribeAck {
                    status: AckStatus::Success,
                    removed: outcome.removed,
                    request_id,
                }],
                Err(error) => vec![ServerFrame::error(
                    error.code(),
                    error.to_string(),
                    request_id,
                )],
            }
        }

        ClientFrame::Heartbeat { request_id } => match lifecycle.on_heartbeat(ctx) {
            Ok(at) => vec![ServerFrame::heartbeat_ack(at, request_id)],
            Err(error) => vec![ServerFrame::error(
                error.code(),
                error.to_string(),
                request_id,
            )],
        },
    }
}

fn frame_kind(frame: &ClientFrame) -> &'static str {
    match frame {
        ClientFrame::Subscribe { .. } => "subscribe",
        ClientFrame::Unsubscribe { .. } => "unsubscribe",
        ClientFrame::Heartbeat { .. } => "heartbeat",
    }
}
