//! `POST /api/activities`: the post-commit hook for services running out of
//! process. A committed activity is recorded for backfill and then handed to
//! the publisher.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use pulse_core::{ActivityEvent, ActivityId, ScopeKey};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::{IngestAuth, bearer};
use crate::metrics::INGEST_REQUESTS_TOTAL;
use crate::server::AppState;

/// Body of a successful ingest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// The published event.
    pub event_id: ActivityId,
    /// Scopes the event resolved to.
    pub scopes: Vec<ScopeKey>,
    /// Sessions a delivery was dispatched to.
    pub recipients: usize,
}

fn reject(status: StatusCode, outcome: &'static str, message: String) -> Response {
    counter!(INGEST_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/activities
pub async fn ingest_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ActivityEvent>, JsonRejection>,
) -> Response {
    match state.auth.check_ingest(bearer(&headers)) {
        IngestAuth::Allowed => {}
        IngestAuth::Denied => {
            warn!("ingest request with missing or invalid token");
            return reject(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid ingest token".into(),
            );
        }
        IngestAuth::Disabled => {
            return reject(
                StatusCode::SERVICE_UNAVAILABLE,
                "disabled",
                "ingest is not configured".into(),
            );
        }
    }

    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return reject(rejection.status(), "invalid", rejection.body_text());
        }
    };

    state.store.record(event.clone());
    let report = state.hub.publisher().publish(&event);
    debug!(event_id = %event.id, recipients = report.recipients, "activity ingested");
    counter!(INGEST_REQUESTS_TOTAL, "outcome" => "accepted").increment(1);

    (
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            event_id: event.id,
            scopes: report.scopes,
            recipients: report.recipients,
        }),
    )
        .into_response()
}
