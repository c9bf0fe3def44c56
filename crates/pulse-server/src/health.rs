//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered websocket sessions.
    pub sessions: usize,
    /// Live (session, scope) subscriptions.
    pub subscriptions: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, sessions: usize, subscriptions: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        sessions,
        subscriptions,
    }
}
