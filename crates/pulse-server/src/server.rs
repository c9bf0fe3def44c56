//! `PulseServer`: Axum HTTP + websocket front end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use pulse_core::{SessionContext, SessionId};
use pulse_realtime::{ChannelTransport, InMemoryActivityStore, MembershipPolicy, RealtimeHub};
use pulse_settings::PulseSettings;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{TokenAuthenticator, bearer};
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::ingest::ingest_activity;
use crate::metrics::{WS_REJECTED_TOTAL, render};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{PingTiming, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast core.
    pub hub: Arc<RealtimeHub>,
    /// Per-session outboxes.
    pub transport: Arc<ChannelTransport>,
    /// Recent activity for backfill.
    pub store: Arc<InMemoryActivityStore>,
    /// Token resolution.
    pub auth: Arc<TokenAuthenticator>,
    /// Listener and connection limits.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The Pulse gateway server.
pub struct PulseServer {
    state: AppState,
}

impl PulseServer {
    /// Server over explicit collaborators.
    pub fn new(
        config: ServerConfig,
        hub: Arc<RealtimeHub>,
        transport: Arc<ChannelTransport>,
        store: Arc<InMemoryActivityStore>,
        auth: TokenAuthenticator,
    ) -> Self {
        Self {
            state: AppState {
                hub,
                transport,
                store,
                auth: Arc::new(auth),
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Server wired from settings with the in-memory store and the
    /// settings-driven membership policy.
    pub fn from_settings(settings: &PulseSettings) -> Self {
        let transport = Arc::new(ChannelTransport::new(settings.server.outbound_buffer));
        let store = Arc::new(InMemoryActivityStore::new(
            settings.realtime.history_capacity,
        ));
        let access = Arc::new(MembershipPolicy::from_settings(&settings.access));
        let hub = Arc::new(RealtimeHub::new(
            &settings.realtime,
            access,
            store.clone(),
            transport.clone(),
        ));
        Self::new(
            ServerConfig::from(&settings.server),
            hub,
            transport,
            store,
            TokenAuthenticator::from_settings(&settings.auth),
        )
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Override the listener configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.state.config = Arc::new(config);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/api/activities", post(ingest_activity))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.state.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr.clone(), e))?;
        let local = listener.local_addr()?;

        let app = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server terminated with error");
            }
        });

        info!(addr = %local, "pulse server listening");
        Ok((local, handle))
    }

    /// Stop accepting work, close every session, wait for `handles`, then
    /// drain deliveries still in flight.
    pub async fn shutdown_gracefully(&self, handles: Vec<JoinHandle<()>>) {
        self.state.shutdown.graceful_shutdown(handles, None).await;
        self.state.hub.publisher().flush().await;
        info!("pulse server stopped");
    }

    /// Broadcast core.
    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.state.hub
    }

    /// Recent activity store.
    pub fn store(&self) -> &Arc<InMemoryActivityStore> {
        &self.state.store
    }

    /// Per-session outboxes.
    pub fn transport(&self) -> &Arc<ChannelTransport> {
        &self.state.transport
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Listener configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.registry().len(),
        state.hub.subscriptions().subscription_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(handle),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// GET /ws: authenticate, then upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.token.as_deref().or_else(|| bearer(&headers));
    let Some(principal) = token.and_then(|t| state.auth.resolve(t)) else {
        warn!("websocket upgrade without a valid token");
        counter!(WS_REJECTED_TOTAL, "reason" => "unauthorized").increment(1);
        return (StatusCode::UNAUTHORIZED, "missing or invalid token").into_response();
    };
    if state.shutdown.is_shutting_down() {
        counter!(WS_REJECTED_TOTAL, "reason" => "shutting_down").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }
    if state.hub.registry().len() >= state.config.max_connections {
        warn!(limit = state.config.max_connections, "connection limit reached");
        counter!(WS_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let ctx = SessionContext::authenticated(SessionId::new(), principal);
    let timing = PingTiming::from(state.config.as_ref());
    let cancel = state.shutdown.session_token();
    let hub = state.hub.clone();
    let transport = state.transport.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ctx, hub, transport, timing, cancel))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pulse_core::{ProjectId, Principal, ScopeKey, UserId};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn settings(ingest: Option<&str>) -> PulseSettings {
        let mut settings = PulseSettings::default();
        let _ = settings.auth.tokens.insert("alice".into(), 10);
        settings.auth.ingest_token = ingest.map(Into::into);
        settings.access.allow_all = true;
        settings
    }

    async fn body_json(resp: Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn ingest_request(token: Option<&str>, body: &Value) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/api/activities")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn event_json() -> Value {
        json!({
            "id": 5,
            "type": "TASK_COMPLETED",
            "description": "Fix login",
            "timestamp": "2026-03-01T12:00:00Z",
            "actorUserId": 11,
            "projectId": 7,
            "taskId": 42
        })
    }

    #[test]
    fn default_config_is_ephemeral() {
        let server = PulseServer::from_settings(&settings(None)).with_config(ServerConfig::default());
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let server = PulseServer::from_settings(&settings(None));
        let ctx = SessionContext::authenticated("s1", Principal::new(UserId(10)));
        let _ = server.hub().lifecycle().on_connect(&ctx).await.unwrap();
        let _ = server
            .hub()
            .lifecycle()
            .on_subscribe(&ctx, ScopeKey::Global, None)
            .await
            .unwrap();

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 1);
        assert_eq!(json["subscriptions"], 1);
    }

    #[tokio::test]
    async fn metrics_unavailable_without_recorder() {
        let server = PulseServer::from_settings(&settings(None));
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_rendered_with_recorder() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = PulseServer::from_settings(&settings(None)).with_metrics(handle);
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ingest_disabled_without_token() {
        let server = PulseServer::from_settings(&settings(None));
        let resp = server
            .router()
            .oneshot(ingest_request(Some("svc"), &event_json()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn ingest_rejects_bad_token() {
        let server = PulseServer::from_settings(&settings(Some("svc")));
        for token in [None, Some("wrong")] {
            let resp = server
                .router()
                .oneshot(ingest_request(token, &event_json()))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn ingest_records_and_publishes() {
        let server = PulseServer::from_settings(&settings(Some("svc")));
        let ctx = SessionContext::authenticated("s1", Principal::new(UserId(10)));
        let mut rx = server.transport().attach(&ctx.session_id);
        let _ = server.hub().lifecycle().on_connect(&ctx).await.unwrap();
        let _ = server
            .hub()
            .lifecycle()
            .on_subscribe(&ctx, ScopeKey::Project(ProjectId(7)), None)
            .await
            .unwrap();

        let resp = server
            .router()
            .oneshot(ingest_request(Some("svc"), &event_json()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp).await;
        assert_eq!(json["eventId"], 5);
        assert_eq!(json["recipients"], 1);
        assert_eq!(json["scopes"].as_array().unwrap().len(), 3);

        server.hub().publisher().flush().await;
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.kind(), "broadcastMessage");
        assert_eq!(server.store().len(), 1);
    }

    #[tokio::test]
    async fn ingest_rejects_malformed_body() {
        let server = PulseServer::from_settings(&settings(Some("svc")));
        let resp = server
            .router()
            .oneshot(ingest_request(Some("svc"), &json!({"id": "nope"})))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = PulseServer::from_settings(&settings(None));
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = PulseServer::from_settings(&settings(None)).with_config(ServerConfig::default());
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown_gracefully(vec![handle]).await;
        assert!(server.shutdown().is_shutting_down());
    }
}
