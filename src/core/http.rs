//! HTTP status server using Axum

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, Level};

use crate::core::dispatcher::DispatchHandle;
use crate::core::supervisor::SessionRegistry;
use crate::metrics::Metrics;
use crate::models::SeriesSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub sessions: Option<SessionRegistry>,
    pub dispatch: Option<DispatchHandle>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics,
            start_time: Arc::new(Instant::now()),
            sessions: None,
            dispatch: None,
        }
    }

    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchHandle) -> Self {
        self.dispatch = Some(dispatch);
        self
    }
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let degraded = state
        .dispatch
        .as_ref()
        .map(|d| d.stats().degraded)
        .unwrap_or(false);
    let status = if degraded { "degraded" } else { health.status.as_str() };

    Ok(Json(json!({
        "status": status,
        "uptime_seconds": uptime_seconds,
        "service": "breakout-scanner",
        "sessions": state.sessions.as_ref().map(|s| s.len()).unwrap_or(0),
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Aggregate and per-symbol session states
async fn list_sessions(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let status = sessions.status();
    let dispatch = state.dispatch.as_ref().map(|d| {
        let stats = d.stats();
        json!({
            "enqueued": stats.enqueued,
            "delivered": stats.delivered,
            "queue_full": stats.queue_full,
            "timeouts": stats.timeouts,
            "dropped": stats.dropped,
            "sink_errors": stats.sink_errors,
            "degraded": stats.degraded,
        })
    });

    Ok(Json(json!({
        "running": status.running,
        "closed": status.closed,
        "failed": status.failed,
        "sessions": status.sessions,
        "dispatcher": dispatch,
    })))
}

/// Latest snapshot for one symbol
async fn get_session(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let symbol = symbol.to_uppercase();
    let session_state = sessions.state(&symbol).ok_or(StatusCode::NOT_FOUND)?;
    let snapshot: Option<SeriesSnapshot> = sessions.snapshot(&symbol);
    debug!(symbol = %symbol, has_snapshot = snapshot.is_some(), "Serving session snapshot");

    Ok(Json(json!({
        "symbol": symbol,
        "state": session_state.name(),
        "reason": session_state.failure().map(|e| e.to_string()),
        "snapshot": snapshot,
    })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{symbol}", get(get_session))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
