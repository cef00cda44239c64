//! Health Check, Metrics and Read-Back Endpoint
//!
//! HTTP endpoint for health checks, feed status reporting, Prometheus
//! metrics, and read-only access to the ticks the worker has published.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (a tick has been published)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /latest/{symbol}` - Latest tick for a symbol (404 if none)
//! - `GET /ticks/{symbol}?limit=N` - Recent ticks, most recent first

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SharedTickStore, StoreError};
use crate::application::services::status::{FeedMode, FeedStatus, FeedStatusSnapshot};
use crate::domain::session::SessionState;
use crate::domain::tick::normalize_symbol;
use crate::infrastructure::metrics::get_metrics_handle;

/// Default number of ticks returned by `/ticks/{symbol}`.
pub const DEFAULT_READ_LIMIT: usize = 50;

/// Upper bound on `limit` for `/ticks/{symbol}`.
pub const MAX_READ_LIMIT: usize = 1000;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Worker version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed status.
    pub feed: FeedStatusSnapshot,
    /// Store reachability.
    pub store: StoreHealth,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store reachable and the intended feed is running.
    Healthy,
    /// Ticks are flowing but not from the intended source.
    Degraded,
    /// Store unreachable.
    Unhealthy,
}

/// Store reachability.
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    /// Whether the store answered a ping.
    pub reachable: bool,
    /// Ping error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    status: Arc<FeedStatus>,
    store: SharedTickStore,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, status: Arc<FeedStatus>, store: SharedTickStore) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            status,
            store,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Build the router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/latest/{symbol}", get(latest_handler))
        .route("/ticks/{symbol}", get(recent_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let store = match state.store.ping().await {
        Ok(()) => StoreHealth {
            reachable: true,
            error: None,
        },
        Err(e) => StoreHealth {
            reachable: false,
            error: Some(e.to_string()),
        },
    };
    let feed = state.status.snapshot();

    let response = HealthResponse {
        status: determine_health_status(&feed, store.reachable),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        store,
    };

    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.status.snapshot().ticks_published > 0 {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn latest_handler(
    State(state): State<Arc<HealthServerState>>,
    Path(symbol): Path<String>,
) -> Response {
    let Some(symbol) = normalize_symbol(&symbol) else {
        return error_response(StatusCode::BAD_REQUEST, "symbol cannot be empty".to_string());
    };

    match state.store.read_latest(&symbol).await {
        Ok(Some(tick)) => Json(tick).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("no tick for {symbol}")),
        Err(e) => store_error_response(&symbol, &e),
    }
}

async fn recent_handler(
    State(state): State<Arc<HealthServerState>>,
    Path(symbol): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let Some(symbol) = normalize_symbol(&symbol) else {
        return error_response(StatusCode::BAD_REQUEST, "symbol cannot be empty".to_string());
    };
    let limit = query.limit.unwrap_or(DEFAULT_READ_LIMIT).min(MAX_READ_LIMIT);

    match state.store.read_recent(&symbol, limit).await {
        Ok(ticks) => Json(ticks).into_response(),
        Err(e) => store_error_response(&symbol, &e),
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

fn store_error_response(symbol: &str, err: &StoreError) -> Response {
    tracing::warn!(symbol, error = %err, "Read-back failed");
    error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

fn determine_health_status(feed: &FeedStatusSnapshot, store_reachable: bool) -> HealthStatus {
    if !store_reachable {
        return HealthStatus::Unhealthy;
    }

    match feed.mode {
        FeedMode::Simulated => HealthStatus::Healthy,
        FeedMode::Live if feed.session_state == Some(SessionState::Streaming.as_str()) => {
            HealthStatus::Healthy
        }
        FeedMode::Starting | FeedMode::Live | FeedMode::Fallback => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
