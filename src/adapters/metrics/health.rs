//! Health and Control Server - Probes, Metrics and Manual Runs
//!
//! Exposes via axum 0.7:
//! - `GET /live`: 200 while the process is running
//! - `GET /ready`: 200 until graceful shutdown starts, then 503
//! - `GET /metrics`: Prometheus text exposition
//! - `POST /run`: run the pipeline now and return its `RunSummary`
//!   (200 all delivered, 207 partial, 502 failed or aborted)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::prometheus::MetricsRegistry;
use crate::domain::RunSummary;
use crate::ports::RunTrigger;

/// Shared health state polled by readiness probes.
#[derive(Debug)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    /// Create a new health state (ready by default).
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Flip readiness off (graceful shutdown).
    pub fn mark_not_ready(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
    trigger: Arc<dyn RunTrigger>,
}

/// Axum-based health, metrics and trigger server.
pub struct HealthServer {
    state: AppState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(
        health: Arc<HealthState>,
        metrics: Arc<MetricsRegistry>,
        trigger: Arc<dyn RunTrigger>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            state: AppState {
                health,
                metrics,
                trigger,
            },
            bind_address: bind_address.into(),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .route("/metrics", get(metrics))
            .route("/run", post(trigger_run))
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown_rx` fires.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!("Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// HTTP status for a finished run.
pub fn run_status(summary: &RunSummary) -> StatusCode {
    if summary.ok {
        StatusCode::OK
    } else if summary.is_partial() && !summary.succeeded.is_empty() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::BAD_GATEWAY
    }
}

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.health.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn trigger_run(State(state): State<AppState>) -> impl IntoResponse {
    if !state.health.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RunSummary::fatal("shutting down", 0)),
        );
    }
    info!("Manual run requested");
    let summary = state.trigger.run_once().await;
    (run_status(&summary), Json(summary))
}
