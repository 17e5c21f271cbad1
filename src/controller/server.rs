//! # HTTP Server
//!
//! HTTP server for metrics, health checks, and Kubernetes probes.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 when controller is ready)
//! - `/state` - Latest controller state published to dependent controllers
//!
//! The server runs on port 8080 by default (configurable via `METRICS_PORT` environment variable).

use crate::controller::publisher::{ControllerState, StatePublisher};
use crate::observability::metrics::REGISTRY;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub publisher: StatePublisher,
}

impl ServerState {
    pub fn new(publisher: StatePublisher) -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
            publisher,
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/state", get(state_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve; the controller is marked ready once the listener is bound
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn state_handler(State(state): State<Arc<ServerState>>) -> Json<ControllerState> {
    Json(state.publisher.current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readyz_follows_flag() {
        let state = Arc::new(ServerState::new(StatePublisher::new()));
        let response = readyz_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.is_ready.store(true, Ordering::Relaxed);
        let response = readyz_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_state_returns_latest_fact() {
        let publisher = StatePublisher::new();
        let state = Arc::new(ServerState::new(publisher.clone()));
        publisher.publish(ControllerState {
            admin_url: "http://grafana-service:3000".to_string(),
            grafana_ready: true,
            client_timeout: 5,
            ..ControllerState::default()
        });

        let Json(current) = state_handler(State(state)).await;
        assert!(current.grafana_ready);
        assert_eq!(current.admin_url, "http://grafana-service:3000");
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        assert_eq!(healthz_handler().await.into_response().status(), StatusCode::OK);
    }
}
