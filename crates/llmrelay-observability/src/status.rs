//! Status endpoints
//!
//! This module provides HTTP endpoints over the read-only orchestration snapshot:
//! - `/healthz` - Liveness probe (always returns 200 OK if the process is running)
//! - `/readyz` - Readiness probe (200 if at least one backend is available)
//! - `/status` - Active backend plus per-backend availability and telemetry
//! - `/metrics` - Prometheus metrics endpoint

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::TextEncoder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::Metrics;

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Per-backend entry of the status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Backend identifier
    pub id: String,
    /// Human display name
    pub name: String,
    /// Availability as of the last probe
    pub available: bool,
    /// Attempt success rate, when any attempt was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Mean response time in seconds
    pub average_response_time: f64,
}

/// Full status document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub active_backend: String,
    /// RFC 3339 timestamp of the last probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<String>,
    pub backends: Vec<BackendStatus>,
}

/// Read-only view of orchestration state
pub trait StatusSource: Send + Sync {
    /// Identifier of the active backend
    fn active_backend(&self) -> String;

    /// RFC 3339 timestamp of the last completed probe, if any
    fn last_refresh(&self) -> Option<String>;

    /// Per-backend status rows
    fn backend_statuses(&self) -> Vec<BackendStatus>;

    /// Ready when at least one backend is available
    fn is_ready(&self) -> bool {
        self.backend_statuses().iter().any(|b| b.available)
    }
}

/// Shared state for the status router
#[derive(Clone)]
pub struct StatusState {
    /// Metrics collector
    pub metrics: Arc<Metrics>,
    /// Optional orchestration view
    pub source: Option<Arc<dyn StatusSource>>,
}

impl StatusState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            source: None,
        }
    }

    pub fn with_source(metrics: Arc<Metrics>, source: Arc<dyn StatusSource>) -> Self {
        Self {
            metrics,
            source: Some(source),
        }
    }
}

/// Create the status router
pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn readyz(State(state): State<StatusState>) -> Response {
    let ready = state.source.as_ref().is_none_or(|source| source.is_ready());
    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
        }),
    )
        .into_response()
}

async fn status_handler(State(state): State<StatusState>) -> Response {
    match &state.source {
        Some(source) => Json(StatusResponse {
            active_backend: source.active_backend(),
            last_refresh: source.last_refresh(),
            backends: source.backend_statuses(),
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Orchestration status not available",
        )
            .into_response(),
    }
}

/// Returns metrics in Prometheus text format
async fn metrics_handler(State(state): State<StatusState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", err),
        )
            .into_response(),
    }
}
