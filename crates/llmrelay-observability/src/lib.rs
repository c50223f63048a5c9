//! llmrelay Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus)
//! - Structured logging setup
//! - Status endpoints exposing the read-only orchestration snapshot

pub mod logging;
pub mod metrics;
pub mod status;

pub use metrics::Metrics;
pub use status::{BackendStatus, StatusSource, StatusState, status_router};
