//! llmrelay Routing
//!
//! This crate provides the backend orchestration engine:
//! - Availability probing with bounded per-probe timeouts
//! - Priority-ordered candidate selection and sequential fallback
//! - Diagnostic connection tests
//! - Usage and performance telemetry with write-through persistence
//! - Periodic availability monitoring with change notifications

pub mod credentials;
pub mod monitor;
pub mod notification;
pub mod orchestrator;
pub mod probe;
pub mod telemetry;

pub use credentials::resolve_credentials;
pub use monitor::diff_snapshots;
pub use notification::{
    ChannelNotifier, CollectingNotifier, NotificationConfig, TracingNotifier,
    substitute_template_variables,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig, RoutedGeneration};
pub use probe::{AvailabilityProber, BackendProbe, StrategyProbe, candidate_order};
pub use telemetry::TelemetryLedger;
