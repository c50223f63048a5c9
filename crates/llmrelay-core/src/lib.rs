//! llmrelay Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout llmrelay:
//! - Backend identifiers and the static capability table
//! - Per-backend configuration and credential fields
//! - Availability snapshots, connection test results and telemetry accumulators
//! - Collaborator traits (generation adapters, HTTP checks, credential/usage stores, notifications)
//! - Core error types

pub mod adapter;
pub mod availability;
pub mod backend;
pub mod config;
pub mod error;
pub mod health;
pub mod notify;
pub mod store;
pub mod telemetry;

pub use adapter::{
    DEFAULT_MAX_TOKENS, Generation, GenerationAdapter, GenerationRequest, ModelCatalog,
};
pub use availability::{AvailabilityChange, AvailabilitySnapshot, ConnectionTestResult};
pub use backend::{AdapterKind, Backend, BackendInfo, BackendKind, ProbeStrategy};
pub use config::{
    BackendConfig, CredentialField, DEFAULT_AWS_REGION, credential_key, mask_secret,
    parse_credential_key,
};
pub use error::{Error, Result};
pub use health::HttpCheck;
pub use notify::{Notification, NotificationSink};
pub use store::{CredentialStore, UsageMap, UsageStore};
pub use telemetry::{PerformanceMetrics, UsageStats};
