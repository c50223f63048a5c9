//! Error types for llmrelay Core

use crate::backend::Backend;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Generation failures (per attempt)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No generation adapter registered for {0}")]
    AdapterMissing(Backend),

    // Terminal fallback failure
    #[error(
        "No backend available ({attempted} attempted){}",
        source.as_ref().map(|e| format!(": last error: {}", e)).unwrap_or_default()
    )]
    NoBackendAvailable {
        attempted: usize,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    // Configuration and persistence
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the terminal "no backend available" condition
    pub fn is_no_backend_available(&self) -> bool {
        matches!(self, Error::NoBackendAvailable { .. })
    }

    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Auth(_) => "auth",
            Error::RateLimited { .. } => "rate_limited",
            Error::Timeout(_) => "timeout",
            Error::InvalidResponse(_) => "invalid_response",
            Error::AdapterMissing(_) => "adapter_missing",
            Error::NoBackendAvailable { .. } => "no_backend_available",
            Error::UnknownBackend(_) => "unknown_backend",
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_rate_limited_display() {
        let err = Error::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded: retry after 30s");

        let err = Error::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_no_backend_available_wraps_last_error() {
        let err = Error::NoBackendAvailable {
            attempted: 2,
            source: Some(Box::new(Error::Transport("connection refused".to_string()))),
        };

        assert!(err.is_no_backend_available());
        assert_eq!(
            err.to_string(),
            "No backend available (2 attempted): last error: Transport error: connection refused"
        );
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_no_backend_available_without_source() {
        let err = Error::NoBackendAvailable {
            attempted: 0,
            source: None,
        };
        assert_eq!(err.to_string(), "No backend available (0 attempted)");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Request timed out after 1500ms");
        assert_eq!(err.kind(), "timeout");
    }
}
