//! llmrelay Egress Adapters
//!
//! This crate provides the transport side of each backend:
//! - Ollama native generation and model listing
//! - OpenAI-compatible chat completions (OpenAI, TinyLLM, TinyChat, OpenWebUI)
//! - Azure OpenAI deployments
//! - The reqwest-backed HTTP check used by availability probes

pub mod client;
pub mod factory;
pub mod health;
pub mod ollama;
pub mod openai;

pub use client::{HttpClientConfig, create_client, parse_retry_after};
pub use factory::{AdapterFactory, DEFAULT_OLLAMA_MODEL, DEFAULT_OPENAI_MODEL};
pub use health::ReqwestHttpCheck;
pub use ollama::{OllamaAdapter, OllamaModel};
pub use openai::{AuthStyle, OpenAiCompatibleAdapter};

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Provider error ({status_code}): {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for llmrelay_core::Error {
    fn from(err: EgressError) -> Self {
        use llmrelay_core::Error;

        match err {
            EgressError::HttpError(e) => Error::Transport(e.to_string()),
            EgressError::ProviderError {
                status_code: 401 | 403,
                message,
            } => Error::Auth(message),
            EgressError::ProviderError {
                status_code,
                message,
            } => Error::Transport(format!("HTTP {}: {}", status_code, message)),
            EgressError::RateLimitExceeded { retry_after_secs } => {
                Error::RateLimited { retry_after_secs }
            }
            EgressError::ParseError(msg) => Error::InvalidResponse(msg),
            EgressError::ConfigError(msg) => Error::Config(msg),
            EgressError::Timeout(secs) => Error::Timeout(Duration::from_secs(secs)),
        }
    }
}
