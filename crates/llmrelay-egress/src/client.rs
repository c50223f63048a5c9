//! Shared HTTP client construction and response checking

use crate::{EgressError, Result};
use reqwest::{Client, ClientBuilder, Response, StatusCode, header::RETRY_AFTER};
use std::time::Duration;
use tracing::debug;

/// Error bodies longer than this are truncated in error messages
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds. The orchestrator applies its own
    /// per-attempt deadline on top of this one.
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 8,
            user_agent: format!("llmrelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before local daemons or cloud APIs drop them
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Parse a `retry-after` header value given either as seconds or as an
/// RFC 2822 HTTP date. Past dates yield `Some(0)`.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    if let Ok(seconds) = header_value.trim().parse::<u64>() {
        return Some(seconds);
    }

    if let Ok(target_time) = chrono::DateTime::parse_from_rfc2822(header_value.trim()) {
        let seconds = target_time
            .signed_duration_since(chrono::Utc::now())
            .num_seconds();
        return Some(seconds.max(0) as u64);
    }

    debug!(header_value = header_value, "Failed to parse retry-after header");
    None
}

/// Pass successful responses through; turn anything else into an [`EgressError`]
pub(crate) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(EgressError::RateLimitExceeded { retry_after_secs });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());

    Err(EgressError::ProviderError {
        status_code: status.as_u16(),
        message: truncate(body.trim(), MAX_ERROR_BODY_CHARS),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Join a base URL and a path, tolerating a trailing slash on the base
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
