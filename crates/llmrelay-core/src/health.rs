//! HTTP reachability collaborator used by availability probes

use async_trait::async_trait;
use std::time::Duration;

/// Lightweight `GET` check against a health or listing endpoint
#[async_trait]
pub trait HttpCheck: Send + Sync {
    /// True iff `GET url` answered with status exactly 200 within `timeout`.
    ///
    /// Transport errors (DNS, refused connection, timeout) yield `false`.
    async fn get_ok(&self, url: &str, timeout: Duration) -> bool;
}
