//! reqwest-backed HTTP check

use async_trait::async_trait;
use llmrelay_core::HttpCheck;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// [`HttpCheck`] over a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestHttpCheck {
    client: Client,
}

impl ReqwestHttpCheck {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpCheck for ReqwestHttpCheck {
    async fn get_ok(&self, url: &str, timeout: Duration) -> bool {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => {
                let ok = response.status() == StatusCode::OK;
                debug!(url = %url, status = response.status().as_u16(), ok, "HTTP check");
                ok
            }
            Err(err) => {
                debug!(url = %url, error = %err, "HTTP check failed");
                false
            }
        }
    }
}
