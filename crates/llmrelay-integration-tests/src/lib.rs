//! Shared fixtures for the llmrelay end-to-end tests
//!
//! The tests wire real HTTP adapters, the strategy probe and file-backed
//! stores together against wiremock servers.

use async_trait::async_trait;
use llmrelay_core::{Backend, BackendConfig};
use llmrelay_egress::{HttpClientConfig, ReqwestHttpCheck, create_client};
use llmrelay_routing::{BackendProbe, StrategyProbe};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_client() -> reqwest::Client {
    create_client(&HttpClientConfig::default().with_timeout_secs(5))
        .unwrap_or_else(|err| panic!("failed to build test client: {err}"))
}

/// Strategy probe restricted to `backends`; every other backend is offline.
///
/// Keeps results independent of whatever happens to run on the test host.
pub struct ScopedProbe {
    inner: StrategyProbe,
    backends: Vec<Backend>,
}

impl ScopedProbe {
    pub fn new(backends: &[Backend]) -> Self {
        Self {
            inner: StrategyProbe::new(
                Arc::new(ReqwestHttpCheck::new(test_client())),
                Duration::from_secs(2),
            ),
            backends: backends.to_vec(),
        }
    }
}

#[async_trait]
impl BackendProbe for ScopedProbe {
    async fn probe(&self, backend: Backend, config: &BackendConfig) -> bool {
        self.backends.contains(&backend) && self.inner.probe(backend, config).await
    }
}

pub fn ollama_generate_body(text: &str, prompt_tokens: u64, completion_tokens: u64) -> Value {
    json!({
        "model": "mistral:latest",
        "response": text,
        "done": true,
        "prompt_eval_count": prompt_tokens,
        "eval_count": completion_tokens
    })
}

pub fn chat_completion_body(text: &str, total_tokens: u64) -> Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }],
        "usage": { "total_tokens": total_tokens }
    })
}

/// Mount `GET <probe_path>` answering 200 so the strategy probe sees the backend
pub async fn mount_probe_ok(server: &MockServer, probe_path: &str) {
    Mock::given(method("GET"))
        .and(path(probe_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(server)
        .await;
}
