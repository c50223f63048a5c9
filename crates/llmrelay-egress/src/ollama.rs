//! Ollama adapter
//!
//! Generation goes through `POST /api/generate` with streaming disabled.
//! Installed models are listed from `GET /api/tags`, the same endpoint the
//! availability probe hits.

use crate::client::{check_response, join_url};
use crate::{EgressError, Result};
use async_trait::async_trait;
use llmrelay_core::{Generation, GenerationAdapter, GenerationRequest, ModelCatalog};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// An installed Ollama model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Ollama generation adapter
///
/// Clones share the selected model, so switching it through one handle is
/// seen by every other.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: Client,
    base_url: String,
    model: Arc<RwLock<String>>,
}

impl OllamaAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: Arc::new(RwLock::new(model.into())),
        }
    }

    pub fn model(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List installed models
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let response = self
            .client
            .get(join_url(&self.base_url, "/api/tags"))
            .send()
            .await?;
        let tags: TagsResponse = check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| EgressError::ParseError(format!("Failed to parse Ollama tags: {}", e)))?;

        debug!(count = tags.models.len(), "Listed Ollama models");
        Ok(tags.models)
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Generation> {
        let model = self.model();
        let body = GenerateRequest {
            model: &model,
            prompt: &request.prompt,
            system: request.system_prompt.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(join_url(&self.base_url, "/api/generate"))
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateResponse = check_response(response).await?.json().await.map_err(|e| {
            EgressError::ParseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        let generation = Generation::new(parsed.response);
        Ok(match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => generation,
            (prompt, completion) => {
                generation.with_tokens(prompt.unwrap_or(0) + completion.unwrap_or(0))
            }
        })
    }
}

#[async_trait]
impl GenerationAdapter for OllamaAdapter {
    async fn generate(&self, request: &GenerationRequest) -> llmrelay_core::Result<Generation> {
        let start = Instant::now();
        let generation = self.send(request).await?;
        debug!(
            model = %self.model(),
            latency_ms = start.elapsed().as_millis() as u64,
            tokens = ?generation.tokens_used,
            "Ollama generation complete"
        );
        Ok(generation)
    }
}

#[async_trait]
impl ModelCatalog for OllamaAdapter {
    async fn installed_models(&self) -> llmrelay_core::Result<Vec<String>> {
        Ok(self
            .list_models()
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect())
    }

    fn current_model(&self) -> String {
        self.model()
    }

    fn select_model(&self, model: &str) {
        *self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = model.to_string();
    }
}
