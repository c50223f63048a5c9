//! OpenAI-compatible chat completions adapter
//!
//! Serves OpenAI itself, the local OpenAI-compatible daemons and Azure
//! OpenAI deployments. Only the URL and the auth header differ.

use crate::client::{check_response, join_url};
use crate::{EgressError, Result};
use async_trait::async_trait;
use llmrelay_core::{Generation, GenerationAdapter, GenerationRequest};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, instrument};

/// Azure OpenAI REST API version used for deployment calls
pub const AZURE_API_VERSION: &str = "2024-02-01";

/// How the API key is presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// No authentication (local daemons)
    None,
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `api-key: <key>` (Azure)
    ApiKeyHeader(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// Chat completions adapter
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleAdapter {
    client: Client,
    url: String,
    model: String,
    auth: AuthStyle,
}

impl OpenAiCompatibleAdapter {
    /// Adapter posting to `{base_url}{chat_path}`
    pub fn new(
        client: Client,
        base_url: &str,
        chat_path: &str,
        model: impl Into<String>,
        auth: AuthStyle,
    ) -> Self {
        Self {
            client,
            url: join_url(base_url, chat_path),
            model: model.into(),
            auth,
        }
    }

    /// Adapter for an Azure OpenAI deployment
    pub fn azure(client: Client, endpoint: &str, deployment: &str, api_key: String) -> Self {
        let path = format!(
            "/openai/deployments/{}/chat/completions?api-version={}",
            deployment, AZURE_API_VERSION
        );
        Self::new(
            client,
            endpoint,
            &path,
            deployment,
            AuthStyle::ApiKeyHeader(api_key),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthStyle::None => builder,
            AuthStyle::Bearer(key) => builder.bearer_auth(key),
            AuthStyle::ApiKeyHeader(key) => builder.header("api-key", key),
        }
    }

    #[instrument(skip(self, request), fields(url = %self.url, model = %self.model))]
    async fn send(&self, request: &GenerationRequest) -> Result<Generation> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .authorize(self.client.post(&self.url))
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = check_response(response).await?.json().await.map_err(|e| {
            EgressError::ParseError(format!("Failed to parse chat completion: {}", e))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EgressError::ParseError("Response contained no choices".to_string()))?;

        let generation = Generation::new(text);
        Ok(match parsed.usage {
            Some(usage) => generation.with_tokens(usage.total_tokens),
            None => generation,
        })
    }
}

#[async_trait]
impl GenerationAdapter for OpenAiCompatibleAdapter {
    async fn generate(&self, request: &GenerationRequest) -> llmrelay_core::Result<Generation> {
        let start = Instant::now();
        let generation = self.send(request).await?;
        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            tokens = ?generation.tokens_used,
            "Chat completion complete"
        );
        Ok(generation)
    }
}
