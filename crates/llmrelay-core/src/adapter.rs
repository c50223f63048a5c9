//! Generation adapter trait definitions

use crate::Result;
use serde::{Deserialize, Serialize};

/// Default sampling temperature for a logical generation call
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default token cap for a logical generation call
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Parameters of one logical "generate text" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Minimal deterministic request used by connection tests
    pub fn connection_test() -> Self {
        Self::new("Say 'hello' in one word")
            .with_temperature(0.1)
            .with_max_tokens(10)
    }
}

/// Text produced by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Total tokens consumed, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// Transport for one backend: performs a single generation or fails
#[async_trait::async_trait]
pub trait GenerationAdapter: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Adapters whose daemon hosts several installed models
#[async_trait::async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Names of the installed models, in the daemon's order
    async fn installed_models(&self) -> Result<Vec<String>>;

    /// Model used for generation
    fn current_model(&self) -> String;

    /// Switch the model used for subsequent generations
    fn select_model(&self, model: &str);
}
