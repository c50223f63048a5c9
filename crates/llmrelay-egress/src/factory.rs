//! Builds generation adapters from the capability table and backend configs

use crate::ollama::OllamaAdapter;
use crate::openai::{AuthStyle, OpenAiCompatibleAdapter};
use llmrelay_core::{AdapterKind, Backend, BackendConfig, CredentialField, GenerationAdapter};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:latest";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model name sent to OpenAI-compatible local daemons that ignore it
const LOCAL_MODEL_PLACEHOLDER: &str = "default";

/// Creates adapters sharing one pooled HTTP client
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    client: Client,
}

impl AdapterFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Ollama adapter for `config`, with default endpoint and model applied
    pub fn ollama(&self, config: &BackendConfig) -> OllamaAdapter {
        let base_url = config
            .effective_endpoint(Backend::Ollama)
            .unwrap_or("http://localhost:11434");
        let model = config.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
        OllamaAdapter::new(self.client.clone(), base_url, model)
    }

    /// Adapter for `backend`, or `None` when no built-in adapter serves it
    /// or its configuration lacks what the adapter needs.
    pub fn build(
        &self,
        backend: Backend,
        config: &BackendConfig,
    ) -> Option<Arc<dyn GenerationAdapter>> {
        match backend.info().adapter {
            AdapterKind::Ollama => Some(Arc::new(self.ollama(config))),
            AdapterKind::OpenAiCompatible { chat_path } => {
                let base_url = config.effective_endpoint(backend).or(match backend {
                    Backend::OpenAi => Some(OPENAI_BASE_URL),
                    _ => None,
                })?;
                let auth = match config.credential(CredentialField::ApiKey) {
                    Some(key) => AuthStyle::Bearer(key.to_string()),
                    None => AuthStyle::None,
                };
                let model = config.model.as_deref().unwrap_or(match backend {
                    Backend::OpenAi => DEFAULT_OPENAI_MODEL,
                    _ => LOCAL_MODEL_PLACEHOLDER,
                });
                Some(Arc::new(OpenAiCompatibleAdapter::new(
                    self.client.clone(),
                    base_url,
                    chat_path,
                    model,
                    auth,
                )))
            }
            AdapterKind::AzureOpenAi => {
                let endpoint = config
                    .credential(CredentialField::Endpoint)
                    .or(config.endpoint.as_deref())?;
                let api_key = config.credential(CredentialField::ApiKey)?;
                let deployment = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
                Some(Arc::new(OpenAiCompatibleAdapter::azure(
                    self.client.clone(),
                    endpoint,
                    deployment,
                    api_key.to_string(),
                )))
            }
            AdapterKind::External => None,
        }
    }

    /// Adapters for every backend that has one
    pub fn build_all(
        &self,
        configs: &HashMap<Backend, BackendConfig>,
    ) -> HashMap<Backend, Arc<dyn GenerationAdapter>> {
        let empty = BackendConfig::default();
        Backend::ALL
            .into_iter()
            .filter_map(|backend| {
                let config = configs.get(&backend).unwrap_or(&empty);
                let adapter = self.build(backend, config);
                if adapter.is_none() {
                    debug!(backend = %backend, "No built-in adapter for backend");
                }
                adapter.map(|adapter| (backend, adapter))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> AdapterFactory {
        AdapterFactory::new(Client::new())
    }

    #[test]
    fn test_ollama_defaults() {
        let adapter = factory().ollama(&BackendConfig::default());
        assert_eq!(adapter.base_url(), "http://localhost:11434");
        assert_eq!(adapter.model(), DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn test_local_backends_always_get_adapters() {
        let factory = factory();
        for backend in [Backend::Ollama, Backend::TinyLlm, Backend::TinyChat, Backend::OpenWebUi] {
            assert!(
                factory.build(backend, &BackendConfig::default()).is_some(),
                "{} should have an adapter",
                backend
            );
        }
    }

    #[test]
    fn test_external_backends_have_no_adapter() {
        let factory = factory();
        let config = BackendConfig::default().with_credential(CredentialField::ApiKey, "k");
        assert!(factory.build(Backend::GoogleCloud, &config).is_none());
        assert!(factory.build(Backend::MlxToolkit, &config).is_none());
    }

    #[test]
    fn test_azure_requires_endpoint_and_key() {
        let factory = factory();
        let key_only = BackendConfig::default().with_credential(CredentialField::ApiKey, "k");
        assert!(factory.build(Backend::Azure, &key_only).is_none());

        let complete = key_only.with_credential(CredentialField::Endpoint, "https://x.azure.com");
        assert!(factory.build(Backend::Azure, &complete).is_some());
    }

    #[test]
    fn test_build_all_skips_backends_without_adapters() {
        let adapters = factory().build_all(&HashMap::new());
        assert!(adapters.contains_key(&Backend::Ollama));
        assert!(adapters.contains_key(&Backend::OpenAi));
        assert!(!adapters.contains_key(&Backend::Azure));
        assert!(!adapters.contains_key(&Backend::Aws));
    }
}
