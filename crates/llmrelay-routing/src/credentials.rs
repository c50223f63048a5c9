//! Filling backend configs from the credential store

use llmrelay_core::{Backend, BackendConfig, CredentialStore, credential_key};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Complete `configs` with credentials from `store`.
///
/// Values already present in a config (for example from the environment)
/// take precedence; the store only fills fields that are missing or empty.
/// Every backend gets an entry in the result. A key the store fails to read
/// is logged and left unset, so one corrupt entry never blocks startup.
pub async fn resolve_credentials(
    store: &dyn CredentialStore,
    mut configs: HashMap<Backend, BackendConfig>,
) -> HashMap<Backend, BackendConfig> {
    for backend in Backend::ALL {
        let config = configs.entry(backend).or_default();
        for field in backend.info().credential_fields {
            if config.credential(*field).is_some() {
                continue;
            }
            let key = credential_key(backend, *field);
            match store.get(&key).await {
                Ok(Some(secret)) => {
                    debug!(key = %key, "Loaded credential from store");
                    config.credentials.insert(*field, secret);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "Failed to read credential, treating it as not configured");
                }
            }
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llmrelay_core::{CredentialField, Error, Result};

    struct MapStore(HashMap<String, String>);

    #[async_trait]
    impl CredentialStore for MapStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.0.get(key).cloned())
        }

        async fn set(&self, _key: &str, _secret: &str) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_fills_missing_fields_only() {
        let store = MapStore(HashMap::from([
            ("openai.api_key".to_string(), "from-store".to_string()),
            ("azure.api_key".to_string(), "azure-store".to_string()),
            ("azure.endpoint".to_string(), "https://store.azure.com".to_string()),
        ]));

        let mut configs = HashMap::new();
        configs.insert(
            Backend::OpenAi,
            BackendConfig::default().with_credential(CredentialField::ApiKey, "from-env"),
        );

        let resolved = resolve_credentials(&store, configs).await;

        assert_eq!(resolved.len(), Backend::ALL.len());
        assert_eq!(
            resolved[&Backend::OpenAi].credential(CredentialField::ApiKey),
            Some("from-env")
        );
        assert_eq!(
            resolved[&Backend::Azure].credential(CredentialField::Endpoint),
            Some("https://store.azure.com")
        );
        assert!(resolved[&Backend::Aws].credentials.is_empty());
    }

    /// Fails for one key, answers the rest from a map
    struct FlakyStore {
        broken_key: &'static str,
        inner: MapStore,
    }

    #[async_trait]
    impl CredentialStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            if key == self.broken_key {
                return Err(Error::Storage("credential file is corrupt".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, _key: &str, _secret: &str) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_credential_is_left_unset() {
        let store = FlakyStore {
            broken_key: "openai.api_key",
            inner: MapStore(HashMap::from([
                ("openai.api_key".to_string(), "never-seen".to_string()),
                ("ibm-watson.api_key".to_string(), "watson-key".to_string()),
            ])),
        };

        let resolved = resolve_credentials(&store, HashMap::new()).await;

        assert_eq!(resolved.len(), Backend::ALL.len());
        assert!(resolved[&Backend::OpenAi].credentials.is_empty());
        assert_eq!(
            resolved[&Backend::IbmWatson].credential(CredentialField::ApiKey),
            Some("watson-key")
        );
    }
}
