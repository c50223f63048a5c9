//! Credential stores
//!
//! Keys are opaque strings of the form `<backend-id>.<field>`. Absence of a
//! key means "not configured"; deleting an absent key succeeds.

use crate::atomic_writer::write_json;
use crate::error::{StorageError, StorageResult};
use dashmap::DashMap;
use llmrelay_core::CredentialStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Credentials kept in a JSON file readable only by its owner
///
/// Every mutation rewrites the whole file atomically. The lock serializes
/// read-modify-write cycles within this process.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            StorageError::InvalidData(format!(
                "Credential file {} is not a JSON object of strings: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_all(&self, secrets: BTreeMap<String, String>) -> StorageResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_json(&path, &secrets, true))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> llmrelay_core::Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, secret: &str) -> llmrelay_core::Result<()> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.read_all().await?;
        secrets.insert(key.to_string(), secret.to_string());
        self.write_all(secrets).await?;
        tracing::debug!(key = %key, "Stored credential");
        Ok(())
    }

    async fn delete(&self, key: &str) -> llmrelay_core::Result<()> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.read_all().await?;
        if secrets.remove(key).is_some() {
            self.write_all(secrets).await?;
            tracing::debug!(key = %key, "Deleted credential");
        }
        Ok(())
    }
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: DashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `(key, secret)` pairs
    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (key, secret) in secrets {
            store.secrets.insert(key.into(), secret.into());
        }
        store
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> llmrelay_core::Result<Option<String>> {
        Ok(self.secrets.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, secret: &str) -> llmrelay_core::Result<()> {
        self.secrets.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> llmrelay_core::Result<()> {
        self.secrets.remove(key);
        Ok(())
    }
}
