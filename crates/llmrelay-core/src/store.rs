//! Persistence collaborator traits

use crate::{Result, backend::Backend, telemetry::UsageStats};
use std::collections::HashMap;

/// Usage accumulators keyed by backend
pub type UsageMap = HashMap<Backend, UsageStats>;

/// Secure storage for opaque per-backend secrets
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a secret; `None` means "not configured"
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store or replace a secret
    async fn set(&self, key: &str, secret: &str) -> Result<()>;

    /// Remove a secret; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Load/save of the full usage map
#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    async fn load(&self) -> Result<UsageMap>;

    async fn save(&self, stats: &UsageMap) -> Result<()>;
}
