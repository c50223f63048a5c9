//! Per-backend configuration
//!
//! Local backends are configured with an endpoint override; cloud backends
//! with a bundle of opaque credential fields. Secrets never appear in
//! `Debug` output.

use crate::backend::{Backend, ProbeStrategy};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One named credential field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialField {
    ApiKey,
    Endpoint,
    AccessKey,
    SecretKey,
    Region,
    ServiceUrl,
}

impl CredentialField {
    pub const ALL: [CredentialField; 6] = [
        CredentialField::ApiKey,
        CredentialField::Endpoint,
        CredentialField::AccessKey,
        CredentialField::SecretKey,
        CredentialField::Region,
        CredentialField::ServiceUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialField::ApiKey => "api_key",
            CredentialField::Endpoint => "endpoint",
            CredentialField::AccessKey => "access_key",
            CredentialField::SecretKey => "secret_key",
            CredentialField::Region => "region",
            CredentialField::ServiceUrl => "service_url",
        }
    }

    /// Whether the value is a secret (masked when displayed)
    pub fn is_secret(self) -> bool {
        matches!(
            self,
            CredentialField::ApiKey | CredentialField::AccessKey | CredentialField::SecretKey
        )
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CredentialField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| Error::Config(format!("Unknown credential field '{}'", s)))
    }
}

/// Stable credential-store key for a backend field, e.g. `"azure.endpoint"`
pub fn credential_key(backend: Backend, field: CredentialField) -> String {
    format!("{}.{}", backend.id(), field.as_str())
}

/// Parse a credential-store key back into its backend and field
pub fn parse_credential_key(key: &str) -> Result<(Backend, CredentialField), Error> {
    let (backend, field) = key
        .split_once('.')
        .ok_or_else(|| Error::Config(format!("Credential key '{}' must be <backend>.<field>", key)))?;
    let backend: Backend = backend.parse()?;
    let field: CredentialField = field.parse()?;
    if !backend.info().credential_fields.contains(&field) {
        return Err(Error::Config(format!(
            "Backend '{}' has no credential field '{}'",
            backend, field
        )));
    }
    Ok((backend, field))
}

/// Default AWS region when none is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Mutable configuration for one backend
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Endpoint URL override (local backends)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model or deployment name for adapters that need one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Credential bundle (cloud backends)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<CredentialField, String>,
}

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_credential(mut self, field: CredentialField, value: impl Into<String>) -> Self {
        self.credentials.insert(field, value.into());
        self
    }

    /// Endpoint to use: the override when set and non-empty, else the backend default
    pub fn effective_endpoint<'a>(&'a self, backend: Backend) -> Option<&'a str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(backend.default_endpoint())
    }

    /// A credential value, treating empty strings as absent
    pub fn credential(&self, field: CredentialField) -> Option<&str> {
        self.credentials
            .get(&field)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// AWS region with the documented default applied
    pub fn region(&self) -> &str {
        self.credential(CredentialField::Region)
            .unwrap_or(DEFAULT_AWS_REGION)
    }

    /// Whether every field in `required` is present and non-empty
    pub fn has_credentials(&self, required: &[CredentialField]) -> bool {
        required.iter().all(|field| self.credential(*field).is_some())
    }

    /// Configuration-only availability check used for cloud backends.
    ///
    /// Returns `None` for backends whose availability needs a live probe.
    pub fn credentials_satisfied(&self, backend: Backend) -> Option<bool> {
        match backend.info().probe {
            ProbeStrategy::Credentials(required) => Some(self.has_credentials(required)),
            _ => None,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credentials: BTreeMap<_, _> = self
            .credentials
            .iter()
            .map(|(field, value)| {
                let shown = if field.is_secret() {
                    mask_secret(value)
                } else {
                    value.clone()
                };
                (*field, shown)
            })
            .collect();

        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credentials", &credentials)
            .finish()
    }
}

/// Mask a secret for display, keeping at most the last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
