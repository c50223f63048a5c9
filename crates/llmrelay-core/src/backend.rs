//! Backend identifiers and the static capability table
//!
//! Every per-backend fact (display name, endpoint, cost, probe strategy,
//! adapter family, setup instructions) lives in one table indexed by
//! [`Backend`]. Nothing else in the workspace switches on the backend to
//! answer these questions.

use crate::config::CredentialField;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One interchangeable inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Ollama,
    MlxToolkit,
    TinyLlm,
    TinyChat,
    OpenWebUi,
    #[serde(rename = "openai")]
    OpenAi,
    GoogleCloud,
    Azure,
    Aws,
    IbmWatson,
}

/// Local daemon or cloud API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Cloud,
}

/// How availability is determined for a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// GET `{endpoint}{path}`; available iff the status is exactly 200.
    /// `alternate_urls` are tried in order when the primary URL fails.
    Http {
        path: &'static str,
        alternate_urls: &'static [&'static str],
    },
    /// Available iff any of the paths exists on the local filesystem
    InstalledPath(&'static [&'static str]),
    /// Available iff every listed credential field is present and non-empty
    Credentials(&'static [CredentialField]),
}

/// Which transport adapter family serves generation for a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Ollama native `/api/generate`
    Ollama,
    /// OpenAI-compatible chat completions at `{base}{path}`
    OpenAiCompatible { chat_path: &'static str },
    /// Azure OpenAI deployments (`api-key` header, deployment in the path)
    AzureOpenAi,
    /// No adapter ships with llmrelay; callers may register their own
    External,
}

/// Static metadata for a backend
#[derive(Debug, Clone, Copy)]
pub struct BackendInfo {
    pub backend: Backend,
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub kind: BackendKind,
    pub default_endpoint: Option<&'static str>,
    pub cost_per_million_tokens: f64,
    pub probe: ProbeStrategy,
    pub adapter: AdapterKind,
    /// Every credential field this backend understands
    pub credential_fields: &'static [CredentialField],
    pub setup_instructions: &'static str,
}

const OPEN_WEB_UI_ALTERNATES: &[&str] = &["http://localhost:3000/", "http://localhost:8080/"];

const PYTHON_PATHS: &[&str] = &[
    "/opt/homebrew/bin/python3",
    "/usr/local/bin/python3",
    "/usr/bin/python3",
];

/// Capability table, indexed by `Backend as usize`
static REGISTRY: [BackendInfo; 10] = [
    BackendInfo {
        backend: Backend::Ollama,
        id: "ollama",
        display_name: "Ollama",
        description: "HTTP-based API (Ollama running on localhost:11434)",
        kind: BackendKind::Local,
        default_endpoint: Some("http://localhost:11434"),
        cost_per_million_tokens: 0.0,
        probe: ProbeStrategy::Http {
            path: "/api/tags",
            alternate_urls: &[],
        },
        adapter: AdapterKind::Ollama,
        credential_fields: &[],
        setup_instructions: "1. Install: brew install ollama\n\
                             2. Start: ollama serve\n\
                             3. Pull model: ollama pull mistral:latest",
    },
    BackendInfo {
        backend: Backend::MlxToolkit,
        id: "mlx-toolkit",
        display_name: "MLX Toolkit",
        description: "Apple Silicon optimized (MLX framework)",
        kind: BackendKind::Local,
        default_endpoint: None,
        cost_per_million_tokens: 0.0,
        probe: ProbeStrategy::InstalledPath(PYTHON_PATHS),
        adapter: AdapterKind::External,
        credential_fields: &[],
        setup_instructions: "1. Install Python: brew install python\n\
                             2. Install MLX: pip install mlx-lm\n\
                             3. Path: /opt/homebrew/bin/python3",
    },
    BackendInfo {
        backend: Backend::TinyLlm,
        id: "tiny-llm",
        display_name: "TinyLLM",
        description: "TinyLLM lightweight server (localhost:8000)",
        kind: BackendKind::Local,
        default_endpoint: Some("http://localhost:8000"),
        cost_per_million_tokens: 0.0,
        probe: ProbeStrategy::Http {
            path: "/v1/models",
            alternate_urls: &[],
        },
        adapter: AdapterKind::OpenAiCompatible {
            chat_path: "/v1/chat/completions",
        },
        credential_fields: &[],
        setup_instructions: "1. Clone: git clone https://github.com/jasonacox/TinyLLM\n\
                             2. Run: docker-compose up -d\n\
                             3. Access: http://localhost:8000",
    },
    BackendInfo {
        backend: Backend::TinyChat,
        id: "tiny-chat",
        display_name: "TinyChat",
        description: "TinyChat chatbot interface (localhost:8000)",
        kind: BackendKind::Local,
        default_endpoint: Some("http://localhost:8000"),
        cost_per_million_tokens: 0.0,
        probe: ProbeStrategy::Http {
            path: "/api/health",
            alternate_urls: &[],
        },
        adapter: AdapterKind::OpenAiCompatible {
            chat_path: "/v1/chat/completions",
        },
        credential_fields: &[],
        setup_instructions: "1. Docker: docker run -p 8000:8000 jasonacox/tinychat:latest\n\
                             2. Configure backend LLM (Ollama, OpenAI, etc.)\n\
                             3. Access: http://localhost:8000",
    },
    BackendInfo {
        backend: Backend::OpenWebUi,
        id: "open-web-ui",
        display_name: "OpenWebUI",
        description: "OpenWebUI self-hosted AI platform (localhost:8080)",
        kind: BackendKind::Local,
        default_endpoint: Some("http://localhost:8080"),
        cost_per_million_tokens: 0.0,
        probe: ProbeStrategy::Http {
            path: "/",
            alternate_urls: OPEN_WEB_UI_ALTERNATES,
        },
        adapter: AdapterKind::OpenAiCompatible {
            chat_path: "/api/chat/completions",
        },
        credential_fields: &[CredentialField::ApiKey],
        setup_instructions: "1. Docker: docker run -p 3000:8080 ghcr.io/open-webui/open-webui:main\n\
                             2. Or pip: pip install open-webui && open-webui serve\n\
                             3. Access: http://localhost:8080 or http://localhost:3000",
    },
    BackendInfo {
        backend: Backend::OpenAi,
        id: "openai",
        display_name: "OpenAI",
        description: "OpenAI API (api.openai.com)",
        kind: BackendKind::Cloud,
        default_endpoint: None,
        cost_per_million_tokens: 10.0,
        probe: ProbeStrategy::Credentials(&[CredentialField::ApiKey]),
        adapter: AdapterKind::OpenAiCompatible {
            chat_path: "/chat/completions",
        },
        credential_fields: &[CredentialField::ApiKey],
        setup_instructions: "1. Sign up: https://platform.openai.com\n\
                             2. Create API Key\n\
                             3. Store it: llmrelay credentials set openai.api_key <key>",
    },
    BackendInfo {
        backend: Backend::GoogleCloud,
        id: "google-cloud",
        display_name: "Google Cloud AI",
        description: "Google Cloud AI (Vertex AI)",
        kind: BackendKind::Cloud,
        default_endpoint: None,
        cost_per_million_tokens: 7.0,
        probe: ProbeStrategy::Credentials(&[CredentialField::ApiKey]),
        adapter: AdapterKind::External,
        credential_fields: &[CredentialField::ApiKey],
        setup_instructions: "1. Enable Vertex AI: https://cloud.google.com/vertex-ai\n\
                             2. Create service account and API key\n\
                             3. Store it: llmrelay credentials set google-cloud.api_key <key>",
    },
    BackendInfo {
        backend: Backend::Azure,
        id: "azure",
        display_name: "Microsoft Azure",
        description: "Microsoft Azure OpenAI / Cognitive Services",
        kind: BackendKind::Cloud,
        default_endpoint: None,
        cost_per_million_tokens: 10.0,
        probe: ProbeStrategy::Credentials(&[CredentialField::ApiKey, CredentialField::Endpoint]),
        adapter: AdapterKind::AzureOpenAi,
        credential_fields: &[CredentialField::ApiKey, CredentialField::Endpoint],
        setup_instructions: "1. Create Azure account: https://azure.microsoft.com\n\
                             2. Create an Azure OpenAI resource and deployment\n\
                             3. Store azure.api_key and azure.endpoint",
    },
    BackendInfo {
        backend: Backend::Aws,
        id: "aws",
        display_name: "AWS AI Services",
        description: "AWS AI Services (Bedrock)",
        kind: BackendKind::Cloud,
        default_endpoint: None,
        cost_per_million_tokens: 8.0,
        probe: ProbeStrategy::Credentials(&[CredentialField::AccessKey, CredentialField::SecretKey]),
        adapter: AdapterKind::External,
        credential_fields: &[
            CredentialField::AccessKey,
            CredentialField::SecretKey,
            CredentialField::Region,
        ],
        setup_instructions: "1. Sign up: https://aws.amazon.com\n\
                             2. Create IAM user with Bedrock access\n\
                             3. Store aws.access_key, aws.secret_key and optionally aws.region",
    },
    BackendInfo {
        backend: Backend::IbmWatson,
        id: "ibm-watson",
        display_name: "IBM Watson",
        description: "IBM Watson API",
        kind: BackendKind::Cloud,
        default_endpoint: None,
        cost_per_million_tokens: 12.0,
        probe: ProbeStrategy::Credentials(&[CredentialField::ApiKey, CredentialField::ServiceUrl]),
        adapter: AdapterKind::External,
        credential_fields: &[CredentialField::ApiKey, CredentialField::ServiceUrl],
        setup_instructions: "1. Sign up: https://www.ibm.com/watson\n\
                             2. Create a watsonx.ai service\n\
                             3. Store ibm-watson.api_key and ibm-watson.service_url",
    },
];

/// Global preference order; local backends precede cloud backends
const PRIORITY_ORDER: [Backend; 10] = [
    Backend::Ollama,
    Backend::TinyChat,
    Backend::TinyLlm,
    Backend::OpenWebUi,
    Backend::MlxToolkit,
    Backend::OpenAi,
    Backend::GoogleCloud,
    Backend::Azure,
    Backend::IbmWatson,
    Backend::Aws,
];

impl Backend {
    /// Every backend, in declaration order
    pub const ALL: [Backend; 10] = [
        Backend::Ollama,
        Backend::MlxToolkit,
        Backend::TinyLlm,
        Backend::TinyChat,
        Backend::OpenWebUi,
        Backend::OpenAi,
        Backend::GoogleCloud,
        Backend::Azure,
        Backend::Aws,
        Backend::IbmWatson,
    ];

    /// Static metadata for this backend
    pub fn info(self) -> &'static BackendInfo {
        &REGISTRY[self as usize]
    }

    /// Stable identifier, e.g. `"tiny-llm"`
    pub fn id(self) -> &'static str {
        self.info().id
    }

    pub fn display_name(self) -> &'static str {
        self.info().display_name
    }

    pub fn kind(self) -> BackendKind {
        self.info().kind
    }

    pub fn is_local(self) -> bool {
        self.kind() == BackendKind::Local
    }

    pub fn default_endpoint(self) -> Option<&'static str> {
        self.info().default_endpoint
    }

    pub fn cost_per_million_tokens(self) -> f64 {
        self.info().cost_per_million_tokens
    }

    /// Estimated cost in USD for `tokens` tokens
    pub fn estimate_cost(self, tokens: u64) -> f64 {
        (tokens as f64 / 1_000_000.0) * self.cost_per_million_tokens()
    }

    /// Fixed fallback order used when no explicit preference applies
    pub fn priority_order() -> &'static [Backend] {
        &PRIORITY_ORDER
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Backend::ALL
            .into_iter()
            .find(|backend| {
                backend.id() == needle || backend.display_name().to_ascii_lowercase() == needle
            })
            .ok_or_else(|| Error::UnknownBackend(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_is_indexed_by_backend() {
        for backend in Backend::ALL {
            assert_eq!(backend.info().backend, backend);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = Backend::ALL.iter().map(|b| b.id()).collect();
        assert_eq!(ids.len(), Backend::ALL.len());
    }

    #[test]
    fn test_priority_order_covers_every_backend_once() {
        let order = Backend::priority_order();
        let unique: HashSet<_> = order.iter().copied().collect();
        assert_eq!(order.len(), Backend::ALL.len());
        assert_eq!(unique.len(), Backend::ALL.len());
    }

    #[test]
    fn test_priority_order_puts_local_before_cloud() {
        let order = Backend::priority_order();
        let first_cloud = order
            .iter()
            .position(|b| !b.is_local())
            .expect("at least one cloud backend");
        assert!(order[..first_cloud].iter().all(|b| b.is_local()));
        assert!(order[first_cloud..].iter().all(|b| !b.is_local()));
    }

    #[test]
    fn test_local_backends_are_free_and_cloud_backends_have_no_default_endpoint() {
        for backend in Backend::ALL {
            if backend.is_local() {
                assert_eq!(backend.cost_per_million_tokens(), 0.0, "{}", backend);
            } else {
                assert!(backend.default_endpoint().is_none(), "{}", backend);
                assert!(backend.cost_per_million_tokens() > 0.0, "{}", backend);
            }
        }
    }

    #[test]
    fn test_estimate_cost() {
        assert_eq!(Backend::OpenAi.estimate_cost(1_000_000), 10.0);
        assert_eq!(Backend::GoogleCloud.estimate_cost(500_000), 3.5);
        assert_eq!(Backend::Ollama.estimate_cost(1_000_000), 0.0);
    }

    #[test]
    fn test_from_str_accepts_id_and_display_name() {
        assert_eq!("tiny-llm".parse::<Backend>().unwrap(), Backend::TinyLlm);
        assert_eq!("OpenAI".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert_eq!(" ibm watson ".parse::<Backend>().unwrap(), Backend::IbmWatson);
        assert!("nope".parse::<Backend>().is_err());
    }

    #[test]
    fn test_serde_uses_ids() {
        for backend in Backend::ALL {
            let json = serde_json::to_string(&backend).unwrap();
            assert_eq!(json, format!("\"{}\"", backend.id()));
        }
    }

    #[test]
    fn test_cloud_probe_fields_are_known_credential_fields() {
        for backend in Backend::ALL {
            if let ProbeStrategy::Credentials(required) = backend.info().probe {
                for field in required {
                    assert!(
                        backend.info().credential_fields.contains(field),
                        "{} probes {:?} but does not declare it",
                        backend,
                        field
                    );
                }
            }
        }
    }
}
