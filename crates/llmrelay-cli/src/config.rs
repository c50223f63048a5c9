use llmrelay_core::{Backend, BackendConfig, CredentialField};
use llmrelay_routing::{NotificationConfig, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Provider credential variables, which take precedence over stored credentials
const CREDENTIAL_ENV_VARS: &[(&str, Backend, CredentialField)] = &[
    ("OPENAI_API_KEY", Backend::OpenAi, CredentialField::ApiKey),
    ("GOOGLE_CLOUD_API_KEY", Backend::GoogleCloud, CredentialField::ApiKey),
    ("AZURE_API_KEY", Backend::Azure, CredentialField::ApiKey),
    ("AZURE_ENDPOINT", Backend::Azure, CredentialField::Endpoint),
    ("AWS_ACCESS_KEY_ID", Backend::Aws, CredentialField::AccessKey),
    ("AWS_SECRET_ACCESS_KEY", Backend::Aws, CredentialField::SecretKey),
    ("AWS_REGION", Backend::Aws, CredentialField::Region),
    ("IBM_WATSON_API_KEY", Backend::IbmWatson, CredentialField::ApiKey),
    ("IBM_WATSON_URL", Backend::IbmWatson, CredentialField::ServiceUrl),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_active_backend")]
    pub active_backend: String,

    /// Per-backend settings keyed by backend id
    #[serde(default)]
    pub backends: BTreeMap<String, BackendSettings>,

    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    #[serde(default = "default_usage_path")]
    pub usage_path: String,

    #[serde(default)]
    pub routing: RoutingSettings,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub status: StatusConfig,

    /// Credentials taken from the environment
    #[serde(skip)]
    pub env_credentials: BTreeMap<Backend, BTreeMap<CredentialField, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    #[serde(default = "default_false")]
    pub restore_selection_after_fallback: bool,

    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            active_backend: default_active_backend(),
            backends: BTreeMap::new(),
            credentials_path: default_credentials_path(),
            usage_path: default_usage_path(),
            routing: RoutingSettings::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
            status: StatusConfig::default(),
            env_credentials: BTreeMap::new(),
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            restore_selection_after_fallback: false,
            attempt_timeout_secs: default_attempt_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl RelayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the runtime cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("routing.attempt_timeout_secs", self.routing.attempt_timeout_secs),
            ("routing.probe_timeout_secs", self.routing.probe_timeout_secs),
            ("routing.monitor_interval_secs", self.routing.monitor_interval_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        Ok(())
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LLMRELAY_ACTIVE_BACKEND") {
            self.active_backend = val;
        }

        if let Some(val) = var("LLMRELAY_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(val) = var("LLMRELAY_MONITOR_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => self.routing.monitor_interval_secs = secs,
                _ => eprintln!(
                    "Warning: Invalid LLMRELAY_MONITOR_INTERVAL_SECS '{}', using {}",
                    val, self.routing.monitor_interval_secs
                ),
            }
        }

        if let Some(val) = var("LLMRELAY_USAGE_PATH") {
            self.usage_path = val;
        }

        if let Some(val) = var("LLMRELAY_CREDENTIALS_PATH") {
            self.credentials_path = val;
        }

        // Provider credentials (no LLMRELAY_ prefix for these)
        for (name, backend, field) in CREDENTIAL_ENV_VARS {
            if let Some(val) = var(name).filter(|v| !v.trim().is_empty()) {
                self.env_credentials
                    .entry(*backend)
                    .or_default()
                    .insert(*field, val);
            }
        }
    }

    pub fn active_backend(&self) -> llmrelay_core::Result<Backend> {
        self.active_backend.parse()
    }

    /// Backend configs from file settings and environment credentials
    pub fn backend_configs(&self) -> llmrelay_core::Result<HashMap<Backend, BackendConfig>> {
        let mut configs: HashMap<Backend, BackendConfig> = HashMap::new();

        for (id, settings) in &self.backends {
            let backend: Backend = id.parse()?;
            let config = configs.entry(backend).or_default();
            config.endpoint = settings.endpoint.clone();
            config.model = settings.model.clone();
        }

        for (backend, credentials) in &self.env_credentials {
            configs
                .entry(*backend)
                .or_default()
                .credentials
                .extend(credentials.clone());
        }

        Ok(configs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            restore_selection_after_fallback: self.routing.restore_selection_after_fallback,
            attempt_timeout: Duration::from_secs(self.routing.attempt_timeout_secs),
            probe_timeout: Duration::from_secs(self.routing.probe_timeout_secs),
            monitor_interval: Duration::from_secs(self.routing.monitor_interval_secs),
            notifications: self.notifications.clone(),
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        expand_path(&self.credentials_path)
    }

    pub fn usage_path(&self) -> PathBuf {
        expand_path(&self.usage_path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn default_active_backend() -> String {
    Backend::Ollama.id().to_string()
}

fn default_credentials_path() -> String {
    "~/.llmrelay/credentials.json".to_string()
}

fn default_usage_path() -> String {
    "~/.llmrelay/usage.json".to_string()
}

fn default_attempt_timeout_secs() -> u64 {
    120
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_monitor_interval_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9464
}

fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.active_backend().unwrap(), Backend::Ollama);
        assert_eq!(config.routing.attempt_timeout_secs, 120);
        assert_eq!(config.routing.probe_timeout_secs, 5);
        assert!(!config.routing.restore_selection_after_fallback);
        assert!(config.notifications.enabled);
        assert!(!config.credentials_path().starts_with("~"));
    }

    #[test]
    fn test_yaml_file_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
active_backend: openai
backends:
  ollama:
    endpoint: http://gpu-box:11434
    model: llama3:8b
routing:
  restore_selection_after_fallback: true
notifications:
  fallback_template: "${{original_backend}} -> ${{new_backend}}"
"#
        )
        .unwrap();

        let config = RelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.active_backend().unwrap(), Backend::OpenAi);
        assert!(config.routing.restore_selection_after_fallback);
        assert_eq!(config.routing.monitor_interval_secs, 60);
        assert_eq!(
            config.notifications.fallback_template,
            "${original_backend} -> ${new_backend}"
        );

        let configs = config.backend_configs().unwrap();
        let ollama = &configs[&Backend::Ollama];
        assert_eq!(ollama.endpoint.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(ollama.model.as_deref(), Some("llama3:8b"));
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
active_backend = "tiny-chat"

[routing]
attempt_timeout_secs = 30

[status]
port = 8099
"#
        )
        .unwrap();

        let config = RelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.active_backend().unwrap(), Backend::TinyChat);
        assert_eq!(
            config.orchestrator_config().attempt_timeout,
            Duration::from_secs(30)
        );
        assert_eq!(config.status.port, 8099);
        assert_eq!(config.status.host, "127.0.0.1");
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "routing:\n  monitor_interval_secs: 0").unwrap();
        let err = RelayConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("routing.monitor_interval_secs"));

        let mut config = RelayConfig::default();
        assert!(config.validate().is_ok());
        config.routing.attempt_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.routing.probe_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_id_is_rejected() {
        let mut config = RelayConfig::default();
        config
            .backends
            .insert("not-a-backend".to_string(), BackendSettings::default());
        assert!(config.backend_configs().is_err());

        config.active_backend = "nope".to_string();
        assert!(config.active_backend().is_err());
    }

    #[test]
    fn test_env_credentials_land_in_backend_configs() {
        let mut config = RelayConfig::default();
        config.merge_vars(vars(&[
            ("OPENAI_API_KEY", "sk-env"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AZURE_API_KEY", "  "),
        ]));

        let configs = config.backend_configs().unwrap();
        assert_eq!(
            configs[&Backend::OpenAi].credential(CredentialField::ApiKey),
            Some("sk-env")
        );
        assert!(configs[&Backend::Aws].has_credentials(&[
            CredentialField::AccessKey,
            CredentialField::SecretKey
        ]));
        assert!(!configs.contains_key(&Backend::Azure));
    }

    #[test]
    fn test_invalid_monitor_interval_is_ignored() {
        let mut config = RelayConfig::default();
        config.merge_vars(vars(&[("LLMRELAY_MONITOR_INTERVAL_SECS", "0")]));
        assert_eq!(config.routing.monitor_interval_secs, 60);

        config.merge_vars(vars(&[("LLMRELAY_MONITOR_INTERVAL_SECS", "15")]));
        assert_eq!(config.routing.monitor_interval_secs, 15);
    }

    #[test]
    #[serial]
    fn test_merge_env_reads_process_environment() {
        // SAFETY: serialized with other environment-mutating tests
        unsafe {
            std::env::set_var("LLMRELAY_ACTIVE_BACKEND", "azure");
            std::env::set_var("LLMRELAY_USAGE_PATH", "/tmp/llmrelay-usage.json");
        }

        let mut config = RelayConfig::default();
        config.merge_env();

        unsafe {
            std::env::remove_var("LLMRELAY_ACTIVE_BACKEND");
            std::env::remove_var("LLMRELAY_USAGE_PATH");
        }

        assert_eq!(config.active_backend().unwrap(), Backend::Azure);
        assert_eq!(
            config.usage_path(),
            PathBuf::from("/tmp/llmrelay-usage.json")
        );
    }
}
