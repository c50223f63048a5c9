//! Wiring of every collaborator into one orchestrator

use crate::config::RelayConfig;
use llmrelay_core::{Backend, Notification, NotificationSink};
use llmrelay_egress::{
    AdapterFactory, HttpClientConfig, OllamaAdapter, ReqwestHttpCheck, create_client,
};
use llmrelay_observability::Metrics;
use llmrelay_routing::{Orchestrator, StrategyProbe, TelemetryLedger, resolve_credentials};
use llmrelay_storage::{FileCredentialStore, FileUsageStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Prints notifications for the user and records them as `info` events
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            title = %notification.title,
            message = %notification.message,
            "Notification"
        );
        println!("[{}] {}", notification.title, notification.message);
    }
}

pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<Metrics>,
    pub credentials: Arc<FileCredentialStore>,
    pub ollama: OllamaAdapter,
}

pub async fn build_runtime(config: &RelayConfig) -> anyhow::Result<Runtime> {
    let credentials = Arc::new(FileCredentialStore::new(config.credentials_path()));
    let configs = resolve_credentials(credentials.as_ref(), config.backend_configs()?).await;

    let client = create_client(
        &HttpClientConfig::default().with_timeout_secs(config.routing.attempt_timeout_secs),
    )?;
    let factory = AdapterFactory::new(client.clone());

    let mut adapters = factory.build_all(&configs);
    let ollama = factory.ollama(configs.get(&Backend::Ollama).unwrap_or(&Default::default()));
    adapters.insert(Backend::Ollama, Arc::new(ollama.clone()));
    debug!(
        adapters = ?adapters.keys().map(|b| b.id()).collect::<Vec<_>>(),
        "Generation adapters registered"
    );

    let probe = StrategyProbe::new(
        Arc::new(ReqwestHttpCheck::new(client)),
        Duration::from_secs(config.routing.probe_timeout_secs),
    );

    let usage_path = config.usage_path();
    info!("Loading usage stats from: {}", usage_path.display());
    let ledger = TelemetryLedger::load(Arc::new(FileUsageStore::new(usage_path))).await;

    let metrics = Arc::new(Metrics::new()?);

    let orchestrator = Orchestrator::builder(Arc::new(probe))
        .config(config.orchestrator_config())
        .active_backend(config.active_backend()?)
        .backend_configs(configs)
        .adapters(adapters)
        .ledger(ledger)
        .notifier(Arc::new(ConsoleNotifier))
        .metrics(metrics.clone())
        .model_catalog(Backend::Ollama, Arc::new(ollama.clone()))
        .build();

    Ok(Runtime {
        orchestrator,
        metrics,
        credentials,
        ollama,
    })
}
