//! Orchestration context
//!
//! The [`Orchestrator`] owns every per-backend map (configs, availability,
//! telemetry, connection test results) and the active selection. It is
//! constructed once and shared as `Arc<Orchestrator>`; collaborators only
//! ever receive copies of its state.
//!
//! A logical generation call walks the candidate list sequentially: the
//! active backend first when available, then the remaining available
//! backends in priority order. The first success ends the call; when every
//! candidate fails the call ends with [`Error::NoBackendAvailable`].

use crate::monitor::{MonitorTask, diff_snapshots};
use crate::notification::{self, NotificationConfig, TracingNotifier};
use crate::probe::{AvailabilityProber, BackendProbe, DEFAULT_PROBE_TIMEOUT, candidate_order};
use crate::telemetry::TelemetryLedger;
use dashmap::DashMap;
use llmrelay_core::{
    AvailabilityChange, AvailabilitySnapshot, Backend, BackendConfig, ConnectionTestResult, Error,
    Generation, GenerationAdapter, GenerationRequest, ModelCatalog, Notification,
    NotificationSink, Result,
};
use llmrelay_observability::{BackendStatus, Metrics, StatusSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default bound for one generation attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between monitor probe cycles
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Routing behaviour
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Put the original selection back after a call was answered by a fallback
    pub restore_selection_after_fallback: bool,
    /// Deadline for one generation attempt
    pub attempt_timeout: Duration,
    /// Deadline for one backend's probe
    pub probe_timeout: Duration,
    /// Interval between monitor probe cycles
    pub monitor_interval: Duration,
    pub notifications: NotificationConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            restore_selection_after_fallback: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            notifications: NotificationConfig::default(),
        }
    }
}

/// Result of a successful logical call
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedGeneration {
    pub generation: Generation,
    /// Backend that answered
    pub backend: Backend,
    /// Active selection at call start, when a different backend answered
    pub fallback_from: Option<Backend>,
    /// Number of backends attempted, including the one that answered
    pub attempted: usize,
    pub response_time: Duration,
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    probe: Arc<dyn BackendProbe>,
    config: OrchestratorConfig,
    active: Backend,
    adapters: HashMap<Backend, Arc<dyn GenerationAdapter>>,
    configs: HashMap<Backend, BackendConfig>,
    ledger: Option<TelemetryLedger>,
    notifier: Option<Arc<dyn NotificationSink>>,
    metrics: Option<Arc<Metrics>>,
    model_catalogs: Vec<(Backend, Arc<dyn ModelCatalog>)>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial active selection
    pub fn active_backend(mut self, backend: Backend) -> Self {
        self.active = backend;
        self
    }

    pub fn adapter(mut self, backend: Backend, adapter: Arc<dyn GenerationAdapter>) -> Self {
        self.adapters.insert(backend, adapter);
        self
    }

    pub fn adapters(mut self, adapters: HashMap<Backend, Arc<dyn GenerationAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    pub fn backend_configs(mut self, configs: HashMap<Backend, BackendConfig>) -> Self {
        self.configs = configs;
        self
    }

    pub fn ledger(mut self, ledger: TelemetryLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reconcile `backend`'s model against its installed models after each probe
    pub fn model_catalog(mut self, backend: Backend, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.model_catalogs.push((backend, catalog));
        self
    }

    pub fn build(self) -> Arc<Orchestrator> {
        let prober = AvailabilityProber::new(self.probe, self.config.probe_timeout);
        Arc::new(Orchestrator {
            prober,
            adapters: self.adapters,
            configs: RwLock::new(self.configs),
            active: RwLock::new(self.active),
            availability: RwLock::new(Arc::new(AvailabilitySnapshot::unprobed())),
            ledger: self.ledger.unwrap_or_else(TelemetryLedger::in_memory),
            test_results: DashMap::new(),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(TracingNotifier)),
            metrics: self.metrics,
            model_catalogs: self.model_catalogs,
            monitor: Mutex::new(None),
            config: self.config,
        })
    }
}

pub struct Orchestrator {
    prober: AvailabilityProber,
    adapters: HashMap<Backend, Arc<dyn GenerationAdapter>>,
    configs: RwLock<HashMap<Backend, BackendConfig>>,
    active: RwLock<Backend>,
    availability: RwLock<Arc<AvailabilitySnapshot>>,
    ledger: TelemetryLedger,
    test_results: DashMap<Backend, ConnectionTestResult>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Option<Arc<Metrics>>,
    model_catalogs: Vec<(Backend, Arc<dyn ModelCatalog>)>,
    monitor: Mutex<Option<MonitorTask>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder(probe: Arc<dyn BackendProbe>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            probe,
            config: OrchestratorConfig::default(),
            active: Backend::Ollama,
            adapters: HashMap::new(),
            configs: HashMap::new(),
            ledger: None,
            notifier: None,
            metrics: None,
            model_catalogs: Vec::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &TelemetryLedger {
        &self.ledger
    }

    // ---- Active selection ----

    pub fn active_backend(&self) -> Backend {
        *self
            .active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Explicitly select the active backend
    pub fn select_backend(&self, backend: Backend) {
        let previous = self.set_active(backend);
        if previous != backend {
            info!(from = %previous, to = %backend, "Active backend selected");
        }
    }

    /// Select by identifier or display name
    pub fn select_backend_by_id(&self, id: &str) -> Result<Backend> {
        let backend: Backend = id.parse()?;
        self.select_backend(backend);
        Ok(backend)
    }

    fn set_active(&self, backend: Backend) -> Backend {
        let mut active = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *active, backend)
    }

    // ---- Configuration ----

    pub fn backend_config(&self, backend: Backend) -> BackendConfig {
        self.configs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&backend)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace a backend's configuration; takes effect at the next probe
    pub fn set_backend_config(&self, backend: Backend, config: BackendConfig) {
        self.configs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(backend, config);
    }

    fn configs_snapshot(&self) -> HashMap<Backend, BackendConfig> {
        self.configs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // ---- Availability ----

    /// Last committed availability snapshot
    pub fn availability(&self) -> Arc<AvailabilitySnapshot> {
        self.availability
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Probe every backend, commit the new snapshot and return it
    pub async fn refresh_availability(&self) -> Arc<AvailabilitySnapshot> {
        let snapshot = Arc::new(self.probe_snapshot().await);
        self.commit_snapshot(snapshot.clone());
        self.reconcile_models(&snapshot).await;
        snapshot
    }

    async fn probe_snapshot(&self) -> AvailabilitySnapshot {
        let configs = self.configs_snapshot();
        let start = Instant::now();
        let snapshot = self.prober.probe_all(&configs).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_probe_cycle(start.elapsed().as_secs_f64());
        }
        snapshot
    }

    fn commit_snapshot(&self, snapshot: Arc<AvailabilitySnapshot>) {
        if let Some(metrics) = &self.metrics {
            for (backend, available) in snapshot.iter() {
                metrics.set_backend_available(backend.id(), available);
            }
        }
        *self
            .availability
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }

    /// Keep each catalog's model when installed, else switch to the first installed one
    async fn reconcile_models(&self, snapshot: &AvailabilitySnapshot) {
        for (backend, catalog) in &self.model_catalogs {
            if !snapshot.is_available(*backend) {
                continue;
            }
            let installed =
                match tokio::time::timeout(self.config.probe_timeout, catalog.installed_models())
                    .await
                {
                    Ok(Ok(models)) => models,
                    Ok(Err(err)) => {
                        debug!(backend = %backend, error = %err, "Failed to list models");
                        continue;
                    }
                    Err(_) => {
                        debug!(backend = %backend, "Model listing timed out");
                        continue;
                    }
                };

            let current = catalog.current_model();
            if let Some(model) = choose_model(&current, &installed) {
                info!(
                    backend = %backend,
                    configured = %current,
                    selected = %model,
                    "Configured model not installed, switching"
                );
                catalog.select_model(model);
            }
        }
    }

    /// Candidate order for a call made now
    pub fn build_candidates(&self) -> Vec<Backend> {
        candidate_order(
            self.active_backend(),
            &self.availability(),
            Backend::priority_order(),
        )
    }

    // ---- Generation ----

    /// Run one logical call through the fallback sequence
    pub async fn generate_with_fallback(
        &self,
        request: &GenerationRequest,
    ) -> Result<RoutedGeneration> {
        let original = self.active_backend();
        let candidates = self.build_candidates();
        debug!(
            active = %original,
            candidates = ?candidates,
            "Starting generation"
        );

        let mut last_error = None;
        for (index, candidate) in candidates.iter().copied().enumerate() {
            self.set_active(candidate);

            match self.attempt(candidate, request).await {
                Ok((generation, response_time)) => {
                    self.record_success(candidate, &generation, response_time)
                        .await;

                    let fallback_from = (candidate != original).then_some(original);
                    if let Some(from) = fallback_from {
                        info!(from = %from, to = %candidate, "Fallback succeeded");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_fallback(from.id(), candidate.id());
                        }
                        self.notify(self.config.notifications.fallback(from, candidate));
                        if self.config.restore_selection_after_fallback {
                            self.set_active(original);
                        }
                    }

                    return Ok(RoutedGeneration {
                        generation,
                        backend: candidate,
                        fallback_from,
                        attempted: index + 1,
                        response_time,
                    });
                }
                Err(err) => {
                    warn!(backend = %candidate, error = %err, "Generation attempt failed");
                    self.record_failure(candidate, &err);
                    last_error = Some(err);
                }
            }
        }

        self.set_active(original);
        if let Some(metrics) = &self.metrics {
            metrics.record_exhausted();
        }
        warn!(
            attempted = candidates.len(),
            "No backend available for generation"
        );
        Err(Error::NoBackendAvailable {
            attempted: candidates.len(),
            source: last_error.map(Box::new),
        })
    }

    /// One bounded call to a backend's adapter
    async fn attempt(
        &self,
        backend: Backend,
        request: &GenerationRequest,
    ) -> Result<(Generation, Duration)> {
        let adapter = self
            .adapters
            .get(&backend)
            .ok_or(Error::AdapterMissing(backend))?;

        debug!(backend = %backend, "Attempting generation");
        let start = Instant::now();
        match tokio::time::timeout(self.config.attempt_timeout, adapter.generate(request)).await {
            Ok(Ok(generation)) => Ok((generation, start.elapsed())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Timeout(self.config.attempt_timeout)),
        }
    }

    async fn record_success(&self, backend: Backend, generation: &Generation, elapsed: Duration) {
        let tokens = generation.tokens_used.unwrap_or(0);
        let performance = self
            .ledger
            .record_performance(backend, true, Some(elapsed));
        self.ledger.record_usage(backend, tokens, elapsed).await;

        info!(
            backend = %backend,
            tokens,
            latency_ms = elapsed.as_millis() as u64,
            "Generation succeeded"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_attempt_success(backend.id(), elapsed.as_secs_f64());
            metrics.record_usage(backend.id(), tokens, backend.estimate_cost(tokens));
            metrics.update_success_rate(backend.id(), performance.success_rate);
        }
    }

    fn record_failure(&self, backend: Backend, err: &Error) {
        let performance = self.ledger.record_performance(backend, false, None);
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt_failure(backend.id(), err.kind());
            metrics.update_success_rate(backend.id(), performance.success_rate);
        }
    }

    // ---- Connection testing ----

    /// Send one minimal request to `backend`, outside the fallback sequence.
    ///
    /// The active selection is restored afterwards whatever the outcome.
    pub async fn test_connection(&self, backend: Backend) -> ConnectionTestResult {
        let prior = self.set_active(backend);
        let outcome = self
            .attempt(backend, &GenerationRequest::connection_test())
            .await;
        self.set_active(prior);

        let result = match outcome {
            Ok((_, response_time)) => {
                info!(
                    backend = %backend,
                    latency_ms = response_time.as_millis() as u64,
                    "Connection test passed"
                );
                self.notify(notification::connection_test_passed(backend, response_time));
                ConnectionTestResult::passed(response_time)
            }
            Err(err) => {
                warn!(backend = %backend, error = %err, "Connection test failed");
                let message = err.to_string();
                self.notify(notification::connection_test_failed(backend, &message));
                ConnectionTestResult::failed(message)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_connection_test(backend.id(), result.success);
        }
        self.test_results.insert(backend, result.clone());
        result
    }

    /// Latest connection test result for `backend`
    pub fn connection_test_result(&self, backend: Backend) -> Option<ConnectionTestResult> {
        self.test_results
            .get(&backend)
            .map(|entry| entry.value().clone())
    }

    // ---- Monitoring ----

    /// Start the periodic availability monitor, replacing any running one.
    ///
    /// A zero interval is rejected and leaves any running monitor untouched.
    pub fn start_monitor(self: &Arc<Self>, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::Config(
                "monitor interval must be greater than zero".to_string(),
            ));
        }
        let task = MonitorTask::spawn(Arc::downgrade(self), interval);
        let previous = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.stop();
        }
        info!(interval_secs = interval.as_secs_f64(), "Availability monitor started");
        Ok(())
    }

    /// Stop the monitor; does nothing when none is running
    pub fn stop_monitor(&self) {
        let task = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.stop();
            info!("Availability monitor stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// One monitor tick: probe, commit, announce every flip.
    ///
    /// Results of a probe that finishes after `stop` was signalled are discarded.
    pub(crate) async fn run_monitor_cycle(
        &self,
        stop: &watch::Receiver<bool>,
    ) -> Vec<AvailabilityChange> {
        let previous = self.availability();
        let snapshot = Arc::new(self.probe_snapshot().await);

        if *stop.borrow() {
            debug!("Monitor stopped during probe, discarding results");
            return Vec::new();
        }

        self.commit_snapshot(snapshot.clone());
        let changes = diff_snapshots(&previous, &snapshot);
        for change in &changes {
            info!(
                backend = %change.backend,
                status = change.status_label(),
                "Backend availability changed"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_availability_change(change.backend.id(), change.now_available);
            }
            self.notify(notification::status_changed(change));
        }

        self.reconcile_models(&snapshot).await;
        changes
    }

    fn notify(&self, notification: Notification) {
        if self.config.notifications.enabled {
            self.notifier.notify(notification);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}

impl StatusSource for Orchestrator {
    fn active_backend(&self) -> String {
        Orchestrator::active_backend(self).id().to_string()
    }

    fn last_refresh(&self) -> Option<String> {
        let taken_at = self.availability().taken_at();
        (taken_at != chrono::DateTime::<chrono::Utc>::UNIX_EPOCH).then(|| taken_at.to_rfc3339())
    }

    fn backend_statuses(&self) -> Vec<BackendStatus> {
        let snapshot = self.availability();
        let usage = self.ledger.usage_snapshot();
        let performance = self.ledger.performance_snapshot();

        Backend::ALL
            .into_iter()
            .map(|backend| {
                let stats = usage.get(&backend).cloned().unwrap_or_default();
                BackendStatus {
                    id: backend.id().to_string(),
                    name: backend.display_name().to_string(),
                    available: snapshot.is_available(backend),
                    success_rate: performance
                        .get(&backend)
                        .filter(|p| p.total_attempts > 0)
                        .map(|p| p.success_rate),
                    total_requests: stats.total_requests,
                    total_tokens: stats.total_tokens,
                    total_cost: stats.total_cost,
                    average_response_time: stats.average_response_time,
                }
            })
            .collect()
    }
}

/// Model to switch to, or `None` to keep `current`
fn choose_model<'a>(current: &str, installed: &'a [String]) -> Option<&'a str> {
    if installed.is_empty() || installed.iter().any(|m| m == current) {
        return None;
    }
    installed.first().map(String::as_str)
}
