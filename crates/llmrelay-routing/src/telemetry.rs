//! Telemetry ledger
//!
//! Keeps the two per-backend accumulators: usage (tokens, cost, response
//! time) and performance (attempt outcomes, success latency). Usage is
//! persisted through the [`UsageStore`] after every change; persistence
//! failures are logged and never surface to the caller.

use llmrelay_core::{Backend, PerformanceMetrics, UsageMap, UsageStats, UsageStore};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct TelemetryLedger {
    usage: RwLock<UsageMap>,
    performance: RwLock<HashMap<Backend, PerformanceMetrics>>,
    store: Option<Arc<dyn UsageStore>>,
    /// Serializes usage writers so saves reach the store in update order
    write_lock: Mutex<()>,
}

impl TelemetryLedger {
    /// Ledger without persistence
    pub fn in_memory() -> Self {
        Self::with_usage(UsageMap::new(), None)
    }

    fn with_usage(usage: UsageMap, store: Option<Arc<dyn UsageStore>>) -> Self {
        Self {
            usage: RwLock::new(usage),
            performance: RwLock::new(HashMap::new()),
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger seeded from `store`. A failed load starts from empty usage.
    pub async fn load(store: Arc<dyn UsageStore>) -> Self {
        let usage = match store.load().await {
            Ok(usage) => {
                debug!(backends = usage.len(), "Loaded usage stats");
                usage
            }
            Err(err) => {
                warn!(error = %err, "Failed to load usage stats, starting empty");
                UsageMap::new()
            }
        };
        Self::with_usage(usage, Some(store))
    }

    /// Fold one successful request into the backend's usage and persist the map
    pub async fn record_usage(
        &self,
        backend: Backend,
        tokens: u64,
        response_time: Duration,
    ) -> UsageStats {
        let _writer = self.write_lock.lock().await;

        let cost = backend.estimate_cost(tokens);
        let (updated, snapshot) = {
            let mut usage = self
                .usage
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let stats = usage.entry(backend).or_default();
            stats.record(tokens, cost, response_time);
            (stats.clone(), usage.clone())
        };

        self.persist(&snapshot).await;
        updated
    }

    /// Record one attempt outcome.
    ///
    /// A success without a response time cannot feed the latency average and
    /// is counted as a failure.
    pub fn record_performance(
        &self,
        backend: Backend,
        success: bool,
        response_time: Option<Duration>,
    ) -> PerformanceMetrics {
        let mut performance = self
            .performance
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let metrics = performance.entry(backend).or_default();
        match (success, response_time) {
            (true, Some(elapsed)) => metrics.record_success(elapsed),
            _ => metrics.record_failure(),
        }
        metrics.clone()
    }

    pub fn usage(&self, backend: Backend) -> Option<UsageStats> {
        self.usage
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&backend)
            .cloned()
    }

    /// Copy of the full usage map
    pub fn usage_snapshot(&self) -> UsageMap {
        self.usage
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn performance(&self, backend: Backend) -> Option<PerformanceMetrics> {
        self.performance
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&backend)
            .cloned()
    }

    /// Copy of every backend's performance metrics
    pub fn performance_snapshot(&self) -> HashMap<Backend, PerformanceMetrics> {
        self.performance
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Clear one backend's usage and persist
    pub async fn reset_usage(&self, backend: Backend) {
        let _writer = self.write_lock.lock().await;
        let snapshot = {
            let mut usage = self
                .usage
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            usage.remove(&backend);
            usage.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Clear all usage and persist
    pub async fn reset_all_usage(&self) {
        let _writer = self.write_lock.lock().await;
        self.usage
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.persist(&UsageMap::new()).await;
    }

    async fn persist(&self, usage: &UsageMap) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(usage).await {
            warn!(error = %err, "Failed to persist usage stats");
        }
    }
}
