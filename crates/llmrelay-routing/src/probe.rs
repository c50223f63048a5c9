//! Availability probing
//!
//! Each backend is probed according to its capability-table strategy:
//! HTTP-reachable daemons get a GET against a health/listing endpoint,
//! locally installed toolchains get a path-existence check, and cloud
//! services are available when their required credentials are configured.
//! Probe failures never escape: any error, including a timeout, is `false`.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use llmrelay_core::{AvailabilitySnapshot, Backend, BackendConfig, HttpCheck, ProbeStrategy};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default bound for one backend's probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Availability check for a single backend
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self, backend: Backend, config: &BackendConfig) -> bool;
}

/// Probe driven by each backend's [`ProbeStrategy`]
pub struct StrategyProbe {
    http: Arc<dyn HttpCheck>,
    http_timeout: Duration,
}

impl StrategyProbe {
    pub fn new(http: Arc<dyn HttpCheck>, http_timeout: Duration) -> Self {
        Self { http, http_timeout }
    }

    /// URLs to try, in order, for an HTTP strategy
    fn http_urls(
        backend: Backend,
        config: &BackendConfig,
        path: &str,
        alternate_urls: &[&str],
    ) -> Vec<String> {
        let primary = config
            .effective_endpoint(backend)
            .map(|base| format!("{}{}", base.trim_end_matches('/'), path));

        let mut urls: Vec<String> = primary.into_iter().collect();
        for alternate in alternate_urls {
            if !urls.iter().any(|u| u == alternate) {
                urls.push((*alternate).to_string());
            }
        }
        urls
    }
}

#[async_trait]
impl BackendProbe for StrategyProbe {
    async fn probe(&self, backend: Backend, config: &BackendConfig) -> bool {
        match backend.info().probe {
            ProbeStrategy::Http {
                path,
                alternate_urls,
            } => {
                for url in Self::http_urls(backend, config, path, alternate_urls) {
                    if self.http.get_ok(&url, self.http_timeout).await {
                        return true;
                    }
                }
                false
            }
            ProbeStrategy::InstalledPath(paths) => {
                for path in paths {
                    if tokio::fs::try_exists(path).await.unwrap_or(false) {
                        return true;
                    }
                }
                false
            }
            ProbeStrategy::Credentials(required) => config.has_credentials(required),
        }
    }
}

/// Runs every backend's probe concurrently and joins them into one snapshot
pub struct AvailabilityProber {
    probe: Arc<dyn BackendProbe>,
    timeout: Duration,
}

impl AvailabilityProber {
    pub fn new(probe: Arc<dyn BackendProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// Probe a single backend, bounded by the probe timeout
    pub async fn probe_one(&self, backend: Backend, config: &BackendConfig) -> bool {
        match tokio::time::timeout(self.timeout, self.probe.probe(backend, config)).await {
            Ok(available) => available,
            Err(_) => {
                debug!(
                    backend = %backend,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out"
                );
                false
            }
        }
    }

    /// Probe every backend; backends without an entry in `configs` use defaults
    pub async fn probe_all(&self, configs: &HashMap<Backend, BackendConfig>) -> AvailabilitySnapshot {
        let empty = BackendConfig::default();
        let probes = Backend::ALL.into_iter().map(|backend| {
            let config = configs.get(&backend).unwrap_or(&empty);
            async move { (backend, self.probe_one(backend, config).await) }
        });

        let availability: BTreeMap<Backend, bool> = join_all(probes).await.into_iter().collect();
        debug!(
            available = availability.values().filter(|up| **up).count(),
            total = availability.len(),
            "Probe cycle complete"
        );
        AvailabilitySnapshot::new(availability, Utc::now())
    }
}

/// Candidate order for one logical call.
///
/// The active backend comes first when it is available, followed by every
/// other available backend in `priority` order. Unavailable backends are
/// never candidates.
pub fn candidate_order(
    active: Backend,
    snapshot: &AvailabilitySnapshot,
    priority: &[Backend],
) -> Vec<Backend> {
    let mut candidates = Vec::with_capacity(priority.len());
    if snapshot.is_available(active) {
        candidates.push(active);
    }
    for backend in priority {
        if snapshot.is_available(*backend) && !candidates.contains(backend) {
            candidates.push(*backend);
        }
    }
    candidates
}
