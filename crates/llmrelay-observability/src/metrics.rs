//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for llmrelay:
//! - Generation attempts per backend (success/failure, latency)
//! - Fallback and exhaustion counts
//! - Backend availability and availability flips
//! - Token usage and estimated cost
//! - Connection test outcomes

use prometheus::{
    Counter, CounterVec, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector for llmrelay
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Attempt metrics
    /// Generation attempts by backend and outcome
    pub attempts_total: CounterVec,
    /// Failed attempts by backend and error type
    pub attempt_failures_total: CounterVec,
    /// Duration of successful attempts
    pub attempt_duration_seconds: HistogramVec,

    // Fallback metrics
    /// Successful fallbacks from the original selection to another backend
    pub fallbacks_total: CounterVec,
    /// Logical calls that ran out of candidates
    pub exhausted_total: Counter,

    // Availability metrics
    /// Backend availability as of the last probe (1 = available)
    pub backend_available: GaugeVec,
    /// Availability flips observed by the monitor
    pub availability_changes_total: CounterVec,
    /// Wall-clock time of a full probe cycle
    pub probe_cycle_duration_seconds: Histogram,

    // Usage metrics
    /// Tokens consumed per backend
    pub tokens_total: CounterVec,
    /// Estimated spend per backend in USD
    pub cost_usd_total: CounterVec,
    /// Success rate per backend (0.0-1.0)
    pub success_rate: GaugeVec,

    // Diagnostics
    /// Connection tests by backend and outcome
    pub connection_tests_total: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let attempts_total = CounterVec::new(
            Opts::new("llmrelay_attempts_total", "Total generation attempts"),
            &["backend", "outcome"],
        )?;

        let attempt_failures_total = CounterVec::new(
            Opts::new(
                "llmrelay_attempt_failures_total",
                "Failed generation attempts by error type",
            ),
            &["backend", "error_type"],
        )?;

        let attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "llmrelay_attempt_duration_seconds",
                "Successful generation attempt duration in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["backend"],
        )?;

        let fallbacks_total = CounterVec::new(
            Opts::new(
                "llmrelay_fallbacks_total",
                "Calls answered by a backend other than the original selection",
            ),
            &["from", "to"],
        )?;

        let exhausted_total = Counter::with_opts(Opts::new(
            "llmrelay_exhausted_total",
            "Calls that failed because no backend could answer",
        ))?;

        let backend_available = GaugeVec::new(
            Opts::new(
                "llmrelay_backend_available",
                "Backend availability as of the last probe (1=available, 0=unavailable)",
            ),
            &["backend"],
        )?;

        let availability_changes_total = CounterVec::new(
            Opts::new(
                "llmrelay_availability_changes_total",
                "Availability flips detected by the monitor",
            ),
            &["backend", "status"],
        )?;

        let probe_cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "llmrelay_probe_cycle_duration_seconds",
                "Duration of a full concurrent probe cycle in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        let tokens_total = CounterVec::new(
            Opts::new("llmrelay_tokens_total", "Total tokens consumed"),
            &["backend"],
        )?;

        let cost_usd_total = CounterVec::new(
            Opts::new("llmrelay_cost_usd_total", "Estimated spend in USD"),
            &["backend"],
        )?;

        let success_rate = GaugeVec::new(
            Opts::new("llmrelay_success_rate", "Attempt success rate (0.0-1.0)"),
            &["backend"],
        )?;

        let connection_tests_total = CounterVec::new(
            Opts::new("llmrelay_connection_tests_total", "Connection tests run"),
            &["backend", "outcome"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(attempt_failures_total.clone()))?;
        registry.register(Box::new(attempt_duration_seconds.clone()))?;
        registry.register(Box::new(fallbacks_total.clone()))?;
        registry.register(Box::new(exhausted_total.clone()))?;
        registry.register(Box::new(backend_available.clone()))?;
        registry.register(Box::new(availability_changes_total.clone()))?;
        registry.register(Box::new(probe_cycle_duration_seconds.clone()))?;
        registry.register(Box::new(tokens_total.clone()))?;
        registry.register(Box::new(cost_usd_total.clone()))?;
        registry.register(Box::new(success_rate.clone()))?;
        registry.register(Box::new(connection_tests_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            attempts_total,
            attempt_failures_total,
            attempt_duration_seconds,
            fallbacks_total,
            exhausted_total,
            backend_available,
            availability_changes_total,
            probe_cycle_duration_seconds,
            tokens_total,
            cost_usd_total,
            success_rate,
            connection_tests_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a successful generation attempt
    pub fn record_attempt_success(&self, backend: &str, duration_secs: f64) {
        self.attempts_total
            .with_label_values(&[backend, "success"])
            .inc();
        self.attempt_duration_seconds
            .with_label_values(&[backend])
            .observe(duration_secs);
    }

    /// Record a failed generation attempt
    pub fn record_attempt_failure(&self, backend: &str, error_type: &str) {
        self.attempts_total
            .with_label_values(&[backend, "failure"])
            .inc();
        self.attempt_failures_total
            .with_label_values(&[backend, error_type])
            .inc();
    }

    /// Record a call that was answered by a fallback backend
    pub fn record_fallback(&self, from: &str, to: &str) {
        self.fallbacks_total.with_label_values(&[from, to]).inc();
    }

    /// Record a call that exhausted every candidate
    pub fn record_exhausted(&self) {
        self.exhausted_total.inc();
    }

    /// Update the availability gauge for a backend
    pub fn set_backend_available(&self, backend: &str, available: bool) {
        self.backend_available
            .with_label_values(&[backend])
            .set(if available { 1.0 } else { 0.0 });
    }

    /// Record an availability flip seen by the monitor
    pub fn record_availability_change(&self, backend: &str, now_available: bool) {
        let status = if now_available { "online" } else { "offline" };
        self.availability_changes_total
            .with_label_values(&[backend, status])
            .inc();
    }

    /// Record the duration of a full probe cycle
    pub fn record_probe_cycle(&self, duration_secs: f64) {
        self.probe_cycle_duration_seconds.observe(duration_secs);
    }

    /// Record token usage and estimated cost
    pub fn record_usage(&self, backend: &str, tokens: u64, cost_usd: f64) {
        self.tokens_total
            .with_label_values(&[backend])
            .inc_by(tokens as f64);
        if cost_usd > 0.0 {
            self.cost_usd_total
                .with_label_values(&[backend])
                .inc_by(cost_usd);
        }
    }

    /// Update the success-rate gauge for a backend
    pub fn update_success_rate(&self, backend: &str, success_rate: f64) {
        self.success_rate
            .with_label_values(&[backend])
            .set(success_rate);
    }

    /// Record a connection test outcome
    pub fn record_connection_test(&self, backend: &str, success: bool) {
        let outcome = if success { "pass" } else { "fail" };
        self.connection_tests_total
            .with_label_values(&[backend, outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_attempts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_attempt_success("ollama", 1.5);
        metrics.record_attempt_failure("openai", "timeout");
        metrics.record_attempt_failure("openai", "timeout");

        assert_eq!(
            metrics
                .attempts_total
                .with_label_values(&["ollama", "success"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .attempts_total
                .with_label_values(&["openai", "failure"])
                .get(),
            2.0
        );
        assert_eq!(
            metrics
                .attempt_failures_total
                .with_label_values(&["openai", "timeout"])
                .get(),
            2.0
        );
    }

    #[test]
    fn test_record_fallback_and_exhaustion() {
        let metrics = Metrics::new().unwrap();
        metrics.record_fallback("ollama", "openai");
        metrics.record_exhausted();

        assert_eq!(
            metrics
                .fallbacks_total
                .with_label_values(&["ollama", "openai"])
                .get(),
            1.0
        );
        assert_eq!(metrics.exhausted_total.get(), 1.0);
    }

    #[test]
    fn test_availability_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.set_backend_available("ollama", true);
        assert_eq!(
            metrics.backend_available.with_label_values(&["ollama"]).get(),
            1.0
        );
        metrics.set_backend_available("ollama", false);
        assert_eq!(
            metrics.backend_available.with_label_values(&["ollama"]).get(),
            0.0
        );
    }

    #[test]
    fn test_record_usage_skips_zero_cost() {
        let metrics = Metrics::new().unwrap();
        metrics.record_usage("ollama", 300, 0.0);
        metrics.record_usage("openai", 1_000_000, 10.0);

        assert_eq!(metrics.tokens_total.with_label_values(&["ollama"]).get(), 300.0);
        assert_eq!(
            metrics.cost_usd_total.with_label_values(&["openai"]).get(),
            10.0
        );

        let encoder = prometheus::TextEncoder::new();
        let text = encoder
            .encode_to_string(&metrics.registry().gather())
            .unwrap();
        assert!(!text.contains("llmrelay_cost_usd_total{backend=\"ollama\"}"));
    }
}
