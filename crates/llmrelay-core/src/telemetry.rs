//! Per-backend telemetry accumulators
//!
//! Both accumulators are updated incrementally and never recomputed from
//! history. Response times are kept in seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cumulative usage for billing/insight purposes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_tokens: u64,
    pub total_requests: u64,
    /// Estimated USD
    pub total_cost: f64,
    /// Mean of every recorded response time, in seconds
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// Fold one request into the totals
    pub fn record(&mut self, tokens: u64, cost: f64, response_time: Duration) {
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        self.total_requests = self.total_requests.saturating_add(1);
        self.total_cost += cost;
        let n = self.total_requests as f64;
        self.average_response_time =
            (self.average_response_time * (n - 1.0) + response_time.as_secs_f64()) / n;
        self.last_used = Some(Utc::now());
    }
}

/// Reliability accounting, independent of cost
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean latency of successful attempts only, in seconds
    pub average_latency: f64,
    /// `successful_attempts / total_attempts`
    pub success_rate: f64,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

impl PerformanceMetrics {
    pub fn record_success(&mut self, response_time: Duration) {
        let secs = response_time.as_secs_f64();
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.successful_attempts = self.successful_attempts.saturating_add(1);
        self.last_response_time = Some(secs);
        self.last_success = Some(Utc::now());

        let n = self.successful_attempts as f64;
        self.average_latency = (self.average_latency * (n - 1.0) + secs) / n;
        self.update_success_rate();
    }

    pub fn record_failure(&mut self) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.last_failure = Some(Utc::now());
        self.update_success_rate();
    }

    fn update_success_rate(&mut self) {
        self.success_rate = if self.total_attempts == 0 {
            0.0
        } else {
            self.successful_attempts as f64 / self.total_attempts as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_incremental_mean() {
        let mut stats = UsageStats::default();
        stats.record(100, 0.0, Duration::from_secs_f64(1.0));
        stats.record(200, 0.0, Duration::from_secs_f64(3.0));

        assert_eq!(stats.total_tokens, 300);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.average_response_time, 2.0);
        assert!(stats.last_used.is_some());
    }

    #[test]
    fn test_usage_mean_matches_arithmetic_mean() {
        let times = [0.5, 1.25, 4.0, 2.25, 0.75];
        let mut stats = UsageStats::default();
        for t in times {
            stats.record(10, 0.0, Duration::from_secs_f64(t));
        }
        let expected: f64 = times.iter().sum::<f64>() / times.len() as f64;
        assert!((stats.average_response_time - expected).abs() < 1e-9);
    }

    #[test]
    fn test_usage_cost_accumulates() {
        let mut stats = UsageStats::default();
        stats.record(1_000, 0.01, Duration::from_secs(1));
        stats.record(1_000, 0.01, Duration::from_secs(1));
        assert!((stats.total_cost - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_performance_failure_does_not_move_latency() {
        let mut metrics = PerformanceMetrics::default();
        metrics.record_success(Duration::from_secs_f64(2.0));
        metrics.record_failure();

        assert_eq!(metrics.success_rate, 0.5);
        assert_eq!(metrics.average_latency, 2.0);
        assert_eq!(metrics.total_attempts, 2);
        assert_eq!(metrics.successful_attempts, 1);
        assert_eq!(metrics.failed_attempts, 1);
        assert_eq!(metrics.last_response_time, Some(2.0));
        assert!(metrics.last_success.is_some());
        assert!(metrics.last_failure.is_some());
    }

    #[test]
    fn test_performance_attempts_always_sum() {
        let mut metrics = PerformanceMetrics::default();
        for i in 0..10 {
            if i % 3 == 0 {
                metrics.record_failure();
            } else {
                metrics.record_success(Duration::from_millis(100));
            }
            assert_eq!(
                metrics.total_attempts,
                metrics.successful_attempts + metrics.failed_attempts
            );
            assert_eq!(
                metrics.success_rate,
                metrics.successful_attempts as f64 / metrics.total_attempts as f64
            );
        }
    }

    #[test]
    fn test_usage_json_round_trip() {
        let mut stats = UsageStats::default();
        stats.record(42, 0.5, Duration::from_millis(1500));

        let json = serde_json::to_string(&stats).unwrap();
        let back: UsageStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
