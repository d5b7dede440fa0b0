//! Prometheus-style metrics for gate decisions

use crate::types::AuthorizationDecision;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Gate decision metrics
#[derive(Debug, Clone, Default)]
pub struct GateMetrics {
    /// Total number of decisions
    pub total_decisions: u64,

    /// Number of allowed decisions
    pub allowed_decisions: u64,

    /// Number of denied decisions
    pub denied_decisions: u64,

    /// Denials by error kind
    pub denials_by_kind: BTreeMap<&'static str, u64>,

    /// Composite queries sent to the backend
    pub conditional_evaluations: u64,

    /// Backend failures turned into denials
    pub backend_failures: u64,

    /// Latency percentiles (p50, p90, p99)
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,

    /// Average latency
    pub avg_latency_ms: f64,
}

impl GateMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        if self.total_decisions == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / self.total_decisions as f64
        }
    }
}

/// Metrics collector shared by the gate and the conditional evaluator
#[derive(Debug)]
pub struct MetricsCollector {
    /// Metrics data
    metrics: Arc<RwLock<GateMetrics>>,

    /// Latency samples for percentile calculation
    latency_samples: Arc<RwLock<Vec<f64>>>,

    /// Maximum samples to keep
    max_samples: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(GateMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a finished decision
    pub async fn record_decision(&self, decision: &AuthorizationDecision) {
        let mut metrics = self.metrics.write().await;
        metrics.total_decisions += 1;

        match decision {
            AuthorizationDecision::Allow(_) => metrics.allowed_decisions += 1,
            AuthorizationDecision::Deny(reason) => {
                metrics.denied_decisions += 1;
                *metrics.denials_by_kind.entry(reason.kind()).or_insert(0) += 1;
            }
        }
    }

    /// Record one composite query sent to the backend
    pub async fn record_conditional_evaluation(&self) {
        self.metrics.write().await.conditional_evaluations += 1;
    }

    /// Record a backend failure
    pub async fn record_backend_failure(&self) {
        self.metrics.write().await.backend_failures += 1;
    }

    /// Record decision latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        // Keep only recent samples
        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut metrics = self.metrics.write().await;

        let sum: f64 = samples.iter().sum();
        metrics.avg_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(f64::total_cmp);

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> GateMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = GateMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        let mut out = format!(
            r#"# HELP scopegate_decisions_total Total number of authorization decisions
# TYPE scopegate_decisions_total counter
scopegate_decisions_total {}

# HELP scopegate_allowed_total Number of allowed decisions
# TYPE scopegate_allowed_total counter
scopegate_allowed_total {}

# HELP scopegate_denied_total Number of denied decisions
# TYPE scopegate_denied_total counter
scopegate_denied_total {}

# HELP scopegate_conditional_evaluations_total Composite queries sent to the backend
# TYPE scopegate_conditional_evaluations_total counter
scopegate_conditional_evaluations_total {}

# HELP scopegate_backend_failures_total Backend failures resolved as denials
# TYPE scopegate_backend_failures_total counter
scopegate_backend_failures_total {}

# HELP scopegate_decision_latency_seconds Decision latency percentiles
# TYPE scopegate_decision_latency_seconds summary
scopegate_decision_latency_seconds{{quantile="0.5"}} {}
scopegate_decision_latency_seconds{{quantile="0.9"}} {}
scopegate_decision_latency_seconds{{quantile="0.99"}} {}

# HELP scopegate_denials_total Denied decisions by reason
# TYPE scopegate_denials_total counter
"#,
            metrics.total_decisions,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.conditional_evaluations,
            metrics.backend_failures,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        );

        for (kind, count) in &metrics.denials_by_kind {
            out.push_str(&format!("scopegate_denials_total{{reason=\"{}\"}} {}\n", kind, count));
        }

        out
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
