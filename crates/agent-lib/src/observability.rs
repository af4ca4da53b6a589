//! Prometheus metrics for the agent
//!
//! Poll latency, monitored container count, and error/emission counters,
//! exposed through the binary's /metrics endpoint.

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for poll cycle latency (in seconds)
const POLL_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    poll_latency_seconds: Histogram,
    containers_monitored: IntGauge,
    records_emitted: IntCounter,
    sample_errors: IntCounter,
    poll_errors: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            poll_latency_seconds: register_histogram!(
                "docker_metrics_agent_poll_latency_seconds",
                "Time spent completing one poll cycle",
                POLL_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register poll_latency_seconds"),

            containers_monitored: register_int_gauge!(
                "docker_metrics_agent_containers_monitored",
                "Number of containers seen in the last poll cycle"
            )
            .expect("Failed to register containers_monitored"),

            records_emitted: register_int_counter!(
                "docker_metrics_agent_records_emitted_total",
                "Total number of container records written to the output stream"
            )
            .expect("Failed to register records_emitted"),

            sample_errors: register_int_counter!(
                "docker_metrics_agent_sample_errors_total",
                "Total number of per-container stats sampling failures"
            )
            .expect("Failed to register sample_errors"),

            poll_errors: register_int_counter!(
                "docker_metrics_agent_poll_errors_total",
                "Total number of poll cycles that failed entirely"
            )
            .expect("Failed to register poll_errors"),
        }
    }
}

/// Lightweight handle to the global metrics instance
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_poll_latency(&self, duration_secs: f64) {
        self.inner().poll_latency_seconds.observe(duration_secs);
    }

    pub fn set_containers_monitored(&self, count: i64) {
        self.inner().containers_monitored.set(count);
    }

    pub fn inc_records_emitted(&self) {
        self.inner().records_emitted.inc();
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors.inc();
    }

    pub fn inc_poll_errors(&self) {
        self.inner().poll_errors.inc();
    }
}
