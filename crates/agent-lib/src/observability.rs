//! Observability infrastructure for the node collector
//!
//! Provides:
//! - Prometheus metrics (sampling latency, read errors, ingestion, history sizes, streams)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for sampling latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// `buffer` label values for history gauges
pub mod buffers {
    pub const STATS: &str = "stats";
    pub const EVENTS: &str = "events";
}

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    sample_latency_seconds: Histogram,
    samples_total: IntCounter,
    counter_read_errors: IntCounterVec,
    events_ingested: IntCounter,
    events_rejected: IntCounter,
    history_items: IntGaugeVec,
    active_streams: IntGauge,
    encode_failures: IntCounter,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            sample_latency_seconds: register_histogram!(
                "node_collector_sample_latency_seconds",
                "Time spent reading node counters for one sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            samples_total: register_int_counter!(
                "node_collector_samples_total",
                "Total number of resource samples recorded"
            )
            .expect("Failed to register samples_total"),

            counter_read_errors: register_int_counter_vec!(
                "node_collector_counter_read_errors_total",
                "Counter reads that failed and were degraded",
                &["source"]
            )
            .expect("Failed to register counter_read_errors"),

            events_ingested: register_int_counter!(
                "node_collector_events_ingested_total",
                "Events accepted by the ingest endpoint"
            )
            .expect("Failed to register events_ingested"),

            events_rejected: register_int_counter!(
                "node_collector_events_rejected_total",
                "Events rejected by the ingest endpoint"
            )
            .expect("Failed to register events_rejected"),

            history_items: register_int_gauge_vec!(
                "node_collector_history_items",
                "Entries currently retained per history buffer",
                &["buffer"]
            )
            .expect("Failed to register history_items"),

            active_streams: register_int_gauge!(
                "node_collector_active_streams",
                "Streaming clients currently connected"
            )
            .expect("Failed to register active_streams"),

            encode_failures: register_int_counter!(
                "node_collector_encode_failures_total",
                "Response payloads that could not be encoded"
            )
            .expect("Failed to register encode_failures"),
        }
    }
}

/// Handle onto the process-wide collector metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    /// Create a handle, registering the metrics on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    pub fn observe_sample_latency(&self, duration_secs: f64) {
        self.inner().sample_latency_seconds.observe(duration_secs);
    }

    pub fn inc_samples(&self) {
        self.inner().samples_total.inc();
    }

    pub fn inc_counter_read_errors(&self, source: &str) {
        self.inner()
            .counter_read_errors
            .with_label_values(&[source])
            .inc();
    }

    pub fn inc_events_ingested(&self) {
        self.inner().events_ingested.inc();
    }

    pub fn inc_events_rejected(&self) {
        self.inner().events_rejected.inc();
    }

    pub fn set_history_items(&self, buffer: &str, items: usize) {
        self.inner()
            .history_items
            .with_label_values(&[buffer])
            .set(items as i64);
    }

    pub fn inc_active_streams(&self) {
        self.inner().active_streams.inc();
    }

    pub fn dec_active_streams(&self) {
        self.inner().active_streams.dec();
    }

    pub fn inc_encode_failures(&self) {
        self.inner().encode_failures.inc();
    }
}

/// Structured logger for collector lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log collector startup
    pub fn log_startup(&self, version: &str, query_port: u16, ingest_port: u16) {
        info!(
            event = "collector_started",
            node = %self.node_name,
            version = %version,
            query_port = query_port,
            ingest_port = ingest_port,
            "Node collector started"
        );
    }

    /// Log collector shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "collector_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Node collector shutting down"
        );
    }

    /// Log an accepted external event
    pub fn log_event_ingested(&self, kind: &str) {
        info!(
            event = "event_ingested",
            node = %self.node_name,
            event_type = %kind,
            "Rx event"
        );
    }

    /// Log a counter read that was degraded
    pub fn log_counter_read_failure(&self, source: &str, error: &anyhow::Error) {
        warn!(
            event = "counter_read_failed",
            node = %self.node_name,
            source = %source,
            error = %format!("{error:#}"),
            "Counter read failed, degrading field"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let first = CollectorMetrics::new();
        let second = CollectorMetrics::new();

        first.observe_sample_latency(0.002);
        first.inc_samples();
        second.inc_counter_read_errors("vmstat");
        second.set_history_items(buffers::STATS, 3);
        second.inc_active_streams();
        second.dec_active_streams();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "node_collector_samples_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "node_collector_counter_read_errors_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name(), "test-node");
    }
}
