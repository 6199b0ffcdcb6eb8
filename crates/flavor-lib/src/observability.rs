//! Observability for the flavor webhook
//!
//! Provides:
//! - Prometheus metrics (admission decisions, latency, backfills, catalog size)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for admission latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Decision label values for `flavor_gate_admission_requests_total`
pub mod decisions {
    pub const ADMITTED: &str = "admitted";
    pub const REJECTED: &str = "rejected";
    pub const SKIPPED: &str = "skipped";
    pub const INVALID: &str = "invalid";
}

static GLOBAL_METRICS: OnceLock<GateMetricsInner> = OnceLock::new();

struct GateMetricsInner {
    admission_requests: IntCounterVec,
    admission_latency_seconds: Histogram,
    dimensions_backfilled: IntCounter,
    catalog_flavors: IntGauge,
}

impl GateMetricsInner {
    fn new() -> Self {
        Self {
            admission_requests: register_int_counter_vec!(
                "flavor_gate_admission_requests_total",
                "Admission reviews handled, by decision",
                &["decision"]
            )
            .expect("Failed to register admission_requests_total"),

            admission_latency_seconds: register_histogram!(
                "flavor_gate_admission_latency_seconds",
                "Time spent evaluating one admission review",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register admission_latency_seconds"),

            dimensions_backfilled: register_int_counter!(
                "flavor_gate_dimensions_backfilled_total",
                "Resource requests copied from a flavor into admitted pods"
            )
            .expect("Failed to register dimensions_backfilled_total"),

            catalog_flavors: register_int_gauge!(
                "flavor_gate_catalog_flavors",
                "Number of flavors in the loaded catalog"
            )
            .expect("Failed to register catalog_flavors"),
        }
    }
}

/// Handle to the process-wide gate metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct GateMetrics {
    _private: (),
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GateMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(GateMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &GateMetricsInner {
        GLOBAL_METRICS.get_or_init(GateMetricsInner::new)
    }

    /// Count one review under `decision` (see [`decisions`])
    pub fn inc_decision(&self, decision: &str) {
        self.inner()
            .admission_requests
            .with_label_values(&[decision])
            .inc();
    }

    pub fn decision_count(&self, decision: &str) -> u64 {
        self.inner()
            .admission_requests
            .with_label_values(&[decision])
            .get()
    }

    pub fn observe_latency(&self, duration_secs: f64) {
        self.inner().admission_latency_seconds.observe(duration_secs);
    }

    pub fn add_backfilled(&self, count: usize) {
        self.inner().dimensions_backfilled.inc_by(count as u64);
    }

    pub fn backfilled_count(&self) -> u64 {
        self.inner().dimensions_backfilled.get()
    }

    pub fn set_catalog_flavors(&self, count: usize) {
        self.inner().catalog_flavors.set(count as i64);
    }

    /// Prometheus text exposition of the default registry
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for admission events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, flavors: usize) {
        info!(
            event = "webhook_started",
            instance = %self.instance,
            webhook_version = %version,
            flavors = flavors,
            "Flavor webhook started"
        );
    }

    pub fn log_catalog_loaded(&self, source: &str, names: &[&str]) {
        info!(
            event = "catalog_loaded",
            instance = %self.instance,
            source = %source,
            flavors = ?names,
            "Flavor catalog ready"
        );
    }

    pub fn log_admitted(
        &self,
        uid: &str,
        object: &str,
        operation: &str,
        flavors: &[String],
        backfilled: usize,
    ) {
        info!(
            event = "pod_admitted",
            instance = %self.instance,
            uid = %uid,
            object = %object,
            operation = %operation,
            flavors = ?flavors,
            backfilled = backfilled,
            "Pod admitted"
        );
    }

    pub fn log_rejected(
        &self,
        uid: &str,
        object: &str,
        operation: &str,
        reason: &str,
        message: &str,
    ) {
        warn!(
            event = "pod_rejected",
            instance = %self.instance,
            uid = %uid,
            object = %object,
            operation = %operation,
            reason = %reason,
            message = %message,
            "Pod rejected"
        );
    }

    pub fn log_skipped(&self, uid: &str, object: &str, reason: &str) {
        debug!(
            event = "review_skipped",
            instance = %self.instance,
            uid = %uid,
            object = %object,
            reason = %reason,
            "Review outside flavor scope"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "webhook_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Flavor webhook shutting down"
        );
    }
}
