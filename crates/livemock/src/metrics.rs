//! Prometheus metrics for livemock.
//!
//! Tracks mock traffic, live interceptions, and connected operator sessions.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};
use tracing::error;

lazy_static! {
    /// Requests received by the mock listener
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "livemock_requests_total",
        "Total number of requests received by the mock server",
        &["outcome"]  // outcome: matched|unmatched
    )
    .unwrap();

    /// Mock request duration, including any delay and interception wait
    pub static ref REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "livemock_request_duration_ms",
        "Time from request arrival until the response is written",
        &["resolution"],  // resolution: default|override|timeout|unmatched
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 15000.0, 30000.0]
    )
    .unwrap();

    /// Interception outcomes for requests carrying a client id
    pub static ref INTERCEPTIONS_TOTAL: CounterVec = register_counter_vec!(
        "livemock_interceptions_total",
        "Requests that went through the interception coordinator",
        &["resolution"]  // resolution: override|timeout|no_watchers
    )
    .unwrap();

    /// Requests currently suspended waiting for an operator
    pub static ref PENDING_INTERCEPTIONS: IntGauge = register_int_gauge!(
        "livemock_pending_interceptions",
        "Number of intercepted requests awaiting an override or deadline"
    )
    .unwrap();

    /// Overrides that arrived for an unknown or already completed interception
    pub static ref OVERRIDES_DISCARDED: IntCounter = register_int_counter!(
        "livemock_overrides_discarded_total",
        "Override commands discarded because the interception was already complete"
    )
    .unwrap();

    /// Connected live sessions
    pub static ref LIVE_SESSIONS: IntGauge = register_int_gauge!(
        "livemock_live_sessions",
        "Number of connected live operator sessions"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("Metrics output is not UTF-8: {}", e);
        String::new()
    })
}

/// Helper to record a mock request outcome
pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to record how long a mock request took
pub fn record_request_duration(resolution: &str, duration_ms: f64) {
    REQUEST_DURATION_MS
        .with_label_values(&[resolution])
        .observe(duration_ms);
}

/// Helper to record an interception outcome
pub fn record_interception(resolution: &str) {
    INTERCEPTIONS_TOTAL.with_label_values(&[resolution]).inc();
}
