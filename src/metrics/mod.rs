//! Prometheus metrics for the book catalog.
//!
//! Every metric lives under the `book_catalog` namespace and is registered on
//! [`PROMETHEUS_REGISTRY`] by [`init_metrics`]. Covered areas:
//! - HTTP requests (via [`track_metrics`])
//! - Write pipeline throughput, latency and queue depth
//! - Search requests
//! - Activity buffering and flushing
//!
//! # Example
//! ```no_run
//! use book_catalog::metrics::{self, SEARCH_REQUESTS_TOTAL};
//!
//! metrics::init_metrics().unwrap();
//! SEARCH_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
//! println!("{}", metrics::gather_metrics());
//! ```

mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

const NAMESPACE: &str = "book_catalog";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Write Pipeline Metrics
    // ============================================================================

    /// Labels: operation
    pub static ref MUTATIONS_SUBMITTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mutations_submitted_total", "Mutations accepted onto the write queue")
            .namespace(NAMESPACE),
        &["operation"]
    ).expect("Failed to create MUTATIONS_SUBMITTED_TOTAL metric");

    /// Labels: operation, outcome
    pub static ref MUTATIONS_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mutations_completed_total", "Mutations answered by a worker")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create MUTATIONS_COMPLETED_TOTAL metric");

    /// Labels: operation
    pub static ref MUTATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "mutation_duration_seconds",
            "Time a worker spends applying one mutation"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"]
    ).expect("Failed to create MUTATION_DURATION_SECONDS metric");

    /// Tasks queued but not yet picked up by a worker
    pub static ref WRITE_QUEUE_DEPTH: IntGauge = IntGauge::with_opts(
        Opts::new("write_queue_depth", "Tasks waiting in the write queue")
            .namespace(NAMESPACE)
    ).expect("Failed to create WRITE_QUEUE_DEPTH metric");

    // ============================================================================
    // Search Metrics
    // ============================================================================

    /// Labels: outcome
    pub static ref SEARCH_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("search_requests_total", "Search requests sent to the backend")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    pub static ref SEARCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("search_duration_seconds", "Search round-trip time in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    // ============================================================================
    // Activity Metrics
    // ============================================================================

    pub static ref ACTIVITY_EVENTS_DROPPED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("activity_events_dropped_total", "Activity events dropped because the buffer was full")
            .namespace(NAMESPACE)
    ).expect("Failed to create ACTIVITY_EVENTS_DROPPED_TOTAL metric");

    pub static ref ACTIVITY_EVENTS_FLUSHED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("activity_events_flushed_total", "Activity events written to the store")
            .namespace(NAMESPACE)
    ).expect("Failed to create ACTIVITY_EVENTS_FLUSHED_TOTAL metric");

    pub static ref ACTIVITY_FLUSH_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("activity_flush_failures_total", "Per-user batches the store failed to persist")
            .namespace(NAMESPACE)
    ).expect("Failed to create ACTIVITY_FLUSH_FAILURES_TOTAL metric");
}

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Register all metrics with [`PROMETHEUS_REGISTRY`]; later calls are no-ops
pub fn init_metrics() -> Result<(), prometheus::Error> {
    INITIALIZED.get_or_try_init(register_all)?;
    Ok(())
}

fn register_all() -> Result<(), prometheus::Error> {
    // HTTP
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;

    // Write pipeline
    PROMETHEUS_REGISTRY.register(Box::new(MUTATIONS_SUBMITTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MUTATIONS_COMPLETED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MUTATION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(WRITE_QUEUE_DEPTH.clone()))?;

    // Search
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;

    // Activity
    PROMETHEUS_REGISTRY.register(Box::new(ACTIVITY_EVENTS_DROPPED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ACTIVITY_EVENTS_FLUSHED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ACTIVITY_FLUSH_FAILURES_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_repeatable() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics().unwrap();
        SEARCH_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();

        let metrics = gather_metrics();
        assert!(metrics.contains("book_catalog_search_requests_total"));
    }
}
