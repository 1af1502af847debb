/// Metrics and telemetry for Identity Lens
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Chain gateway request counts and latencies
/// - Query cache hit/miss/stale rates and retries
/// - Identity resolution outcomes and skipped registrations

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, Gauge, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};

lazy_static! {
    // ========== Chain Metrics ==========

    /// Chain gateway requests by chain, operation and outcome
    pub static ref CHAIN_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chain_requests_total",
        "Total number of chain gateway requests",
        &["chain", "operation", "status"]
    )
    .unwrap();

    /// Chain gateway request duration in seconds
    pub static ref CHAIN_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "chain_request_duration_seconds",
        "Chain gateway request latencies in seconds",
        &["chain", "operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Cache Metrics ==========

    /// Cache hits by cache type
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type"]
    )
    .unwrap();

    /// Cache misses by cache type
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type"]
    )
    .unwrap();

    /// Stale values served while a refetch runs
    pub static ref CACHE_STALE_SERVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_stale_served_total",
        "Total number of stale cache values served",
        &["cache_type"]
    )
    .unwrap();

    /// Retried query fetches
    pub static ref QUERY_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "query_retries_total",
        "Total number of retried query fetches",
        &["cache_type"]
    )
    .unwrap();

    /// Entries currently held by each cache
    pub static ref CACHE_ENTRIES: IntGaugeVec = register_int_gauge_vec!(
        "cache_entries",
        "Number of entries held in the query cache",
        &["cache_type"]
    )
    .unwrap();

    // ========== Identity Metrics ==========

    /// Identity resolutions by chain and outcome
    pub static ref IDENTITY_RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "identity_resolutions_total",
        "Total number of identity resolutions",
        &["chain", "outcome"]
    )
    .unwrap();

    /// Registrations skipped during search because they failed to decode
    pub static ref IDENTITY_DECODE_SKIPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "identity_decode_skips_total",
        "Total number of identity registrations skipped during search",
        &["chain"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a chain gateway request
pub fn record_chain_request(chain: &str, operation: &str, status: &str, duration: f64) {
    CHAIN_REQUESTS_TOTAL
        .with_label_values(&[chain, operation, status])
        .inc();
    CHAIN_REQUEST_DURATION_SECONDS
        .with_label_values(&[chain, operation])
        .observe(duration);
}

/// Record a cache access
pub fn record_cache_access(cache_type: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[cache_type]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[cache_type]).inc();
    }
}

/// Record a stale value being served
pub fn record_stale_serve(cache_type: &str) {
    CACHE_STALE_SERVED_TOTAL
        .with_label_values(&[cache_type])
        .inc();
}

/// Record a query retry
pub fn record_query_retry(cache_type: &str) {
    QUERY_RETRIES_TOTAL.with_label_values(&[cache_type]).inc();
}

/// Update the entry count of a cache
pub fn set_cache_entries(cache_type: &str, entries: usize) {
    CACHE_ENTRIES
        .with_label_values(&[cache_type])
        .set(entries as i64);
}

/// Record an identity resolution outcome
pub fn record_identity_resolution(chain: &str, outcome: &str) {
    IDENTITY_RESOLUTIONS_TOTAL
        .with_label_values(&[chain, outcome])
        .inc();
}

/// Record a registration skipped during search
pub fn record_decode_skip(chain: &str) {
    IDENTITY_DECODE_SKIPS_TOTAL.with_label_values(&[chain]).inc();
}

/// Update the uptime gauge
pub fn set_uptime(seconds: f64) {
    UPTIME_SECONDS.set(seconds);
}
