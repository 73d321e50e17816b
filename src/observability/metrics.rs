//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, build latency, cache efficiency)
//! - Expose Prometheus-compatible metrics endpoint when enabled
//!
//! # Metrics
//! - `substub_requests_total` (counter): requests by format, outcome
//! - `substub_build_duration_seconds` (histogram): build latency by format
//! - `substub_file_cache_total` (counter): file cache lookups by result
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Outcome labels are the error kind names, never user data

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "substub_requests_total";
pub const BUILD_DURATION: &str = "substub_build_duration_seconds";
pub const FILE_CACHE_TOTAL: &str = "substub_file_cache_total";

/// Start the Prometheus scrape endpoint on `addr`. Must run inside a
/// Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to start metrics endpoint"),
    }
}

/// Count one request for `format` ending in `outcome`.
pub fn record_request(format: &'static str, outcome: &'static str) {
    metrics::counter!(REQUESTS_TOTAL, "format" => format, "outcome" => outcome).increment(1);
}

/// Record time spent building a `format` document since `start`.
pub fn record_build_duration(format: &'static str, start: Instant) {
    metrics::histogram!(BUILD_DURATION, "format" => format)
        .record(start.elapsed().as_secs_f64());
}

/// Count a file cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(FILE_CACHE_TOTAL, "result" => result).increment(1);
}
