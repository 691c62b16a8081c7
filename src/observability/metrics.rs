//! Metrics collection and exposition.
//!
//! # Metrics
//! - `counter_requests_total` (counter): requests by method, status
//! - `counter_request_duration_seconds` (histogram): handler latency
//! - `counter_increments_total` (counter): successful increments by strategy
//! - `counter_cas_conflicts_total` (counter): compare-and-swap retries
//! - `counter_store_errors_total` (counter): store failures by operation

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`. Must run inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "counter_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("counter_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_increment(strategy: &'static str) {
    counter!("counter_increments_total", "strategy" => strategy).increment(1);
}

pub fn record_cas_conflict() {
    counter!("counter_cas_conflicts_total").increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("counter_store_errors_total", "op" => op).increment(1);
}
