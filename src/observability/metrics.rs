//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relayed requests by outcome, status
//! - `relay_upstream_duration_seconds` (histogram): time until the backend
//!   answered with headers (or failed)
//! - `relay_active_streams` (gauge): response bodies currently being piped
//! - `relay_streamed_bytes_total` (counter): bytes piped to callers
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one relay attempt.
pub fn record_relay(outcome: &'static str, status: StatusCode, start_time: Instant) {
    metrics::counter!(
        "relay_requests_total",
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("relay_upstream_duration_seconds", "outcome" => outcome)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn stream_opened() {
    metrics::gauge!("relay_active_streams").increment(1.0);
}

pub fn stream_closed(bytes: u64) {
    metrics::gauge!("relay_active_streams").decrement(1.0);
    metrics::counter!("relay_streamed_bytes_total").increment(bytes);
}
