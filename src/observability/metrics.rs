//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_gate_requests_total` (counter): requests by upstream and outcome
//! - `relay_gate_upstream_failures_total` (counter): failures by upstream and kind
//! - `relay_gate_upstream_alive` (gauge): 1=alive, 0=dead
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one finished request against the upstream that served it.
pub fn record_request(upstream: &str, outcome: &'static str) {
    metrics::counter!(
        "relay_gate_requests_total",
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_upstream_failure(upstream: &str, kind: &'static str) {
    metrics::counter!(
        "relay_gate_upstream_failures_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_upstream_alive(upstream: &str, alive: bool) {
    metrics::gauge!("relay_gate_upstream_alive", "upstream" => upstream.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}
