//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method and status
//! - `dispatch_request_duration_seconds` (histogram): time spent in dispatch
//! - `dispatch_firewall_rejections_total` (counter): rejections by reason
//! - `dispatch_handler_errors_total` (counter): adapter failures by kind
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start_time: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("dispatch_requests_total", &labels).increment(1);
    histogram!("dispatch_request_duration_seconds", &labels).record(start_time.elapsed().as_secs_f64());
}

pub fn record_firewall_rejection(reason: &'static str) {
    counter!("dispatch_firewall_rejections_total", "reason" => reason).increment(1);
}

pub fn record_handler_error(kind: &'static str) {
    counter!("dispatch_handler_errors_total", "kind" => kind).increment(1);
}
