//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, traffic class
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_decisions_total` (counter): validator decisions by outcome
//! - `proxy_metered_bytes_total` (counter): bytes delivered under a quota
//! - `proxy_metered_response_bytes` (histogram): per-response metered size
//! - `proxy_usage_reports_total` (counter): usage reports by outcome
//! - `proxy_upstream_errors_total` (counter): transport failures by leg

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, traffic: &'static str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!(
        "proxy_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "traffic" => traffic
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "method" => method,
        "status" => status,
        "traffic" => traffic
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_decision(decision: &'static str) {
    counter!("proxy_decisions_total", "decision" => decision).increment(1);
}

pub fn record_metered_bytes(bytes: u64) {
    counter!("proxy_metered_bytes_total").increment(bytes);
    histogram!("proxy_metered_response_bytes").record(bytes as f64);
}

pub fn record_usage_report(outcome: &'static str) {
    counter!("proxy_usage_reports_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_error(leg: &'static str) {
    counter!("proxy_upstream_errors_total", "leg" => leg).increment(1);
}
