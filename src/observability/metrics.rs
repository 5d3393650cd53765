//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): dispatched requests by campaign, status
//! - `relay_forward_duration_seconds` (histogram): time to upstream response head
//! - `relay_resolve_failures_total` (counter): target resolution failures by reason
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(campaign: &str, status: u16) {
    metrics::counter!(
        "relay_requests_total",
        "campaign" => campaign.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_forward(campaign: &str, started: Instant) {
    metrics::histogram!("relay_forward_duration_seconds", "campaign" => campaign.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_resolve_failure(reason: &'static str) {
    metrics::counter!("relay_resolve_failures_total", "reason" => reason).increment(1);
}
