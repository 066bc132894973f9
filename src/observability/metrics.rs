//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_plane_mutations_total` (counter): committed mutations by operation
//! - `control_plane_notifications_total` (counter): change events broadcast
//! - `control_plane_gateway_channels` (gauge): currently connected gateways
//! - `control_plane_channel_failures_total` (counter): channels dropped during send, by reason
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call is a no-op
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::ChangeKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_mutation(operation: ChangeKind) {
    counter!("control_plane_mutations_total", "operation" => operation.as_str()).increment(1);
}

pub fn record_notification() {
    counter!("control_plane_notifications_total").increment(1);
}

pub fn set_gateway_channels(count: usize) {
    gauge!("control_plane_gateway_channels").set(count as f64);
}

pub fn record_channel_failure(reason: &'static str) {
    counter!("control_plane_channel_failures_total", "reason" => reason).increment(1);
}
