//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (requests, latency, upstream errors, channel state)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `relay_proxy_requests_total` (counter): proxied requests by method, status
//! - `relay_proxy_request_duration_seconds` (histogram): latency by method
//! - `relay_proxy_upstream_errors_total` (counter): unreachable upstreams
//! - `relay_config_updates_total` (counter): writes by outcome
//! - `relay_config_persistence_failures_total` (counter): backend failures
//! - `relay_channel_state` (gauge): 1 for the current state, 0 otherwise
//! - `relay_channel_reconnect_attempts_total` (counter)
//! - `relay_channel_messages_total` (counter): frames by direction
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::channel::ChannelState;

const CHANNEL_STATES: [ChannelState; 5] = [
    ChannelState::Disconnected,
    ChannelState::Connecting,
    ChannelState::Connected,
    ChannelState::Reconnecting,
    ChannelState::Closed,
];

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    counter!(
        "relay_proxy_requests_total",
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_proxy_request_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    counter!("relay_proxy_upstream_errors_total").increment(1);
}

/// `outcome` is `applied` or `rejected`.
pub fn record_config_update(outcome: &'static str) {
    counter!("relay_config_updates_total", "outcome" => outcome).increment(1);
}

pub fn record_persistence_failure() {
    counter!("relay_config_persistence_failures_total").increment(1);
}

pub fn record_channel_state(current: ChannelState) {
    for state in CHANNEL_STATES {
        let value = if state == current { 1.0 } else { 0.0 };
        gauge!("relay_channel_state", "state" => state.as_str()).set(value);
    }
}

pub fn record_reconnect_attempt() {
    counter!("relay_channel_reconnect_attempts_total").increment(1);
}

/// `direction` is `inbound` or `outbound`.
pub fn record_channel_message(direction: &'static str) {
    counter!("relay_channel_messages_total", "direction" => direction).increment(1);
}
