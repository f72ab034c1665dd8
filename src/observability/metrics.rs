//! Metrics collection and exposition.
//!
//! # Metrics
//! - `demux_config_reloads_total` (counter): reload attempts by outcome
//! - `demux_routing_keys` (gauge): routing keys in the published table
//! - `demux_resolve_total` (counter): lookups, labelled by whether anything matched
//! - `demux_envelopes_rejected_total` (counter): invalid messages by reason
//! - `demux_events_dropped_total` (counter): events no destination wanted
//! - `demux_deliveries_total` (counter): deliveries by outcome
//! - `demux_delivery_duration_seconds` (histogram): per-destination latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_reload(outcome: &'static str) {
    ::metrics::counter!("demux_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_routing_keys(count: usize) {
    ::metrics::gauge!("demux_routing_keys").set(count as f64);
}

pub fn record_resolve(matched: bool) {
    let matched = if matched { "true" } else { "false" };
    ::metrics::counter!("demux_resolve_total", "matched" => matched).increment(1);
}

pub fn record_envelope_rejected(reason: &'static str) {
    ::metrics::counter!("demux_envelopes_rejected_total", "reason" => reason).increment(1);
}

pub fn record_dropped() {
    ::metrics::counter!("demux_events_dropped_total").increment(1);
}

pub fn record_delivery(outcome: &'static str, start: Instant) {
    ::metrics::counter!("demux_deliveries_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("demux_delivery_duration_seconds").record(start.elapsed().as_secs_f64());
}
