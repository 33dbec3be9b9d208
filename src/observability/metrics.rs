//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_messages_total` (counter): inbound messages by outcome
//! - `bridge_local_calls_total` (counter): local calls by method, status
//! - `bridge_local_call_duration_seconds` (histogram): local call latency
//! - `bridge_replies_published_total` (counter): replies queued on the broker client
//! - `bridge_publish_failures_total` (counter): replies the broker rejected
//! - `bridge_queue_dropped_total` (counter): messages shed on a full queue
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter it is a no-op
//! - Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Count one processed inbound message.
pub fn record_message(outcome: &'static str) {
    counter!("bridge_messages_total", "outcome" => outcome).increment(1);
}

/// Record a completed (or failed) local call.
pub fn record_local_call(method: &str, status: u16, start: Instant) {
    counter!(
        "bridge_local_calls_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bridge_local_call_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_reply_published() {
    counter!("bridge_replies_published_total").increment(1);
}

pub fn record_publish_failure() {
    counter!("bridge_publish_failures_total").increment(1);
}

pub fn record_queue_dropped() {
    counter!("bridge_queue_dropped_total").increment(1);
}
