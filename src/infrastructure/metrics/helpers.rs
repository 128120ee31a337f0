//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::infrastructure::redis::CircuitState;

use super::{
    BROADCAST_FAILED_TOTAL, BROADCAST_PUSHED_TOTAL, BROADCAST_SKIPPED_TOTAL,
    MAIL_DELIVERED_TOTAL, MAIL_DELIVERY_LATENCY, MAIL_FAILED_TOTAL, MAIL_IN_FLIGHT,
    MAIL_REJECTED_TOTAL, MAIL_SUBMITTED_TOTAL, REDIS_CIRCUIT_BREAKER_STATE,
    REDIS_CONNECTION_STATUS,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording mail metrics
pub struct MailMetrics;

impl MailMetrics {
    pub fn record_submitted() {
        MAIL_SUBMITTED_TOTAL.inc();
    }

    pub fn record_started() {
        MAIL_IN_FLIGHT.inc();
    }

    /// Record a resolved delivery; `failure_kind` is `None` on success
    pub fn record_finished(latency: Duration, failure_kind: Option<&str>) {
        MAIL_IN_FLIGHT.dec();
        MAIL_DELIVERY_LATENCY.observe(latency.as_secs_f64());
        match failure_kind {
            None => MAIL_DELIVERED_TOTAL.inc(),
            Some(kind) => MAIL_FAILED_TOTAL.with_label_values(&[kind]).inc(),
        }
    }

    pub fn record_rejected(reason: &str) {
        MAIL_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_pushed(kind: &str) {
        BROADCAST_PUSHED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_failed(kind: &str) {
        BROADCAST_FAILED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_skipped(kind: &str) {
        BROADCAST_SKIPPED_TOTAL.with_label_values(&[kind]).inc();
    }
}

/// Helper struct for Redis transport metrics
pub struct RedisMetrics;

impl RedisMetrics {
    pub fn set_connected(connected: bool) {
        REDIS_CONNECTION_STATUS.set(if connected { 1 } else { 0 });
    }

    pub fn set_circuit_state(state: CircuitState) {
        REDIS_CIRCUIT_BREAKER_STATE.set(state as i64);
    }
}
