//! Prometheus metrics for the dispatch core.
//!
//! - Mail metrics (submitted, delivered, failed by error kind, rejected by reason)
//! - Broadcast metrics (pushed, failed, skipped by destination kind)
//! - Redis transport health

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, MailMetrics, RedisMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "notify";

lazy_static! {
    // ============================================================================
    // Mail Metrics
    // ============================================================================

    /// Mail deliveries admitted to the worker pool
    pub static ref MAIL_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_mail_submitted_total", METRIC_PREFIX),
        "Total mail deliveries admitted to the worker pool"
    ).unwrap();

    /// Mail deliveries confirmed by the transport
    pub static ref MAIL_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_mail_delivered_total", METRIC_PREFIX),
        "Total mail deliveries handed off by the transport"
    ).unwrap();

    /// Mail delivery failures by error kind
    pub static ref MAIL_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_mail_failed_total", METRIC_PREFIX),
        "Total mail delivery failures",
        &["kind"]
    ).unwrap();

    /// Mail deliveries refused at admission
    pub static ref MAIL_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_mail_rejected_total", METRIC_PREFIX),
        "Total mail deliveries refused by the worker pool",
        &["reason"]
    ).unwrap();

    /// Mail deliveries currently running
    pub static ref MAIL_IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_mail_in_flight", METRIC_PREFIX),
        "Mail deliveries currently running"
    ).unwrap();

    /// Time from submission to resolution
    pub static ref MAIL_DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_mail_delivery_latency_seconds", METRIC_PREFIX),
        "Mail delivery latency in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcast pushes accepted by the transport
    pub static ref BROADCAST_PUSHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcast_pushed_total", METRIC_PREFIX),
        "Total broadcasts pushed to the transport",
        &["kind"]
    ).unwrap();

    /// Broadcast pushes the transport failed
    pub static ref BROADCAST_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcast_failed_total", METRIC_PREFIX),
        "Total broadcasts the transport failed to push",
        &["kind"]
    ).unwrap();

    /// Broadcasts skipped because the destination identifier was absent
    pub static ref BROADCAST_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcast_skipped_total", METRIC_PREFIX),
        "Total broadcasts skipped for a missing destination",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Redis Metrics
    // ============================================================================

    /// Redis connection status (1 = connected, 0 = disconnected)
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Redis connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Redis circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref REDIS_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_redis_circuit_breaker_state", METRIC_PREFIX),
        "Redis circuit breaker state (0=closed, 1=open, 2=half-open)"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        MAIL_SUBMITTED_TOTAL.inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("notify_mail_submitted_total"));
    }

    #[test]
    fn test_broadcast_metrics() {
        BROADCAST_PUSHED_TOTAL.with_label_values(&["user"]).inc();
        BROADCAST_FAILED_TOTAL.with_label_values(&["role"]).inc();
        BROADCAST_SKIPPED_TOTAL.with_label_values(&["role"]).inc();
        // Just verify no panics
    }
}
