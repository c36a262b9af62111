//! Prometheus Metrics
//!
//! Application-wide metrics collection.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge by role
//! - Inbound/delivered/rejected event counters by event name
//! - Handshake authentication failure counter by reason
//! - Broadcast fan-out size histogram

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections by role
pub static CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("commerce_gateway"),
        &["role"], // "admin", "customer"
    )
    .expect("Failed to create CONNECTIONS_ACTIVE metric")
});

/// Inbound events accepted for relay, by event name
pub static EVENTS_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_received_total", "Inbound events received for relay")
            .namespace("commerce_gateway"),
        &["event"],
    )
    .expect("Failed to create EVENTS_RECEIVED_TOTAL metric")
});

/// Events delivered to connections, by outbound event name
pub static EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_delivered_total", "Events delivered to connections")
            .namespace("commerce_gateway"),
        &["event"],
    )
    .expect("Failed to create EVENTS_DELIVERED_TOTAL metric")
});

/// Inbound frames rejected (malformed, unknown, or unauthorized)
pub static EVENTS_REJECTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_rejected_total", "Inbound frames rejected at the boundary")
            .namespace("commerce_gateway"),
        &["event"],
    )
    .expect("Failed to create EVENTS_REJECTED_TOTAL metric")
});

/// Handshake authentication failures by reason
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("auth_failures_total", "Handshake authentication failures")
            .namespace("commerce_gateway"),
        &["reason"], // "missing_token", "rejected", "invalid_token", "upstream"
    )
    .expect("Failed to create AUTH_FAILURES_TOTAL metric")
});

/// Number of connections reached per broadcast
pub static BROADCAST_FANOUT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("broadcast_fanout", "Connections reached per broadcast")
            .namespace("commerce_gateway")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
    )
    .expect("Failed to create BROADCAST_FANOUT metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(EVENTS_RECEIVED_TOTAL.clone()))
        .expect("Failed to register EVENTS_RECEIVED_TOTAL");
    registry
        .register(Box::new(EVENTS_DELIVERED_TOTAL.clone()))
        .expect("Failed to register EVENTS_DELIVERED_TOTAL");
    registry
        .register(Box::new(EVENTS_REJECTED_TOTAL.clone()))
        .expect("Failed to register EVENTS_REJECTED_TOTAL");
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .expect("Failed to register AUTH_FAILURES_TOTAL");
    registry
        .register(Box::new(BROADCAST_FANOUT.clone()))
        .expect("Failed to register BROADCAST_FANOUT");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}
