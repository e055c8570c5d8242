//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Ingestion Metrics
    pub static ref REPORTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "wardwatch_reports_created_total",
        "Total number of reports created"
    ).expect("metric can be created");
    pub static ref PANIC_ALERTS_TOTAL: IntCounter = IntCounter::new(
        "wardwatch_panic_alerts_total",
        "Total number of panic alerts received over the live channel"
    ).expect("metric can be created");

    // Live channel Metrics
    pub static ref WS_CONNECTIONS: IntGauge = IntGauge::new(
        "wardwatch_ws_connections",
        "Current number of connected live-channel clients"
    ).expect("metric can be created");
    pub static ref BROADCASTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wardwatch_broadcasts_total", "Total number of events broadcast to live clients"),
        &["event"]
    ).expect("metric can be created");
    pub static ref BROADCAST_SEND_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "wardwatch_broadcast_send_failures_total",
        "Total number of per-client send failures during broadcast"
    ).expect("metric can be created");

    // Enrichment Metrics
    pub static ref GEOCODE_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wardwatch_geocode_lookups_total", "Total number of reverse-geocode lookups"),
        &["result"]
    ).expect("metric can be created");

    // Push delivery Metrics
    pub static ref PUSH_DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wardwatch_push_deliveries_total", "Total number of push delivery attempts"),
        &["result"]
    ).expect("metric can be created");
    pub static ref PUSH_DISPATCH_DURATION_SECONDS: prometheus::Histogram = prometheus::Histogram::with_opts(
        HistogramOpts::new(
            "wardwatch_push_dispatch_duration_seconds",
            "Duration of a full push fan-out (all attempts joined)"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wardwatch_errors_total", "Total number of errors"),
        &["error_type", "endpoint"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(REPORTS_CREATED_TOTAL.clone()))
        .expect("REPORTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PANIC_ALERTS_TOTAL.clone()))
        .expect("PANIC_ALERTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(WS_CONNECTIONS.clone()))
        .expect("WS_CONNECTIONS can be registered");
    REGISTRY
        .register(Box::new(BROADCASTS_TOTAL.clone()))
        .expect("BROADCASTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BROADCAST_SEND_FAILURES_TOTAL.clone()))
        .expect("BROADCAST_SEND_FAILURES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GEOCODE_LOOKUPS_TOTAL.clone()))
        .expect("GEOCODE_LOOKUPS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PUSH_DELIVERIES_TOTAL.clone()))
        .expect("PUSH_DELIVERIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PUSH_DISPATCH_DURATION_SECONDS.clone()))
        .expect("PUSH_DISPATCH_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
