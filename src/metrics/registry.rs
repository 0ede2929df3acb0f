//! Global metrics registry
//!
//! Defines all Prometheus metrics used in the application.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};

/// Global metrics instance
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Application metrics container
pub struct Metrics {
    /// Internal Prometheus registry
    registry: Registry,

    // ===== Dispatch metrics =====
    /// Capability call latency by capability, mode and outcome
    pub capability_call_duration_seconds: HistogramVec,
    /// Swallowed fire-and-forget failures by capability and reason
    pub fire_and_forget_failures_total: CounterVec,

    // ===== Link metrics =====
    pub code_collisions_total: IntCounter,

    // ===== Redirect metrics =====
    /// Total number of redirects by status code
    pub redirects_total: CounterVec,

    // ===== Analytics metrics =====
    pub clicks_recorded_total: IntCounter,

    // ===== Auth metrics =====
    pub auth_failures_total: CounterVec,

    // ===== HTTP metrics =====
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_active_connections: Gauge,

    // ===== System metrics =====
    /// Server uptime in seconds
    pub uptime_seconds: Gauge,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let capability_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "morphlink_capability_call_duration_seconds",
                "Capability call latency by capability, mode and outcome",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
            &["capability", "mode", "outcome"],
        )
        .expect("Failed to create capability_call_duration_seconds metric");

        let fire_and_forget_failures_total = CounterVec::new(
            Opts::new(
                "morphlink_fire_and_forget_failures_total",
                "Detached capability calls that failed",
            ),
            &["capability", "reason"],
        )
        .expect("Failed to create fire_and_forget_failures_total metric");

        let code_collisions_total = IntCounter::new(
            "morphlink_code_collisions_total",
            "Generated short codes that were already taken",
        )
        .expect("Failed to create code_collisions_total metric");

        let redirects_total = CounterVec::new(
            Opts::new(
                "morphlink_redirects_total",
                "Total number of redirects by status",
            ),
            &["status"],
        )
        .expect("Failed to create redirects_total metric");

        let clicks_recorded_total = IntCounter::new(
            "morphlink_clicks_recorded_total",
            "Click events appended to the click store",
        )
        .expect("Failed to create clicks_recorded_total metric");

        let auth_failures_total = CounterVec::new(
            Opts::new(
                "morphlink_auth_failures_total",
                "Rejected credentials by verifier",
            ),
            &["verifier"],
        )
        .expect("Failed to create auth_failures_total metric");

        let http_requests_total = CounterVec::new(
            Opts::new("morphlink_http_requests_total", "HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "morphlink_http_request_duration_seconds",
                "HTTP request latency",
            ),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let http_active_connections = Gauge::new(
            "morphlink_http_active_connections",
            "Requests currently being served",
        )
        .expect("Failed to create http_active_connections metric");

        let uptime_seconds = Gauge::new("morphlink_uptime_seconds", "Server uptime in seconds")
            .expect("Failed to create uptime_seconds metric");

        // Register all metrics
        registry
            .register(Box::new(capability_call_duration_seconds.clone()))
            .expect("Failed to register capability_call_duration_seconds");
        registry
            .register(Box::new(fire_and_forget_failures_total.clone()))
            .expect("Failed to register fire_and_forget_failures_total");
        registry
            .register(Box::new(code_collisions_total.clone()))
            .expect("Failed to register code_collisions_total");
        registry
            .register(Box::new(redirects_total.clone()))
            .expect("Failed to register redirects_total");
        registry
            .register(Box::new(clicks_recorded_total.clone()))
            .expect("Failed to register clicks_recorded_total");
        registry
            .register(Box::new(auth_failures_total.clone()))
            .expect("Failed to register auth_failures_total");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds");
        registry
            .register(Box::new(http_active_connections.clone()))
            .expect("Failed to register http_active_connections");
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("Failed to register uptime_seconds");

        Self {
            registry,
            capability_call_duration_seconds,
            fire_and_forget_failures_total,
            code_collisions_total,
            redirects_total,
            clicks_recorded_total,
            auth_failures_total,
            http_requests_total,
            http_request_duration_seconds,
            http_active_connections,
            uptime_seconds,
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
