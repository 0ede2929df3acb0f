//! Prometheus-backed `MetricsRecorder`

use std::sync::Arc;

use super::METRICS;
use crate::metrics_core::MetricsRecorder;

/// Wrapper that delegates to the global METRICS singleton.
///
/// This allows the global `Lazy<Metrics>` to be used with `Arc<dyn MetricsRecorder>`
/// since `Lazy<T>` doesn't implement `Clone`.
pub struct PrometheusMetricsWrapper;

impl PrometheusMetricsWrapper {
    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self)
    }
}

impl MetricsRecorder for PrometheusMetricsWrapper {
    fn observe_capability_call(
        &self,
        capability: &str,
        mode: &str,
        outcome: &str,
        duration_secs: f64,
    ) {
        METRICS
            .capability_call_duration_seconds
            .with_label_values(&[capability, mode, outcome])
            .observe(duration_secs);
    }

    fn inc_fire_and_forget_failure(&self, capability: &str, reason: &str) {
        METRICS
            .fire_and_forget_failures_total
            .with_label_values(&[capability, reason])
            .inc();
    }

    fn inc_code_collision(&self) {
        METRICS.code_collisions_total.inc();
    }

    fn inc_redirect(&self, status: &str) {
        METRICS.redirects_total.with_label_values(&[status]).inc();
    }

    fn inc_click_recorded(&self) {
        METRICS.clicks_recorded_total.inc();
    }

    fn inc_auth_failure(&self, verifier: &str) {
        METRICS
            .auth_failures_total
            .with_label_values(&[verifier])
            .inc();
    }

    fn inc_active_connections(&self) {
        METRICS.http_active_connections.inc();
    }

    fn dec_active_connections(&self) {
        METRICS.http_active_connections.dec();
    }

    fn observe_http_request(&self, method: &str, endpoint: &str, status: &str, duration_secs: f64) {
        METRICS
            .http_request_duration_seconds
            .with_label_values(&[method, endpoint, status])
            .observe(duration_secs);
        METRICS
            .http_requests_total
            .with_label_values(&[method, endpoint, status])
            .inc();
    }
}
