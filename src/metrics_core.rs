//! Core metrics traits (always compiled, no feature gate).
//!
//! Provides `MetricsRecorder` trait and `NoopMetrics` so that all modules
//! can accept `Arc<dyn MetricsRecorder>` unconditionally.  When the
//! `metrics` feature is disabled, `NoopMetrics` is injected and the
//! compiler optimises every call to a no-op.
//!
//! `RequestRateTracker` is independent of the feature: it backs
//! `/health/rpm` in every build.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Trait for recording application metrics.
///
/// All methods are no-op by default, allowing partial implementation.
/// Implementations must be thread-safe (Send + Sync).
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync {
    // ===== Dispatch =====

    /// Observe one non-detached capability call
    fn observe_capability_call(
        &self,
        capability: &str,
        mode: &str,
        outcome: &str,
        duration_secs: f64,
    ) {
    }

    /// Record a swallowed fire-and-forget failure
    fn inc_fire_and_forget_failure(&self, capability: &str, reason: &str) {}

    // ===== Links =====

    /// Record a generated code that was already taken
    fn inc_code_collision(&self) {}

    // ===== Redirect =====

    /// Record redirect response
    fn inc_redirect(&self, status: &str) {}

    // ===== Analytics =====

    fn inc_click_recorded(&self) {}

    // ===== Auth =====

    /// Record authentication failure
    fn inc_auth_failure(&self, verifier: &str) {}

    // ===== HTTP (timing middleware) =====

    /// Increment active connections counter
    fn inc_active_connections(&self) {}

    /// Decrement active connections counter
    fn dec_active_connections(&self) {}

    /// Observe HTTP request duration and count it
    fn observe_http_request(&self, method: &str, endpoint: &str, status: &str, duration_secs: f64) {
    }
}

/// Noop metrics implementation for testing and non-metrics builds.
///
/// All methods do nothing, allowing code to run without Prometheus dependencies.
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

impl NoopMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self::new())
    }
}

impl Default for NoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Modules reported by `/health/rpm`
pub const RATE_MODULES: &[&str] = &["links", "redirector", "analytics", "capabilities"];

/// 请求速率统计窗口
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Requests per module over a sliding window
pub struct RequestRateTracker {
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RequestRateTracker {
    pub fn new() -> Self {
        Self::with_window(RATE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            hits: DashMap::new(),
        }
    }

    pub fn record(&self, module: &str) {
        self.record_at(module, Instant::now());
    }

    fn record_at(&self, module: &str, now: Instant) {
        let mut entry = self.hits.entry(module.to_string()).or_default();
        entry.push_back(now);
        prune(&mut entry, now, self.window);
    }

    /// Requests seen for `module` within the window
    pub fn rate(&self, module: &str) -> usize {
        self.rate_at(module, Instant::now())
    }

    fn rate_at(&self, module: &str, now: Instant) -> usize {
        match self.hits.get_mut(module) {
            Some(mut entry) => {
                prune(&mut entry, now, self.window);
                entry.len()
            }
            None => 0,
        }
    }

    /// Rates for every known module plus any module that was recorded
    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        let mut modules: Vec<String> = RATE_MODULES.iter().map(|m| m.to_string()).collect();
        for entry in self.hits.iter() {
            if !modules.contains(entry.key()) {
                modules.push(entry.key().clone());
            }
        }
        modules
            .into_iter()
            .map(|m| {
                let rate = self.rate(&m);
                (m, rate)
            })
            .collect()
    }
}

impl Default for RequestRateTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn prune(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = hits.front() {
        if now.saturating_duration_since(*front) > window {
            hits.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_counts_within_window() {
        let tracker = RequestRateTracker::new();
        tracker.record("links");
        tracker.record("links");
        tracker.record("redirector");

        assert_eq!(tracker.rate("links"), 2);
        assert_eq!(tracker.rate("redirector"), 1);
        assert_eq!(tracker.rate("analytics"), 0);
    }

    #[test]
    fn test_old_hits_fall_out_of_window() {
        let tracker = RequestRateTracker::with_window(Duration::from_secs(60));
        let start = Instant::now();
        tracker.record_at("links", start);
        tracker.record_at("links", start + Duration::from_secs(30));

        assert_eq!(tracker.rate_at("links", start + Duration::from_secs(59)), 2);
        assert_eq!(tracker.rate_at("links", start + Duration::from_secs(61)), 1);
        assert_eq!(tracker.rate_at("links", start + Duration::from_secs(120)), 0);
    }

    #[test]
    fn test_snapshot_lists_known_modules() {
        let tracker = RequestRateTracker::new();
        tracker.record("capabilities");
        let snapshot = tracker.snapshot();

        for module in RATE_MODULES {
            assert!(snapshot.contains_key(*module));
        }
        assert_eq!(snapshot["capabilities"], 1);
    }
}
