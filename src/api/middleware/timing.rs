//! HTTP timing middleware
//!
//! Records HTTP request duration, request count, and active connections
//! through the injected `MetricsRecorder`, and feeds the per-module
//! request-rate tracker behind `/health/rpm`.

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics_core::{MetricsRecorder, RequestRateTracker};

/// Drop guard that decrements active connections when dropped.
/// Ensures `dec()` runs even if the future panics.
struct ActiveConnectionGuard(Arc<dyn MetricsRecorder>);

impl Drop for ActiveConnectionGuard {
    fn drop(&mut self) {
        self.0.dec_active_connections();
    }
}

/// HTTP timing middleware factory
#[derive(Clone)]
pub struct TimingMiddleware {
    metrics: Arc<dyn MetricsRecorder>,
    rates: Arc<RequestRateTracker>,
}

impl TimingMiddleware {
    pub fn new(metrics: Arc<dyn MetricsRecorder>, rates: Arc<RequestRateTracker>) -> Self {
        Self { metrics, rates }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TimingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingService {
            service: Rc::new(service),
            metrics: self.metrics.clone(),
            rates: self.rates.clone(),
        }))
    }
}

pub struct TimingService<S> {
    service: Rc<S>,
    metrics: Arc<dyn MetricsRecorder>,
    rates: Arc<RequestRateTracker>,
}

impl<S, B> Service<ServiceRequest> for TimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let metrics = self.metrics.clone();
        let start = Instant::now();

        // Extract method and endpoint for labels (avoid String allocation)
        let method = method_str(req.method());
        let endpoint = classify_endpoint(req.path());

        // Health probes are not counted towards module rates
        if endpoint != "health" && endpoint != "other" {
            self.rates.record(endpoint);
        }

        Box::pin(async move {
            metrics.inc_active_connections();
            let _guard = ActiveConnectionGuard(metrics.clone());

            let result = srv.call(req).await;

            let status = match &result {
                Ok(response) => status_str(response.status()),
                Err(_) => "500",
            };
            metrics.observe_http_request(method, endpoint, status, start.elapsed().as_secs_f64());

            result
        })
    }
}

/// Map HTTP method to a static string (avoids allocation).
fn method_str(method: &actix_web::http::Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

/// Map HTTP status code to a static string (avoids allocation for common codes).
fn status_str(status: actix_web::http::StatusCode) -> &'static str {
    match status.as_u16() {
        200 => "200",
        201 => "201",
        204 => "204",
        302 => "302",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        405 => "405",
        409 => "409",
        500 => "500",
        502 => "502",
        503 => "503",
        504 => "504",
        _ => "other",
    }
}

/// Classify request path into endpoint category
///
/// This prevents label cardinality explosion by grouping paths.
pub fn classify_endpoint(path: &str) -> &'static str {
    if path.starts_with("/links") {
        "links"
    } else if path.starts_with("/r/") {
        "redirector"
    } else if path.starts_with("/analytics") {
        "analytics"
    } else if path.starts_with("/capabilities") {
        "capabilities"
    } else if path.starts_with("/health") {
        "health"
    } else {
        "other"
    }
}
