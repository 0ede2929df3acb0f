//! HTTP surface
//!
//! The public API (`/r`, `/links`, `/analytics`, `/health`) looks the same in
//! every topology: handlers only talk to the dispatcher. `/capabilities` is
//! the peer-to-peer wire endpoint used by remote invokers.

pub mod middleware;
pub mod services;

use std::sync::Arc;

use actix_web::web;
use chrono::{DateTime, Utc};

use crate::dispatch::Dispatcher;
use crate::metrics_core::{MetricsRecorder, RequestRateTracker};
use crate::services::RedirectService;

/// Shared handler state, registered once as `web::Data<AppState>`
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub redirect: RedirectService,
    pub rates: Arc<RequestRateTracker>,
    pub metrics: Arc<dyn MetricsRecorder>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        rates: Arc<RequestRateTracker>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        let redirect = RedirectService::new(dispatcher.clone()).with_metrics(metrics.clone());
        Self {
            dispatcher,
            redirect,
            rates,
            metrics,
            started_at: Utc::now(),
        }
    }
}

/// Mount every route. Callers add `web::Data<AppState>` and middleware.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/health").service(services::health_routes()))
        .service(web::scope("/capabilities").service(services::capability_routes()))
        .service(web::scope("/links").service(services::link_routes()))
        .service(web::scope("/analytics").service(services::analytics_routes()))
        .service(web::scope("/r").service(services::redirect_routes()));
}
