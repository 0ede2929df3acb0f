use actix_web::{HttpResponse, Responder, web};
use std::collections::BTreeMap;
use std::time::Instant;
use strum::IntoEnumIterator;
use tracing::{debug, trace};

use crate::api::AppState;
use crate::capability::Capability;
use crate::metrics_core::RATE_WINDOW;

use super::helpers::success_response;
use super::metrics::MetricsService;
use super::types::{HealthResponse, RpmResponse};

/// Health Service
///
/// 只读取进程内状态（topology、启动时间、速率统计），不经过 dispatcher，
/// 远端节点不可达时探针仍能快速响应。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let topology: BTreeMap<String, String> = Capability::iter()
            .map(|c| {
                (
                    c.to_string(),
                    state.dispatcher.topology().mode(c).as_str().to_string(),
                )
            })
            .collect();

        let now = chrono::Utc::now();
        let uptime = (now - state.started_at).num_seconds().max(0) as u64;

        let health = HealthResponse {
            status: "healthy".to_string(),
            timestamp: now.to_rfc3339(),
            uptime,
            topology,
            response_time_ms: start_time.elapsed().as_millis() as u32,
        };

        debug!("Health check completed in {:?}", start_time.elapsed());
        success_response(health)
    }

    // 简单的就绪检查，只返回 200 状态码
    pub async fn readiness_check() -> impl Responder {
        trace!("Received readiness check request");

        HttpResponse::Ok()
            .append_header(("Content-Type", "text/plain"))
            .body("OK")
    }

    // 活跃性检查
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");

        HttpResponse::NoContent().finish()
    }

    /// Requests per module over the sliding window
    pub async fn rpm(state: web::Data<AppState>) -> impl Responder {
        success_response(RpmResponse {
            window_secs: RATE_WINDOW.as_secs(),
            modules: state.rates.snapshot(),
        })
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
        .route("/rpm", web::get().to(HealthService::rpm))
        .route("/metrics", web::get().to(MetricsService::metrics))
}
