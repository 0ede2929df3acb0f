//! `/analytics` handlers

use actix_web::{HttpRequest, HttpResponse, web};

use crate::api::AppState;
use crate::capability::Capability;
use crate::capability::payloads::{CredentialRequest, LinkCodeRequest, LinkStats, StatsResponse};
use crate::errors::Result;

use super::helpers::{api_result, bearer_credential};

pub struct AnalyticsApi;

impl AnalyticsApi {
    /// Click counts for every link the caller owns
    pub async fn get_stats(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
        let result: Result<StatsResponse> = async {
            let credential = bearer_credential(&req)?;
            state
                .dispatcher
                .call(Capability::GetStats, &CredentialRequest { credential })
                .await
        }
        .await;
        api_result(result)
    }

    pub async fn get_link_stats(
        req: HttpRequest,
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let code = path.into_inner();
        let result: Result<LinkStats> = async {
            let credential = bearer_credential(&req)?;
            state
                .dispatcher
                .call(Capability::GetLinkStats, &LinkCodeRequest { credential, code })
                .await
        }
        .await;
        api_result(result)
    }
}

pub fn analytics_routes() -> actix_web::Scope {
    web::scope("")
        .route("", web::get().to(AnalyticsApi::get_stats))
        .route("/{code}", web::get().to(AnalyticsApi::get_link_stats))
}
