//! `/links` handlers
//!
//! Every request carries its own bearer credential; the owner is whatever
//! the authorize capability says it is.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::api::AppState;
use crate::capability::Capability;
use crate::capability::payloads::{
    CreateLinkRequest, CredentialRequest, DeleteLinkResponse, LinkCodeRequest, UpdateLinkRequest,
};
use crate::errors::{MorphlinkError, Result};
use crate::storage::Link;

use super::error_code::ErrorCode;
use super::helpers::{api_result, bearer_credential, error_from_morphlink, json_response};
use super::types::{PostNewLink, PutLinkTarget};

/// Decode a JSON body, reporting failures as `InvalidRequest`
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.is_empty() {
        return Err(MorphlinkError::invalid_request("request body is required"));
    }
    Ok(serde_json::from_slice(body)?)
}

pub struct LinksApi;

impl LinksApi {
    pub async fn create_link(
        req: HttpRequest,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let result: Result<Link> = async {
            let credential = bearer_credential(&req)?;
            let new_link: PostNewLink = parse_body(&body)?;
            state
                .dispatcher
                .call(
                    Capability::CreateLink,
                    &CreateLinkRequest {
                        credential,
                        target_url: new_link.target_url,
                        code: new_link.code,
                    },
                )
                .await
        }
        .await;

        match result {
            Ok(link) => {
                info!("API: created link '{}' -> {}", link.code, link.target_url);
                json_response(StatusCode::CREATED, ErrorCode::Success, "Created", Some(link))
            }
            Err(e) => error_from_morphlink(&e),
        }
    }

    pub async fn list_links(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
        let result: Result<Vec<Link>> = async {
            let credential = bearer_credential(&req)?;
            state
                .dispatcher
                .call(Capability::ListLinks, &CredentialRequest { credential })
                .await
        }
        .await;
        api_result(result)
    }

    pub async fn get_link(
        req: HttpRequest,
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let code = path.into_inner();
        let result: Result<Link> = async {
            let credential = bearer_credential(&req)?;
            state
                .dispatcher
                .call(Capability::GetLink, &LinkCodeRequest { credential, code })
                .await
        }
        .await;
        api_result(result)
    }

    pub async fn update_link(
        req: HttpRequest,
        path: web::Path<String>,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let code = path.into_inner();
        let result: Result<Link> = async {
            let credential = bearer_credential(&req)?;
            let update: PutLinkTarget = parse_body(&body)?;
            state
                .dispatcher
                .call(
                    Capability::UpdateLink,
                    &UpdateLinkRequest {
                        credential,
                        code,
                        target_url: update.target_url,
                    },
                )
                .await
        }
        .await;
        api_result(result)
    }

    pub async fn delete_link(
        req: HttpRequest,
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let code = path.into_inner();
        let result: Result<DeleteLinkResponse> = async {
            let credential = bearer_credential(&req)?;
            state
                .dispatcher
                .call(Capability::DeleteLink, &LinkCodeRequest { credential, code })
                .await
        }
        .await;
        api_result(result)
    }
}

pub fn link_routes() -> actix_web::Scope {
    web::scope("")
        .route("", web::post().to(LinksApi::create_link))
        .route("", web::get().to(LinksApi::list_links))
        .route("/{code}", web::get().to(LinksApi::get_link))
        .route("/{code}", web::put().to(LinksApi::update_link))
        .route("/{code}", web::delete().to(LinksApi::delete_link))
}
