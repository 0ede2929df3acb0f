//! Capability wire endpoint
//!
//! `POST /capabilities/{name}` runs a capability this process hosts and
//! answers with the raw result, or a `{kind, message}` body on failure.
//! When `[topology] peer_token` is set, callers must present it in
//! `X-Morphlink-Peer-Token`.

use std::str::FromStr;

use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::api::AppState;
use crate::capability::Capability;
use crate::dispatch::{InvokeOptions, PEER_TOKEN_HEADER};
use crate::errors::MorphlinkError;

use super::helpers::wire_error;

pub struct CapabilityEndpoint;

impl CapabilityEndpoint {
    pub async fn invoke(
        req: HttpRequest,
        path: web::Path<String>,
        body: web::Bytes,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let name = path.into_inner();

        let presented = req
            .headers()
            .get(PEER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if !state.dispatcher.topology().admits_peer(presented) {
            warn!(
                "Rejecting call to '{}' from {:?}: bad peer token",
                name,
                req.peer_addr()
            );
            return wire_error(&MorphlinkError::unauthorized("invalid peer token"));
        }

        let capability = match Capability::from_str(&name) {
            Ok(c) if state.dispatcher.hosts(c) => c,
            _ => {
                debug!("Rejecting call to capability '{}' not hosted here", name);
                return wire_error(&MorphlinkError::unknown_capability(format!(
                    "capability '{}' is not hosted by this process",
                    name
                )));
            }
        };

        let payload = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&body) {
                Ok(v) => v,
                Err(e) => {
                    return wire_error(&MorphlinkError::invalid_request(format!(
                        "invalid JSON payload: {}",
                        e
                    )));
                }
            }
        };

        trace!("Serving remote call to '{}'", capability);
        match state
            .dispatcher
            .invoke(capability, payload, InvokeOptions::default())
            .await
        {
            Ok(value) => HttpResponse::Ok().json(value),
            Err(e) => wire_error(&e),
        }
    }
}

pub fn capability_routes() -> actix_web::Scope {
    web::scope("").route("/{name}", web::post().to(CapabilityEndpoint::invoke))
}
