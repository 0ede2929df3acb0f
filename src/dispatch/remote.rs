//! Capability calls over HTTP
//!
//! `POST {endpoint}/capabilities/{name}` with the payload as JSON body.
//! ureq is blocking, so every request runs on the blocking pool and is
//! additionally bounded by `tokio::time::timeout`. No retries.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace};
use ureq::Agent;

use crate::capability::Capability;
use crate::errors::{ErrorBody, MorphlinkError, Result};

/// 能力调用的 URL 路径前缀
pub const CAPABILITY_PATH: &str = "/capabilities";

/// 节点间共享密钥请求头
pub const PEER_TOKEN_HEADER: &str = "x-morphlink-peer-token";

#[derive(Default)]
pub struct RemoteInvoker {
    /// (endpoint, timeout_ms) → agent; ureq agents carry their timeout in config
    agents: DashMap<(String, u64), Agent>,
    peer_token: Option<String>,
}

impl RemoteInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `token` on every outgoing call
    pub fn with_peer_token(mut self, token: Option<String>) -> Self {
        self.peer_token = token;
        self
    }

    fn agent_for(&self, endpoint: &str, timeout: Duration) -> Agent {
        let key = (endpoint.to_string(), timeout.as_millis() as u64);
        self.agents
            .entry(key)
            .or_insert_with(|| {
                debug!(
                    "RemoteInvoker: creating agent for {} (timeout {:?})",
                    endpoint, timeout
                );
                Agent::config_builder()
                    .timeout_global(Some(timeout))
                    .http_status_as_error(false)
                    .build()
                    .into()
            })
            .clone()
    }

    pub async fn invoke(
        &self,
        endpoint: &str,
        capability: Capability,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let agent = self.agent_for(endpoint, timeout);
        let url = capability_url(endpoint, capability);
        trace!("RemoteInvoker: POST {}", url);

        let token = self.peer_token.clone();
        let task = tokio::task::spawn_blocking(move || {
            send_blocking(&agent, &url, token.as_deref(), &payload)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(MorphlinkError::internal(format!(
                "remote '{}' call task failed: {}",
                capability, join_err
            ))),
            Err(_) => Err(MorphlinkError::timeout(format!(
                "capability '{}' at {} did not answer within {:?}",
                capability, endpoint, timeout
            ))),
        }
    }
}

pub fn capability_url(endpoint: &str, capability: Capability) -> String {
    format!(
        "{}{}/{}",
        endpoint.trim_end_matches('/'),
        CAPABILITY_PATH,
        capability.as_ref()
    )
}

/// 同步发送请求（在 spawn_blocking 中调用）
fn send_blocking(
    agent: &Agent,
    url: &str,
    peer_token: Option<&str>,
    payload: &Value,
) -> Result<Value> {
    let mut request = agent.post(url);
    if let Some(token) = peer_token {
        request = request.header(PEER_TOKEN_HEADER, token);
    }
    let mut resp = request
        .send_json(payload)
        .map_err(|e| map_transport_error(url, e))?;

    let status = resp.status();
    if status.is_success() {
        return resp
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| map_transport_error(url, e));
    }

    // 非 2xx：优先解析结构化错误体 {kind, message}
    match resp.body_mut().read_json::<ErrorBody>() {
        Ok(body) => Err(MorphlinkError::from_wire(body)),
        Err(_) => Err(MorphlinkError::unreachable(format!(
            "{} answered {} without an error body",
            url,
            status.as_u16()
        ))),
    }
}

fn map_transport_error(url: &str, err: ureq::Error) -> MorphlinkError {
    match err {
        ureq::Error::Timeout(which) => {
            MorphlinkError::timeout(format!("{} timed out ({:?})", url, which))
        }
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
            MorphlinkError::timeout(format!("{} timed out: {}", url, io))
        }
        ureq::Error::Json(e) => {
            MorphlinkError::internal(format!("{} returned malformed JSON: {}", url, e))
        }
        other => MorphlinkError::unreachable(format!("{} unreachable: {}", url, other)),
    }
}
