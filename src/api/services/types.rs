//! Public API 类型定义

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON 响应信封 `{ code, message, data }`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// `POST /links` body. Any `owner_id` field sent by a client is ignored.
#[derive(Deserialize, Clone, Debug)]
pub struct PostNewLink {
    pub target_url: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// `PUT /links/{code}` body
#[derive(Deserialize, Clone, Debug)]
pub struct PutLinkTarget {
    pub target_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: u64,
    /// capability → "embedded" | "remote"
    pub topology: BTreeMap<String, String>,
    pub response_time_ms: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RpmResponse {
    pub window_secs: u64,
    pub modules: BTreeMap<String, usize>,
}
