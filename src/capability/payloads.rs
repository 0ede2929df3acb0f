//! Capability request and response bodies
//!
//! These are the JSON shapes that travel through the dispatcher, whether the
//! call stays in-process or crosses the network.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved caller identity. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveLinkRequest {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveLinkResponse {
    pub target_url: String,
}

/// `owner_id` is deliberately absent: the owner comes from the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    pub credential: String,
    pub target_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Owner-scoped lookup or deletion of a single link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCodeRequest {
    pub credential: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLinkRequest {
    pub credential: String,
    pub code: String,
    pub target_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub credential: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLinkResponse {
    pub code: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordClickRequest {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Per-link click aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub code: String,
    pub clicks: u64,
    #[serde(default)]
    pub last_click_at: Option<DateTime<Utc>>,
    /// Click count per `source` metadata value
    #[serde(default)]
    pub sources: BTreeMap<String, u64>,
}

/// `code -> click count` for every link the caller owns
pub type StatsResponse = BTreeMap<String, u64>;
