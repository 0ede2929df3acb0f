use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub code: String,
    pub target_url: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Append-only click record. `code` is a soft reference and may outlive the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: u64,
    pub code: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Click event before the store assigns it an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClickEvent {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}
