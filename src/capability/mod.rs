//! Capabilities
//!
//! A capability is a named unit of business logic that can be invoked either
//! in-process or over the network. The set is fixed at compile time; which
//! process hosts each one is decided by the topology.

pub mod payloads;
pub mod registry;

pub use registry::{
    CapabilityHandler, CapabilityRegistry, CapabilityRegistryBuilder, handler_fn, service_handler,
    typed_handler,
};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Well-known capability names
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    ResolveLink,
    CreateLink,
    GetLink,
    UpdateLink,
    ListLinks,
    DeleteLink,
    RecordClick,
    GetStats,
    GetLinkStats,
    Authorize,
}

impl Capability {
    /// Service that owns the capability (used for request-rate grouping and logs)
    pub fn owner(&self) -> &'static str {
        match self {
            Capability::ResolveLink
            | Capability::CreateLink
            | Capability::GetLink
            | Capability::UpdateLink
            | Capability::ListLinks
            | Capability::DeleteLink => "links",
            Capability::RecordClick | Capability::GetStats | Capability::GetLinkStats => {
                "analytics"
            }
            Capability::Authorize => "auth",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_are_kebab_case() {
        assert_eq!(Capability::RecordClick.as_ref(), "record-click");
        assert_eq!(Capability::ResolveLink.to_string(), "resolve-link");
        assert_eq!(
            Capability::from_str("get-link-stats").unwrap(),
            Capability::GetLinkStats
        );
        assert!(Capability::from_str("drop-tables").is_err());
    }

    #[test]
    fn test_serde_name_matches_strum_name() {
        for cap in Capability::iter() {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{}\"", cap.as_ref()));
        }
    }

    #[test]
    fn test_every_capability_has_an_owner() {
        assert_eq!(Capability::iter().count(), 10);
        assert_eq!(Capability::Authorize.owner(), "auth");
        assert_eq!(Capability::GetStats.owner(), "analytics");
        assert_eq!(Capability::DeleteLink.owner(), "links");
    }
}
