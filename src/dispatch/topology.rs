//! Process topology: where each capability runs.
//!
//! `TopologyConfig` is the serde form read from `[topology]`; `Topology` is
//! the validated, immutable table the dispatcher consults on every call.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use subtle::ConstantTimeEq;
use url::Url;

use crate::capability::Capability;
use crate::errors::{MorphlinkError, Result};

/// 默认远程调用超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// 同时在途的 fire-and-forget 调用上限
pub const DEFAULT_MAX_DETACHED_CALLS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Handler runs in this process
    #[default]
    Embedded,
    /// Handler runs behind `POST {endpoint}/capabilities/{name}`
    Remote,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Embedded => "embedded",
            DispatchMode::Remote => "remote",
        }
    }
}

/// One route as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub mode: DispatchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self::embedded()
    }
}

impl RouteConfig {
    pub fn embedded() -> Self {
        Self {
            mode: DispatchMode::Embedded,
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self {
            mode: DispatchMode::Remote,
            endpoint: Some(endpoint.into()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// `[topology]` section: a default route plus per-capability overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub default: RouteConfig,
    #[serde(default)]
    pub capabilities: BTreeMap<Capability, RouteConfig>,
    /// Fire-and-forget calls beyond this many in flight are dropped
    #[serde(default = "default_max_detached_calls")]
    pub max_detached_calls: usize,
    /// Shared secret peers present on `/capabilities`. Unset leaves the scope open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_token: Option<String>,
}

fn default_max_detached_calls() -> usize {
    DEFAULT_MAX_DETACHED_CALLS
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            default: RouteConfig::embedded(),
            capabilities: BTreeMap::new(),
            max_detached_calls: DEFAULT_MAX_DETACHED_CALLS,
            peer_token: None,
        }
    }
}

impl TopologyConfig {
    /// Everything in-process
    pub fn embedded() -> Self {
        Self::default()
    }

    /// Everything forwarded to one endpoint
    pub fn all_remote(endpoint: impl Into<String>) -> Self {
        Self {
            default: RouteConfig::remote(endpoint),
            ..Self::default()
        }
    }

    pub fn with_route(mut self, capability: Capability, route: RouteConfig) -> Self {
        self.capabilities.insert(capability, route);
        self
    }

    pub fn with_max_detached_calls(mut self, limit: usize) -> Self {
        self.max_detached_calls = limit;
        self
    }

    pub fn with_peer_token(mut self, token: impl Into<String>) -> Self {
        self.peer_token = Some(token.into());
        self
    }
}

/// Resolved route for a single capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Embedded,
    Remote { endpoint: String, timeout: Duration },
}

impl Route {
    pub fn mode(&self) -> DispatchMode {
        match self {
            Route::Embedded => DispatchMode::Embedded,
            Route::Remote { .. } => DispatchMode::Remote,
        }
    }
}

/// Validated, immutable routing table
#[derive(Debug, Clone)]
pub struct Topology {
    routes: HashMap<Capability, Route>,
    max_detached_calls: usize,
    peer_token: Option<String>,
}

impl Topology {
    /// Resolve every capability against the configuration.
    ///
    /// Remote routes must carry an absolute http(s) endpoint.
    pub fn from_config(config: &TopologyConfig) -> Result<Self> {
        let mut routes = HashMap::new();
        for capability in Capability::iter() {
            let route_config = config
                .capabilities
                .get(&capability)
                .unwrap_or(&config.default);
            routes.insert(capability, resolve_route(capability, route_config)?);
        }
        if config.max_detached_calls == 0 {
            return Err(MorphlinkError::invalid_request(
                "max_detached_calls must be at least 1",
            ));
        }
        let peer_token = config
            .peer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            routes,
            max_detached_calls: config.max_detached_calls,
            peer_token,
        })
    }

    pub fn route(&self, capability: Capability) -> &Route {
        static EMBEDDED: Route = Route::Embedded;
        // from_config fills every capability
        self.routes.get(&capability).unwrap_or(&EMBEDDED)
    }

    pub fn mode(&self, capability: Capability) -> DispatchMode {
        self.route(capability).mode()
    }

    /// Capabilities this process serves itself, in declaration order
    pub fn embedded_capabilities(&self) -> Vec<Capability> {
        Capability::iter()
            .filter(|c| self.mode(*c) == DispatchMode::Embedded)
            .collect()
    }

    pub fn hosts(&self, capability: Capability) -> bool {
        self.mode(capability) == DispatchMode::Embedded
    }

    pub fn max_detached_calls(&self) -> usize {
        self.max_detached_calls
    }

    pub fn peer_token(&self) -> Option<&str> {
        self.peer_token.as_deref()
    }

    /// Whether a caller of `/capabilities` may proceed
    pub fn admits_peer(&self, presented: Option<&str>) -> bool {
        match (&self.peer_token, presented) {
            (None, _) => true,
            (Some(expected), Some(given)) => expected.as_bytes().ct_eq(given.as_bytes()).into(),
            (Some(_), None) => false,
        }
    }

    pub fn has_remote_routes(&self) -> bool {
        self.routes.values().any(|r| r.mode() == DispatchMode::Remote)
    }
}

fn resolve_route(capability: Capability, route: &RouteConfig) -> Result<Route> {
    match route.mode {
        DispatchMode::Embedded => Ok(Route::Embedded),
        DispatchMode::Remote => {
            let endpoint = route
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    MorphlinkError::invalid_request(format!(
                        "capability '{}' is routed remote but has no endpoint",
                        capability
                    ))
                })?;

            let parsed = Url::parse(endpoint).map_err(|e| {
                MorphlinkError::invalid_request(format!(
                    "capability '{}' has an invalid endpoint '{}': {}",
                    capability, endpoint, e
                ))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(MorphlinkError::invalid_request(format!(
                    "capability '{}' endpoint must be http or https, got '{}'",
                    capability,
                    parsed.scheme()
                )));
            }
            if route.timeout_ms == 0 {
                return Err(MorphlinkError::invalid_request(format!(
                    "capability '{}' has a zero timeout",
                    capability
                )));
            }

            Ok(Route::Remote {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                timeout: Duration::from_millis(route.timeout_ms),
            })
        }
    }
}
