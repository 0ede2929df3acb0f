//! Capability dispatch
//!
//! Callers name a capability and hand over a payload; the dispatcher looks up
//! the route in the process topology and runs the call through the local or
//! the remote invoker. Both paths go through `serde_json::Value`, so the
//! serialization a caller sees is the same in every topology.

mod local;
mod remote;
mod topology;

pub use local::LocalInvoker;
pub use remote::{CAPABILITY_PATH, PEER_TOKEN_HEADER, RemoteInvoker, capability_url};
pub use topology::{
    DEFAULT_MAX_DETACHED_CALLS, DEFAULT_TIMEOUT_MS, DispatchMode, Route, RouteConfig, Topology, TopologyConfig,
};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use crate::capability::{Capability, CapabilityRegistry};
use crate::errors::{MorphlinkError, Result};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};

/// Errors surfaced by the dispatcher share the crate-wide taxonomy
pub type DispatchError = MorphlinkError;

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Overrides the route timeout (remote) or bounds an inline call (embedded)
    pub timeout: Option<Duration>,
    /// Return `Ok(Value::Null)` immediately; failures are only logged
    pub fire_and_forget: bool,
}

impl InvokeOptions {
    pub fn fire_and_forget() -> Self {
        Self {
            timeout: None,
            fire_and_forget: true,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            fire_and_forget: false,
        }
    }
}

struct DispatcherInner {
    topology: Topology,
    local: LocalInvoker,
    remote: RemoteInvoker,
    metrics: Arc<dyn MetricsRecorder>,
    /// Permits for in-flight fire-and-forget calls
    detached: Arc<Semaphore>,
}

/// Process-wide capability dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("embedded", &self.inner.topology.embedded_capabilities())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(topology: Topology, registry: CapabilityRegistry) -> Result<Self> {
        Self::with_metrics(topology, registry, NoopMetrics::arc())
    }

    /// Build a dispatcher, failing if an embedded route has no registered handler
    pub fn with_metrics(
        topology: Topology,
        registry: CapabilityRegistry,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self> {
        let missing: Vec<String> = topology
            .embedded_capabilities()
            .into_iter()
            .filter(|c| !registry.contains(*c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MorphlinkError::invalid_request(format!(
                "embedded capabilities without a registered handler: {}",
                missing.join(", ")
            )));
        }

        let detached = Arc::new(Semaphore::new(topology.max_detached_calls()));
        let remote = RemoteInvoker::new().with_peer_token(topology.peer_token().map(str::to_string));
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                detached,
                topology,
                local: LocalInvoker::new(registry),
                remote,
                metrics,
            }),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.inner.topology
    }

    /// Whether this process serves `capability` itself
    pub fn hosts(&self, capability: Capability) -> bool {
        self.inner.topology.hosts(capability)
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsRecorder> {
        &self.inner.metrics
    }

    /// Invoke a capability wherever the topology says it lives
    pub async fn invoke(
        &self,
        capability: Capability,
        payload: Value,
        options: InvokeOptions,
    ) -> std::result::Result<Value, DispatchError> {
        if options.fire_and_forget {
            self.spawn_detached(capability, payload, options.timeout);
            return Ok(Value::Null);
        }

        let route = self.inner.topology.route(capability);
        let mode = route.mode().as_str();
        debug!("Dispatch '{}' via {}", capability, mode);

        let start = Instant::now();
        let result = match route {
            Route::Embedded => {
                self.inner
                    .local
                    .invoke(self.clone(), capability, payload, options.timeout)
                    .await
            }
            Route::Remote { endpoint, timeout } => {
                self.inner
                    .remote
                    .invoke(
                        endpoint,
                        capability,
                        payload,
                        options.timeout.unwrap_or(*timeout),
                    )
                    .await
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.error_type(),
        };
        self.inner.metrics.observe_capability_call(
            capability.as_ref(),
            mode,
            outcome,
            start.elapsed().as_secs_f64(),
        );
        trace!(
            "Dispatch '{}' finished in {:?}: {}",
            capability,
            start.elapsed(),
            outcome
        );

        result
    }

    /// Typed façade over `invoke`
    pub async fn call<Req, Resp>(&self, capability: Capability, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request).map_err(|e| {
            MorphlinkError::internal(format!("failed to encode '{}' request: {}", capability, e))
        })?;
        let value = self
            .invoke(capability, payload, InvokeOptions::default())
            .await?;
        serde_json::from_value(value).map_err(|e| {
            MorphlinkError::internal(format!("failed to decode '{}' response: {}", capability, e))
        })
    }

    /// Fire-and-forget with a typed request
    pub fn fire<Req>(&self, capability: Capability, request: &Req)
    where
        Req: Serialize + ?Sized,
    {
        match serde_json::to_value(request) {
            Ok(payload) => self.spawn_detached(capability, payload, None),
            Err(e) => {
                warn!("Dropping '{}' call, request encoding failed: {}", capability, e);
                self.inner
                    .metrics
                    .inc_fire_and_forget_failure(capability.as_ref(), "Internal Error");
            }
        }
    }

    /// Run a call in the background. Once `max_detached_calls` are in flight
    /// new calls are dropped, so a stalled peer holds a bounded number of
    /// tasks and blocking threads.
    fn spawn_detached(&self, capability: Capability, payload: Value, timeout: Option<Duration>) {
        let permit = match self.inner.detached.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Dropping detached '{}' call: {} already in flight",
                    capability,
                    self.inner.topology.max_detached_calls()
                );
                self.inner
                    .metrics
                    .inc_fire_and_forget_failure(capability.as_ref(), "Overloaded");
                return;
            }
        };

        let this = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let result = match this.inner.topology.route(capability) {
                Route::Embedded => {
                    this.inner
                        .local
                        .spawn(this.clone(), capability, payload, timeout)
                        .await
                }
                Route::Remote {
                    endpoint,
                    timeout: route_timeout,
                } => {
                    this.inner
                        .remote
                        .invoke(
                            endpoint,
                            capability,
                            payload,
                            timeout.unwrap_or(*route_timeout),
                        )
                        .await
                }
            };

            match result {
                Ok(_) => trace!("Detached '{}' call completed", capability),
                Err(e) => {
                    warn!("Detached '{}' call failed: {}", capability, e);
                    this.inner
                        .metrics
                        .inc_fire_and_forget_failure(capability.as_ref(), e.error_type());
                }
            }
        });
    }
}
