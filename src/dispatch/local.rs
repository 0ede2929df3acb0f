//! In-process capability execution

use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use super::Dispatcher;
use crate::capability::{Capability, CapabilityRegistry};
use crate::errors::{MorphlinkError, Result};

#[derive(Clone, Debug)]
pub struct LocalInvoker {
    registry: CapabilityRegistry,
}

impl LocalInvoker {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Run the handler inline. The timeout only applies when the caller asked for one.
    pub async fn invoke(
        &self,
        ctx: Dispatcher,
        capability: Capability,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let handler = self.registry.get(capability).ok_or_else(|| {
            MorphlinkError::unknown_capability(format!(
                "capability '{}' is not registered in this process",
                capability
            ))
        })?;

        trace!("LocalInvoker: inline call to '{}'", capability);
        let call = handler.handle(ctx, payload);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                MorphlinkError::timeout(format!(
                    "capability '{}' did not finish within {:?}",
                    capability, limit
                ))
            })?,
            None => call.await,
        }
    }

    /// Run the handler as a separate task.
    ///
    /// The returned future resolves once the task ends; a panic inside the
    /// handler surfaces as `Internal` instead of unwinding into the caller.
    pub async fn spawn(
        &self,
        ctx: Dispatcher,
        capability: Capability,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let invoker = self.clone();
        let task = tokio::spawn(async move { invoker.invoke(ctx, capability, payload, timeout).await });

        match task.await {
            Ok(result) => result,
            Err(join_err) => Err(MorphlinkError::internal(format!(
                "deferred '{}' task failed: {}",
                capability, join_err
            ))),
        }
    }
}
