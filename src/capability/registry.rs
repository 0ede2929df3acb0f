use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::Capability;
use crate::dispatch::Dispatcher;
use crate::errors::{MorphlinkError, Result};

/// An invokable capability implementation.
///
/// Handlers receive the process dispatcher so they can call other
/// capabilities (e.g. `authorize`) without knowing where those live.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, ctx: Dispatcher, payload: Value) -> Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(Dispatcher, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, ctx: Dispatcher, payload: Value) -> Result<Value> {
        (self.0)(ctx, payload).await
    }
}

/// Wrap a raw `Value -> Value` closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    F: Fn(Dispatcher, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Wrap a typed closure as a handler.
///
/// Payload decoding and response encoding failures are reported as
/// `Internal`: the payload shapes are fixed, so a mismatch is a bug on one
/// side of the call rather than bad user input.
pub fn typed_handler<Req, Resp, F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(Dispatcher, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    handler_fn(move |ctx, payload| {
        let call = serde_json::from_value::<Req>(payload).map(|req| f(ctx, req));
        async move {
            let call = call.map_err(|e| {
                MorphlinkError::internal(format!("payload decoding failed: {}", e))
            })?;
            let resp = call.await?;
            serde_json::to_value(resp)
                .map_err(|e| MorphlinkError::internal(format!("response encoding failed: {}", e)))
        }
    })
}

/// Bind a service method of the form
/// `async fn(self: Arc<Self>, ctx: Dispatcher, req: Req) -> Result<Resp>`
pub fn service_handler<S, Req, Resp, F, Fut>(service: Arc<S>, f: F) -> Arc<dyn CapabilityHandler>
where
    S: Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(Arc<S>, Dispatcher, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    typed_handler(move |ctx, req| f(service.clone(), ctx, req))
}

/// Capability name → handler. Built once at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    handlers: Arc<HashMap<Capability, Arc<dyn CapabilityHandler>>>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.get(&capability).cloned()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.handlers.contains_key(&capability)
    }

    /// Registered capabilities in declaration order
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self.handlers.keys().copied().collect();
        caps.sort();
        caps
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    handlers: HashMap<Capability, Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistryBuilder {
    /// Register a handler. A second registration for the same capability replaces the first.
    pub fn register(&mut self, capability: Capability, handler: Arc<dyn CapabilityHandler>) -> &mut Self {
        if self.handlers.insert(capability, handler).is_some() {
            warn!("Capability '{}' registered twice, keeping the latest handler", capability);
        } else {
            debug!("Registered capability handler: {}", capability);
        }
        self
    }

    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_registers_and_replaces() {
        let mut builder = CapabilityRegistry::builder();
        builder
            .register(
                Capability::Authorize,
                handler_fn(|_, _| async { Ok(json!("first")) }),
            )
            .register(
                Capability::ResolveLink,
                handler_fn(|_, v| async move { Ok(v) }),
            )
            .register(
                Capability::Authorize,
                handler_fn(|_, _| async { Ok(json!("second")) }),
            );
        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(Capability::Authorize));
        assert!(!registry.contains(Capability::GetStats));
        assert_eq!(
            registry.capabilities(),
            vec![Capability::ResolveLink, Capability::Authorize]
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = CapabilityRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.get(Capability::RecordClick).is_none());
    }
}
