//! Link management service
//!
//! Owns the link lifecycle. Every owner-scoped capability first resolves the
//! caller through `authorize`; the owner is never read from the payload.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::auth_service::authorize_via;
use crate::capability::payloads::{
    CreateLinkRequest, CredentialRequest, DeleteLinkResponse, LinkCodeRequest, ResolveLinkRequest,
    ResolveLinkResponse, UpdateLinkRequest,
};
use crate::capability::{Capability, CapabilityRegistryBuilder, service_handler};
use crate::config::LinksConfig;
use crate::dispatch::Dispatcher;
use crate::errors::{MorphlinkError, Result};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};
use crate::storage::{Link, LinkStore};
use crate::utils::{generate_random_code, is_valid_custom_code, validate_url};

/// Source of candidate short codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, length: usize) -> String;
}

/// Uniform random codes over `[A-Za-z0-9]`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: usize) -> String {
        generate_random_code(length)
    }
}

pub struct LinkService {
    store: Arc<dyn LinkStore>,
    generator: Arc<dyn CodeGenerator>,
    code_length: usize,
    max_generation_attempts: u32,
    metrics: Arc<dyn MetricsRecorder>,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, config: &LinksConfig) -> Self {
        Self {
            store,
            generator: Arc::new(RandomCodeGenerator),
            code_length: config.code_length.max(1),
            max_generation_attempts: config.max_generation_attempts.max(1),
            metrics: NoopMetrics::arc(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    // ============ Operations ============

    /// Create a link owned by `owner_id`.
    ///
    /// A user-chosen code that is taken, or was used by a deleted link, is a
    /// `Conflict`. Generated
    /// codes are retried on collision up to `max_generation_attempts` times.
    pub async fn create_link(
        &self,
        owner_id: &str,
        target_url: &str,
        code: Option<&str>,
    ) -> Result<Link> {
        let target_url = validate_url(target_url)?;

        let link = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(custom) => {
                if !is_valid_custom_code(custom) {
                    return Err(MorphlinkError::invalid_request(format!(
                        "invalid short code '{}': use 1-64 characters from [A-Za-z0-9_-]",
                        custom
                    )));
                }
                let link = new_link(custom, &target_url, owner_id);
                if !self.store.insert_new(link.clone()).await? {
                    return Err(MorphlinkError::conflict(format!(
                        "short code '{}' already exists or was retired",
                        custom
                    )));
                }
                link
            }
            None => self.insert_generated(owner_id, &target_url).await?,
        };

        info!(
            "LinkService: created link '{}' -> '{}' for '{}'",
            link.code, link.target_url, link.owner_id
        );
        Ok(link)
    }

    async fn insert_generated(&self, owner_id: &str, target_url: &str) -> Result<Link> {
        for attempt in 1..=self.max_generation_attempts {
            let code = self.generator.generate(self.code_length);
            let link = new_link(&code, target_url, owner_id);
            if self.store.insert_new(link.clone()).await? {
                return Ok(link);
            }
            self.metrics.inc_code_collision();
            debug!(
                "LinkService: generated code '{}' collided (attempt {}/{})",
                code, attempt, self.max_generation_attempts
            );
        }

        warn!(
            "LinkService: no free code after {} attempts",
            self.max_generation_attempts
        );
        Err(MorphlinkError::code_generation_exhausted(format!(
            "could not generate a unique code after {} attempts",
            self.max_generation_attempts
        )))
    }

    pub async fn resolve(&self, code: &str) -> Result<String> {
        self.store
            .get(code)
            .await?
            .map(|link| link.target_url)
            .ok_or_else(|| MorphlinkError::not_found(format!("short code '{}' not found", code)))
    }

    pub async fn get_link(&self, owner_id: &str, code: &str) -> Result<Link> {
        self.owned_link(owner_id, code).await
    }

    /// Change the target of an owned link. Code and owner never change.
    pub async fn update_link(&self, owner_id: &str, code: &str, target_url: &str) -> Result<Link> {
        let target_url = validate_url(target_url)?;
        let mut link = self.owned_link(owner_id, code).await?;

        link.target_url = target_url;
        link.updated_at = Some(Utc::now());

        if !self.store.update(link.clone()).await? {
            // removed between the ownership check and the write
            return Err(MorphlinkError::not_found(format!(
                "short code '{}' not found",
                code
            )));
        }

        info!(
            "LinkService: updated link '{}' -> '{}'",
            link.code, link.target_url
        );
        Ok(link)
    }

    pub async fn list_links(&self, owner_id: &str) -> Result<Vec<Link>> {
        self.store.list_by_owner(owner_id).await
    }

    pub async fn delete_link(&self, owner_id: &str, code: &str) -> Result<()> {
        self.owned_link(owner_id, code).await?;
        if !self.store.remove(code).await? {
            return Err(MorphlinkError::not_found(format!(
                "short code '{}' not found",
                code
            )));
        }

        info!("LinkService: deleted link '{}'", code);
        Ok(())
    }

    /// NotFound if the code is unknown, Forbidden if someone else owns it
    async fn owned_link(&self, owner_id: &str, code: &str) -> Result<Link> {
        let link = self
            .store
            .get(code)
            .await?
            .ok_or_else(|| MorphlinkError::not_found(format!("short code '{}' not found", code)))?;

        if link.owner_id != owner_id {
            return Err(MorphlinkError::forbidden(format!(
                "short code '{}' belongs to another owner",
                code
            )));
        }
        Ok(link)
    }

    // ============ Capability handlers ============

    async fn resolve_capability(
        self: Arc<Self>,
        _ctx: Dispatcher,
        req: ResolveLinkRequest,
    ) -> Result<ResolveLinkResponse> {
        let target_url = self.resolve(&req.code).await?;
        Ok(ResolveLinkResponse { target_url })
    }

    async fn create_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: CreateLinkRequest,
    ) -> Result<Link> {
        let identity = authorize_via(&ctx, &req.credential).await?;
        self.create_link(&identity.user_id, &req.target_url, req.code.as_deref())
            .await
    }

    async fn get_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: LinkCodeRequest,
    ) -> Result<Link> {
        let identity = authorize_via(&ctx, &req.credential).await?;
        self.get_link(&identity.user_id, &req.code).await
    }

    async fn update_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: UpdateLinkRequest,
    ) -> Result<Link> {
        let identity = authorize_via(&ctx, &req.credential).await?;
        self.update_link(&identity.user_id, &req.code, &req.target_url)
            .await
    }

    async fn list_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: CredentialRequest,
    ) -> Result<Vec<Link>> {
        let identity = authorize_via(&ctx, &req.credential).await?;
        self.list_links(&identity.user_id).await
    }

    async fn delete_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: LinkCodeRequest,
    ) -> Result<DeleteLinkResponse> {
        let identity = authorize_via(&ctx, &req.credential).await?;
        self.delete_link(&identity.user_id, &req.code).await?;
        Ok(DeleteLinkResponse {
            code: req.code,
            deleted: true,
        })
    }

    pub fn register(self: &Arc<Self>, builder: &mut CapabilityRegistryBuilder) {
        builder
            .register(
                Capability::ResolveLink,
                service_handler(self.clone(), Self::resolve_capability),
            )
            .register(
                Capability::CreateLink,
                service_handler(self.clone(), Self::create_capability),
            )
            .register(
                Capability::GetLink,
                service_handler(self.clone(), Self::get_capability),
            )
            .register(
                Capability::UpdateLink,
                service_handler(self.clone(), Self::update_capability),
            )
            .register(
                Capability::ListLinks,
                service_handler(self.clone(), Self::list_capability),
            )
            .register(
                Capability::DeleteLink,
                service_handler(self.clone(), Self::delete_capability),
            );
    }
}

fn new_link(code: &str, target_url: &str, owner_id: &str) -> Link {
    Link {
        code: code.to_string(),
        target_url: target_url.to_string(),
        owner_id: owner_id.to_string(),
        created_at: Utc::now(),
        updated_at: None,
    }
}
