//! Analytics service
//!
//! Owns click events. Link ownership is always asked of the link service
//! through a capability call, never read from link storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::capability::payloads::{
    CredentialRequest, LinkCodeRequest, LinkStats, RecordClickRequest, StatsResponse,
};
use crate::capability::{Capability, CapabilityRegistryBuilder, service_handler};
use crate::dispatch::Dispatcher;
use crate::errors::{MorphlinkError, Result};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};
use crate::storage::{ClickEvent, ClickStore, Link, NewClickEvent};

/// Metadata key holding the traffic source
pub const SOURCE_KEY: &str = "source";

/// Bucket for clicks recorded without a source
pub const UNKNOWN_SOURCE: &str = "unknown";

pub struct AnalyticsService {
    store: Arc<dyn ClickStore>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn ClickStore>) -> Self {
        Self {
            store,
            metrics: NoopMetrics::arc(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Append one click. No deduplication.
    pub async fn record_click(
        &self,
        code: &str,
        timestamp: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) -> Result<ClickEvent> {
        if code.is_empty() {
            return Err(MorphlinkError::invalid_request("click without a code"));
        }

        let event = self
            .store
            .append(NewClickEvent {
                code: code.to_string(),
                timestamp,
                metadata,
            })
            .await?;
        self.metrics.inc_click_recorded();
        trace!("AnalyticsService: recorded click #{} on '{}'", event.id, code);
        Ok(event)
    }

    /// Click count per code for every link the caller owns, zero included
    pub async fn get_stats(&self, ctx: &Dispatcher, credential: &str) -> Result<StatsResponse> {
        let links: Vec<Link> = ctx
            .call(
                Capability::ListLinks,
                &CredentialRequest {
                    credential: credential.to_string(),
                },
            )
            .await?;

        let mut stats = StatsResponse::new();
        for link in links {
            let clicks = self.store.count_for(&link.code).await?;
            stats.insert(link.code, clicks);
        }

        debug!("AnalyticsService: stats for {} links", stats.len());
        Ok(stats)
    }

    /// Detailed counts for one owned link
    pub async fn get_link_stats(
        &self,
        ctx: &Dispatcher,
        credential: &str,
        code: &str,
    ) -> Result<LinkStats> {
        // NotFound / Forbidden come straight from the link service
        let link: Link = ctx
            .call(
                Capability::GetLink,
                &LinkCodeRequest {
                    credential: credential.to_string(),
                    code: code.to_string(),
                },
            )
            .await?;

        let events = self.store.events_for(&link.code).await?;
        Ok(summarize(link.code, &events))
    }

    // ============ Capability handlers ============

    async fn record_click_capability(
        self: Arc<Self>,
        _ctx: Dispatcher,
        req: RecordClickRequest,
    ) -> Result<ClickEvent> {
        self.record_click(&req.code, req.timestamp, req.metadata)
            .await
    }

    async fn get_stats_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: CredentialRequest,
    ) -> Result<StatsResponse> {
        self.get_stats(&ctx, &req.credential).await
    }

    async fn get_link_stats_capability(
        self: Arc<Self>,
        ctx: Dispatcher,
        req: LinkCodeRequest,
    ) -> Result<LinkStats> {
        self.get_link_stats(&ctx, &req.credential, &req.code).await
    }

    pub fn register(self: &Arc<Self>, builder: &mut CapabilityRegistryBuilder) {
        builder
            .register(
                Capability::RecordClick,
                service_handler(self.clone(), Self::record_click_capability),
            )
            .register(
                Capability::GetStats,
                service_handler(self.clone(), Self::get_stats_capability),
            )
            .register(
                Capability::GetLinkStats,
                service_handler(self.clone(), Self::get_link_stats_capability),
            );
    }
}

fn summarize(code: String, events: &[ClickEvent]) -> LinkStats {
    let mut sources: BTreeMap<String, u64> = BTreeMap::new();
    for event in events {
        let source = event
            .metadata
            .get(SOURCE_KEY)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SOURCE);
        *sources.entry(source.to_string()).or_insert(0) += 1;
    }

    LinkStats {
        code,
        clicks: events.len() as u64,
        last_click_at: events.iter().map(|e| e.timestamp).max(),
        sources,
    }
}
