//! Node assembly
//!
//! Builds the immutable topology, registers the services this process hosts,
//! and wires them into a dispatcher.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::capability::CapabilityRegistry;
use crate::config::StaticConfig;
use crate::dispatch::{Dispatcher, Topology};
use crate::metrics_core::{MetricsRecorder, RequestRateTracker};
use crate::services::{AnalyticsService, AuthService, LinkService};
use crate::storage::{ClickStore, LinkStore, MemoryClickStore, MemoryLinkStore};

/// Everything a running process shares between handlers
#[derive(Clone)]
pub struct Node {
    pub dispatcher: Dispatcher,
    pub rates: Arc<RequestRateTracker>,
    pub metrics: Arc<dyn MetricsRecorder>,
}

/// Prometheus-backed recorder when the `metrics` feature is on, no-op otherwise
pub fn default_metrics() -> Arc<dyn MetricsRecorder> {
    #[cfg(feature = "metrics")]
    {
        crate::metrics::PrometheusMetricsWrapper::arc()
    }
    #[cfg(not(feature = "metrics"))]
    {
        crate::metrics_core::NoopMetrics::arc()
    }
}

/// Assemble a node with in-memory stores
pub fn prepare_node(config: &StaticConfig) -> Result<Node> {
    prepare_node_with(
        config,
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
        default_metrics(),
    )
}

/// Assemble a node around the given stores
///
/// Only services owning at least one embedded capability are constructed;
/// stores of services hosted elsewhere stay untouched.
pub fn prepare_node_with(
    config: &StaticConfig,
    link_store: Arc<dyn LinkStore>,
    click_store: Arc<dyn ClickStore>,
    metrics: Arc<dyn MetricsRecorder>,
) -> Result<Node> {
    let start_time = std::time::Instant::now();

    let topology = Topology::from_config(&config.topology).context("Invalid topology")?;
    if topology.peer_token().is_none() && topology.has_remote_routes() {
        warn!("No peer_token configured: /capabilities accepts calls from any client");
    }
    let embedded = topology.embedded_capabilities();
    let owners: BTreeSet<&'static str> = embedded.iter().map(|c| c.owner()).collect();
    debug!("Embedded capabilities: {:?}", embedded);

    let mut builder = CapabilityRegistry::builder();

    if owners.contains("auth") {
        let auth = Arc::new(
            AuthService::from_config(&config.auth)
                .context("Failed to create auth service")?
                .with_metrics(metrics.clone()),
        );
        auth.register(&mut builder);
    }

    if owners.contains("links") {
        let links = Arc::new(
            LinkService::new(link_store, &config.links).with_metrics(metrics.clone()),
        );
        links.register(&mut builder);
    }

    if owners.contains("analytics") {
        let analytics =
            Arc::new(AnalyticsService::new(click_store).with_metrics(metrics.clone()));
        analytics.register(&mut builder);
    }

    let registry = builder.build();
    let dispatcher = Dispatcher::with_metrics(topology, registry, metrics.clone())
        .context("Failed to create dispatcher")?;

    info!(
        "Node ready in {:?}: hosting {} of the capabilities locally ({})",
        start_time.elapsed(),
        embedded.len(),
        owners.into_iter().collect::<Vec<_>>().join(", ")
    );

    Ok(Node {
        dispatcher,
        rates: Arc::new(RequestRateTracker::new()),
        metrics,
    })
}
