//! Redirect service
//!
//! Resolve a code, hand the target back, and record the click without
//! waiting for it. Recording failures never reach the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::capability::Capability;
use crate::capability::payloads::{RecordClickRequest, ResolveLinkRequest, ResolveLinkResponse};
use crate::dispatch::Dispatcher;
use crate::errors::{MorphlinkError, Result};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};

/// Lifecycle of a single redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    Received,
    Resolved,
    Responded,
    RecordingFired,
    NotFound,
}

impl RedirectState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RedirectState::RecordingFired | RedirectState::NotFound)
    }
}

#[derive(Clone)]
pub struct RedirectService {
    dispatcher: Dispatcher,
    metrics: Arc<dyn MetricsRecorder>,
}

impl RedirectService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            metrics: NoopMetrics::arc(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Resolve `code` and fire `record-click`; returns the redirect target
    pub async fn redirect(&self, code: &str, metadata: BTreeMap<String, String>) -> Result<String> {
        let mut state = RedirectState::Received;
        trace!("Redirect '{}': {:?}", code, state);

        let resolved: ResolveLinkResponse = match self
            .dispatcher
            .call(
                Capability::ResolveLink,
                &ResolveLinkRequest {
                    code: code.to_string(),
                },
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                if matches!(e, MorphlinkError::NotFound(_)) {
                    state = RedirectState::NotFound;
                    self.metrics.inc_redirect("404");
                    debug!("Redirect '{}': {:?}", code, state);
                } else {
                    self.metrics.inc_redirect("error");
                }
                return Err(e);
            }
        };
        state = RedirectState::Resolved;
        trace!("Redirect '{}': {:?} -> {}", code, state, resolved.target_url);

        state = RedirectState::Responded;
        self.metrics.inc_redirect("302");
        trace!("Redirect '{}': {:?}", code, state);

        self.dispatcher.fire(
            Capability::RecordClick,
            &RecordClickRequest {
                code: code.to_string(),
                timestamp: Utc::now(),
                metadata,
            },
        );
        state = RedirectState::RecordingFired;
        trace!(
            "Redirect '{}': {:?} (terminal: {})",
            code,
            state,
            state.is_terminal()
        );

        Ok(resolved.target_url)
    }
}
