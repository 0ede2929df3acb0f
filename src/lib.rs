//! Morphlink - a link shortener with a switchable service topology
//!
//! Link management, redirects, analytics and authorization are published
//! as named capabilities. A per-process topology decides which of them run
//! in-process and which are reached over HTTP; callers never know the
//! difference.
//!
//! # Features
//! - **metrics**: Prometheus metrics export
//!
//! # Architecture
//! - `capability`: capability names, payloads and the handler registry
//! - `dispatch`: topology, local/remote invokers and the dispatcher
//! - `services`: link, analytics, authorization and redirect logic
//! - `storage`: link and click stores
//! - `api`: HTTP services and middleware
//! - `config`: configuration management
//! - `runtime`: node assembly and server lifecycle
//! - `system`: logging

pub mod api;
pub mod capability;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod metrics_core;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
