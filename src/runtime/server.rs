//! Server mode
//!
//! This module contains the HTTP server startup logic.

use std::time::Duration;

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::{self, AppState};
use crate::api::middleware::{RequestIdMiddleware, TimingMiddleware};
use crate::config::get_config;
use crate::runtime::{shutdown, startup};

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let config = get_config();
    let node = startup::prepare_node(&config).map_err(|e| {
        tracing::error!("Server startup failed: {:#}", e);
        e
    })?;

    let state = AppState::new(node.dispatcher.clone(), node.rates.clone(), node.metrics.clone());
    let metrics = node.metrics.clone();
    let rates = node.rates.clone();

    let workers = config.server.workers.clamp(1, 32);
    warn!("Using {} workers for the server", workers);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TimingMiddleware::new(metrics.clone(), rates.clone())) // 记录请求延迟与模块速率
            .wrap(RequestIdMiddleware) // 为每个请求分配 request_id
            .wrap(Compress::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .configure(api::configure)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .disable_signals()
    .workers(workers);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    let handle = server.handle();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = shutdown::listen_for_shutdown(handle) => {
            warn!("Graceful shutdown complete");
        }
    }

    Ok(())
}
