//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{App, HttpServer, web};

use morphlink::api::{self, AppState};
use morphlink::capability::Capability;
use morphlink::capability::payloads::CreateLinkRequest;
use morphlink::config::{CredentialEntry, StaticConfig};
use morphlink::dispatch::TopologyConfig;
use morphlink::metrics_core::NoopMetrics;
use morphlink::runtime::{Node, prepare_node_with};
use morphlink::storage::{ClickStore, Link, LinkStore, MemoryClickStore, MemoryLinkStore};

pub const ALICE: &str = "t-alice";
pub const BOB: &str = "t-bob";

// =============================================================================
// Config & nodes
// =============================================================================

pub fn test_config(topology: TopologyConfig) -> StaticConfig {
    let mut config = StaticConfig::default();
    config.auth.credentials = vec![
        CredentialEntry {
            token: ALICE.to_string(),
            user_id: "alice".to_string(),
            display_name: "Alice".to_string(),
        },
        CredentialEntry {
            token: BOB.to_string(),
            user_id: "bob".to_string(),
            display_name: "Bob".to_string(),
        },
    ];
    config.topology = topology;
    config
}

pub fn node_with(
    topology: TopologyConfig,
    link_store: Arc<dyn LinkStore>,
    click_store: Arc<dyn ClickStore>,
) -> Node {
    prepare_node_with(
        &test_config(topology),
        link_store,
        click_store,
        NoopMetrics::arc(),
    )
    .expect("node should assemble")
}

pub fn embedded_node() -> Node {
    node_with(
        TopologyConfig::embedded(),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    )
}

pub fn app_state(node: &Node) -> AppState {
    AppState::new(
        node.dispatcher.clone(),
        node.rates.clone(),
        node.metrics.clone(),
    )
}

// =============================================================================
// Networked nodes
// =============================================================================

/// Bind an ephemeral port up front so peers can be configured before they serve
pub fn reserve_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{}", addr))
}

/// Serve `node` on an ephemeral port and return its base URL
pub fn serve(node: &Node) -> String {
    let (listener, endpoint) = reserve_listener();
    serve_on(node, listener);
    endpoint
}

pub fn serve_on(node: &Node, listener: TcpListener) {
    let state = app_state(node);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .expect("listen on reserved port");

    actix_rt::spawn(server.run());
}

/// Serve arbitrary routes, e.g. a misbehaving capability peer
pub fn serve_routes<F>(routes: F) -> String
where
    F: Fn(&mut web::ServiceConfig) + Clone + Send + 'static,
{
    let server = HttpServer::new(move || App::new().configure(routes.clone()))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind ephemeral port");

    let addr = server.addrs()[0];
    actix_rt::spawn(server.run());
    format!("http://{}", addr)
}

// =============================================================================
// Helpers
// =============================================================================

pub async fn create_link(node: &Node, credential: &str, target_url: &str) -> Link {
    node.dispatcher
        .call(
            Capability::CreateLink,
            &CreateLinkRequest {
                credential: credential.to_string(),
                target_url: target_url.to_string(),
                code: None,
            },
        )
        .await
        .expect("create-link should succeed")
}

/// Poll `check` until it returns true or `within` elapses
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
