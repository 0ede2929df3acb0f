//! Redirect tests
//!
//! The redirect answers as soon as the link resolves. Click recording
//! happens afterwards and can neither slow down nor fail the response.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, HttpResponse, web};
use async_trait::async_trait;

use morphlink::api;
use morphlink::capability::Capability;
use morphlink::dispatch::{RouteConfig, TopologyConfig};
use morphlink::errors::{MorphlinkError, Result};
use morphlink::storage::{ClickEvent, ClickStore, MemoryClickStore, MemoryLinkStore, NewClickEvent};

use common::{
    ALICE, app_state, create_link, embedded_node, eventually, node_with, serve, serve_routes,
};

// =============================================================================
// Test Setup
// =============================================================================

/// Click store whose appends hang
struct StalledClickStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl ClickStore for StalledClickStore {
    async fn append(&self, _event: NewClickEvent) -> Result<ClickEvent> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(MorphlinkError::internal("stalled"))
    }

    async fn events_for(&self, _code: &str) -> Result<Vec<ClickEvent>> {
        Ok(Vec::new())
    }

    async fn count_for(&self, _code: &str) -> Result<u64> {
        Ok(0)
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Click store that always fails
struct FailingClickStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl ClickStore for FailingClickStore {
    async fn append(&self, _event: NewClickEvent) -> Result<ClickEvent> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MorphlinkError::internal("disk on fire"))
    }

    async fn events_for(&self, _code: &str) -> Result<Vec<ClickEvent>> {
        Err(MorphlinkError::internal("disk on fire"))
    }

    async fn count_for(&self, _code: &str) -> Result<u64> {
        Err(MorphlinkError::internal("disk on fire"))
    }

    async fn count(&self) -> Result<usize> {
        Err(MorphlinkError::internal("disk on fire"))
    }
}

macro_rules! redirect_app {
    ($node:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(&$node)))
                .configure(api::configure),
        )
        .await
    };
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[actix_rt::test]
async fn test_redirect_records_exactly_one_click() {
    let clicks = Arc::new(MemoryClickStore::new());
    let node = node_with(
        TopologyConfig::embedded(),
        Arc::new(MemoryLinkStore::new()),
        clicks.clone(),
    );
    let link = create_link(&node, ALICE, "https://example.com").await;
    let app = redirect_app!(node);

    let req = TestRequest::get()
        .uri(&format!("/r/{}?utm_source=newsletter", link.code))
        .insert_header(("User-Agent", "test-agent"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com");

    let code = link.code.clone();
    let recorded = eventually(Duration::from_secs(2), || {
        let clicks = clicks.clone();
        let code = code.clone();
        async move { clicks.count_for(&code).await.unwrap_or(0) >= 1 }
    })
    .await;
    assert!(recorded, "click was never recorded");

    // No duplicates show up later
    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = clicks.events_for(&link.code).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metadata.get("source").unwrap(), "newsletter");
    assert_eq!(events[0].metadata.get("user_agent").unwrap(), "test-agent");
}

#[actix_rt::test]
async fn test_unknown_code_is_not_found() {
    let node = embedded_node();
    let app = redirect_app!(node);

    let resp = test::call_service(&app, TestRequest::get().uri("/r/nope").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp =
        test::call_service(&app, TestRequest::get().uri("/r/bad%20code").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_stalled_recorder_does_not_delay_redirect() {
    let store = Arc::new(StalledClickStore {
        attempts: AtomicUsize::new(0),
    });
    let node = node_with(
        TopologyConfig::embedded(),
        Arc::new(MemoryLinkStore::new()),
        store.clone(),
    );
    let link = create_link(&node, ALICE, "https://example.com").await;
    let app = redirect_app!(node);

    let start = Instant::now();
    let resp = test::call_service(
        &app,
        TestRequest::get().uri(&format!("/r/{}", link.code)).to_request(),
    )
    .await;
    let elapsed = start.elapsed();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(elapsed < Duration::from_millis(100), "took {:?}", elapsed);

    let attempted = eventually(Duration::from_secs(1), || {
        let store = store.clone();
        async move { store.attempts.load(Ordering::SeqCst) == 1 }
    })
    .await;
    assert!(attempted);
}

#[actix_rt::test]
async fn test_failing_recorder_does_not_fail_redirect() {
    let store = Arc::new(FailingClickStore {
        attempts: AtomicUsize::new(0),
    });
    let node = node_with(
        TopologyConfig::embedded(),
        Arc::new(MemoryLinkStore::new()),
        store.clone(),
    );
    let link = create_link(&node, ALICE, "https://example.com").await;
    let app = redirect_app!(node);

    let start = Instant::now();
    let resp = test::call_service(
        &app,
        TestRequest::get().uri(&format!("/r/{}", link.code)).to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com");
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[actix_rt::test]
async fn test_stalled_remote_recorder_does_not_delay_redirect() {
    let endpoint = serve_routes(|cfg: &mut web::ServiceConfig| {
        cfg.route(
            "/capabilities/{name}",
            web::post().to(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                HttpResponse::Ok().finish()
            }),
        );
    });
    let node = node_with(
        TopologyConfig::embedded()
            .with_route(Capability::RecordClick, RouteConfig::remote(endpoint)),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    );
    let link = create_link(&node, ALICE, "https://example.com").await;
    let app = redirect_app!(node);

    let start = Instant::now();
    let resp = test::call_service(
        &app,
        TestRequest::get().uri(&format!("/r/{}", link.code)).to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[actix_rt::test]
async fn test_recording_backlog_does_not_starve_remote_resolve() {
    // links live on a healthy peer, analytics on one that never answers in time
    let links_peer = serve(&embedded_node());
    let analytics_peer = serve_routes(|cfg: &mut web::ServiceConfig| {
        cfg.route(
            "/capabilities/{name}",
            web::post().to(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                HttpResponse::Ok().finish()
            }),
        );
    });
    let node = node_with(
        TopologyConfig::all_remote(links_peer).with_route(
            Capability::RecordClick,
            RouteConfig::remote(analytics_peer).with_timeout_ms(2000),
        ),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    );
    let link = create_link(&node, ALICE, "https://example.com").await;

    for _ in 0..600 {
        node.dispatcher.fire(
            Capability::RecordClick,
            &serde_json::json!({ "code": link.code, "timestamp": "2024-01-01T00:00:00Z" }),
        );
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let app = redirect_app!(node);
    let start = Instant::now();
    let resp = test::call_service(
        &app,
        TestRequest::get().uri(&format!("/r/{}", link.code)).to_request(),
    )
    .await;
    let elapsed = start.elapsed();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com");
    assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);
}
