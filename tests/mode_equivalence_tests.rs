//! Topology equivalence tests
//!
//! The same sequence of capability calls must produce the same outcomes
//! whether everything runs in-process, everything is forwarded to a peer,
//! or the services are split across two processes that call each other.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use morphlink::capability::Capability;
use morphlink::dispatch::{Dispatcher, InvokeOptions, RouteConfig, TopologyConfig};
use morphlink::errors::ErrorKind;
use morphlink::storage::{MemoryClickStore, MemoryLinkStore};

use common::{ALICE, BOB, embedded_node, node_with, reserve_listener, serve, serve_on};

// =============================================================================
// Scenario
// =============================================================================

type Outcome = Result<Value, ErrorKind>;

/// Drop fields that legitimately differ between runs
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != "created_at" && k != "updated_at")
                .map(|(k, v)| (k, normalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

async fn step(dispatcher: &Dispatcher, capability: Capability, payload: Value) -> Outcome {
    dispatcher
        .invoke(capability, payload, InvokeOptions::default())
        .await
        .map(normalize)
        .map_err(|e| e.kind())
}

async fn run_scenario(dispatcher: &Dispatcher) -> Vec<(&'static str, Outcome)> {
    let clicked_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut outcomes = Vec::new();

    macro_rules! record {
        ($label:expr, $cap:expr, $payload:expr) => {
            outcomes.push(($label, step(dispatcher, $cap, $payload).await));
        };
    }

    record!(
        "authorize",
        Capability::Authorize,
        json!({ "credential": ALICE })
    );
    record!(
        "authorize-bad",
        Capability::Authorize,
        json!({ "credential": "nope" })
    );
    record!(
        "create",
        Capability::CreateLink,
        json!({ "credential": ALICE, "target_url": "https://example.com", "code": "eq-1" })
    );
    record!(
        "create-duplicate",
        Capability::CreateLink,
        json!({ "credential": BOB, "target_url": "https://example.net", "code": "eq-1" })
    );
    record!(
        "create-dangerous",
        Capability::CreateLink,
        json!({ "credential": ALICE, "target_url": "javascript:alert(1)" })
    );
    record!(
        "create-unauthorized",
        Capability::CreateLink,
        json!({ "credential": "nope", "target_url": "https://example.com" })
    );
    record!(
        "create-malformed",
        Capability::CreateLink,
        json!({ "credential": ALICE })
    );
    record!(
        "resolve",
        Capability::ResolveLink,
        json!({ "code": "eq-1" })
    );
    record!(
        "resolve-missing",
        Capability::ResolveLink,
        json!({ "code": "missing" })
    );
    record!(
        "get-foreign",
        Capability::GetLink,
        json!({ "credential": BOB, "code": "eq-1" })
    );
    record!(
        "update",
        Capability::UpdateLink,
        json!({ "credential": ALICE, "code": "eq-1", "target_url": "https://example.org" })
    );
    record!(
        "list",
        Capability::ListLinks,
        json!({ "credential": ALICE })
    );
    record!(
        "list-other-owner",
        Capability::ListLinks,
        json!({ "credential": BOB })
    );
    record!(
        "record-click",
        Capability::RecordClick,
        json!({ "code": "eq-1", "timestamp": clicked_at, "metadata": { "source": "newsletter" } })
    );
    record!(
        "stats",
        Capability::GetStats,
        json!({ "credential": ALICE })
    );
    record!(
        "link-stats",
        Capability::GetLinkStats,
        json!({ "credential": ALICE, "code": "eq-1" })
    );
    record!(
        "link-stats-foreign",
        Capability::GetLinkStats,
        json!({ "credential": BOB, "code": "eq-1" })
    );
    record!(
        "delete-foreign",
        Capability::DeleteLink,
        json!({ "credential": BOB, "code": "eq-1" })
    );
    record!(
        "delete-missing",
        Capability::DeleteLink,
        json!({ "credential": ALICE, "code": "missing" })
    );
    record!(
        "delete",
        Capability::DeleteLink,
        json!({ "credential": ALICE, "code": "eq-1" })
    );
    record!(
        "resolve-deleted",
        Capability::ResolveLink,
        json!({ "code": "eq-1" })
    );

    outcomes
}

fn assert_equivalent(
    expected: &[(&'static str, Outcome)],
    actual: &[(&'static str, Outcome)],
) {
    assert_eq!(expected.len(), actual.len());
    for ((label, want), (_, got)) in expected.iter().zip(actual) {
        assert_eq!(want, got, "step '{}' diverged", label);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[actix_rt::test]
async fn test_embedded_scenario_outcomes() {
    let node = embedded_node();
    let outcomes = run_scenario(&node.dispatcher).await;
    let by_label = |label: &str| {
        outcomes
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, o)| o.clone())
            .unwrap()
    };

    assert_eq!(
        by_label("authorize"),
        Ok(json!({ "user_id": "alice", "display_name": "Alice" }))
    );
    assert_eq!(by_label("authorize-bad"), Err(ErrorKind::Unauthorized));
    assert_eq!(by_label("create-duplicate"), Err(ErrorKind::Conflict));
    assert_eq!(by_label("create-dangerous"), Err(ErrorKind::InvalidRequest));
    assert_eq!(by_label("create-unauthorized"), Err(ErrorKind::Unauthorized));
    assert_eq!(by_label("create-malformed"), Err(ErrorKind::Internal));
    assert_eq!(
        by_label("resolve"),
        Ok(json!({ "target_url": "https://example.com" }))
    );
    assert_eq!(by_label("resolve-missing"), Err(ErrorKind::NotFound));
    assert_eq!(by_label("get-foreign"), Err(ErrorKind::Forbidden));
    assert_eq!(by_label("list-other-owner"), Ok(json!([])));
    assert_eq!(by_label("stats"), Ok(json!({ "eq-1": 1 })));
    assert_eq!(by_label("delete-foreign"), Err(ErrorKind::Forbidden));
    assert_eq!(by_label("delete-missing"), Err(ErrorKind::NotFound));
    assert_eq!(
        by_label("delete"),
        Ok(json!({ "code": "eq-1", "deleted": true }))
    );
    assert_eq!(by_label("resolve-deleted"), Err(ErrorKind::NotFound));
}

#[actix_rt::test]
async fn test_all_remote_matches_embedded() {
    let expected = run_scenario(&embedded_node().dispatcher).await;

    let peer = embedded_node();
    let endpoint = serve(&peer);
    let caller = node_with(
        TopologyConfig::all_remote(endpoint),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    );

    let actual = run_scenario(&caller.dispatcher).await;
    assert_equivalent(&expected, &actual);
}

#[actix_rt::test]
async fn test_split_processes_match_embedded() {
    let expected = run_scenario(&embedded_node().dispatcher).await;

    // links + auth on one process, analytics on the other, each calling across
    let (links_listener, links_endpoint) = reserve_listener();
    let (analytics_listener, analytics_endpoint) = reserve_listener();

    let to_analytics = RouteConfig::remote(analytics_endpoint.clone());
    let links_node = node_with(
        TopologyConfig::embedded()
            .with_route(Capability::RecordClick, to_analytics.clone())
            .with_route(Capability::GetStats, to_analytics.clone())
            .with_route(Capability::GetLinkStats, to_analytics),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    );

    let analytics_node = node_with(
        TopologyConfig::all_remote(links_endpoint)
            .with_route(Capability::RecordClick, RouteConfig::embedded())
            .with_route(Capability::GetStats, RouteConfig::embedded())
            .with_route(Capability::GetLinkStats, RouteConfig::embedded()),
        Arc::new(MemoryLinkStore::new()),
        Arc::new(MemoryClickStore::new()),
    );

    serve_on(&links_node, links_listener);
    serve_on(&analytics_node, analytics_listener);

    let actual = run_scenario(&links_node.dispatcher).await;
    assert_equivalent(&expected, &actual);

    // The analytics side sees the same results through its own dispatcher
    let from_analytics = step(
        &analytics_node.dispatcher,
        Capability::GetStats,
        json!({ "credential": ALICE }),
    )
    .await;
    assert_eq!(from_analytics, Ok(json!({})));
}
