// Web route tests — requests go straight through the router, no socket.
#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use wazewatch::alerts::{classify, Alert};
use wazewatch::db::{MemoryStore, PersistedState, StateStore};
use wazewatch::hub::FanoutHub;
use wazewatch::state::{CategoryFilters, DedupStore, FilterStore, PeakCounter, SeenEntry};
use wazewatch::web::{build_router, AppState};

fn state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        hub: Arc::new(FanoutHub::new(None)),
        filters: Arc::new(FilterStore::default()),
        store: store.clone(),
        dedup: Arc::new(DedupStore::new()),
        peak: Arc::new(PeakCounter::new()),
    };
    (state, store)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (state, _) = state();
    let (status, body) = send(build_router(state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn alerts_lists_dispatched_entries_in_order() {
    let (state, _) = state();
    for (id, tag) in [("a1", "JAM"), ("a2", "POLICE")] {
        let alert = Alert::from_value(json!({"uuid": id, "type": tag})).unwrap();
        let (category, rendered) = classify(&alert).unwrap();
        state.hub.dispatch(alert, category, rendered).await;
    }

    let (status, body) = send(build_router(state.clone()), get("/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["alert"]["uuid"], "a1");
    assert_eq!(entries[1]["category"], "police");

    let (_, body) = send(build_router(state), get("/alerts?since=1")).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn filters_update_is_applied_and_persisted() {
    let (state, store) = state();
    let (status, _) = send(
        build_router(state.clone()),
        post_json("/filters", r#"{"chitChat": true, "jam": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let expected = CategoryFilters {
        chit_chat: true,
        jam: true,
        ..CategoryFilters::default()
    };
    assert_eq!(state.filters.get(), expected);
    let saved = store.load().await.unwrap();
    let saved: CategoryFilters = serde_json::from_str(saved.filters.as_deref().unwrap()).unwrap();
    assert_eq!(saved, expected);

    let (status, body) = send(build_router(state), get("/filters")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["chitChat"], true);
    assert_eq!(body["police"], false);
}

#[tokio::test]
async fn legacy_update_route_still_works() {
    let (state, _) = state();
    let (status, _) = send(
        build_router(state.clone()),
        post_json("/updateFilters", r#"{"police": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.filters.get().police);
}

#[tokio::test]
async fn bad_filter_body_is_rejected_and_changes_nothing() {
    let (state, store) = state();
    state.filters.replace(CategoryFilters::all());

    let (status, body) = send(build_router(state.clone()), post_json("/filters", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid filters"));

    assert_eq!(state.filters.get(), CategoryFilters::all());
    assert!(store.load().await.unwrap().filters.is_none());
}

#[tokio::test]
async fn status_reports_counters() {
    let (state, _) = state();
    state.dedup.add("a1");
    state.peak.observe(42).unwrap();

    let (status, body) = send(build_router(state), get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["processed_alerts"], 1);
    assert_eq!(body["peak_users_online"], 42);
    assert_eq!(body["hub"]["dispatched"], 0);
    assert!(body["last_saved_at"].is_null());
}

/// A database that is gone: every call errors.
struct UnreachableStore;

#[async_trait]
impl StateStore for UnreachableStore {
    async fn load(&self) -> Result<PersistedState> {
        anyhow::bail!("database is locked")
    }

    async fn save_snapshot(&self, _: &[SeenEntry], _: u64) -> Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn save_filters(&self, _: &CategoryFilters) -> Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn last_saved_at(&self) -> Result<Option<String>> {
        anyhow::bail!("database is locked")
    }
}

#[tokio::test]
async fn status_survives_an_unreadable_store() {
    let (mut state, _) = state();
    state.store = Arc::new(UnreachableStore);
    state.dedup.add("a1");

    let (status, body) = send(build_router(state), get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["processed_alerts"], 1);
    assert!(body["last_saved_at"].is_null());
}

#[tokio::test]
async fn filter_form_posts_to_the_update_route() {
    let (state, _) = state();
    state.filters.replace(CategoryFilters::from_names("jam").unwrap());

    let (status, body) = send(build_router(state.clone()), get("/filters/edit")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    for name in ["chit_chat", "police", "jam", "accident", "unknown"] {
        assert!(html.contains(&format!(r#"name="{name}""#)), "missing {name}");
    }
    assert!(html.contains(r#"name="jam" checked"#));
    assert!(html.contains("/updateFilters"));

    // What the form's script sends for a single ticked box
    let (status, _) = send(
        build_router(state.clone()),
        post_json("/updateFilters", r#"{"chit_chat": true, "police": false}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let filters = state.filters.get();
    assert!(filters.chit_chat);
    assert!(!filters.jam);
}

#[tokio::test]
async fn index_points_at_the_routes() {
    let (state, _) = state();
    let (status, body) = send(build_router(state), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("/events"));
    assert!(text.contains("/filters/edit"));
}
