//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use resource_cache::api::{create_router, CACHE_SOURCE_HEADER};
use resource_cache::behavior::BehaviorRecorder;
use resource_cache::cache::{CacheEngine, EngineOptions, StrategyTable};
use resource_cache::clock::ManualClock;
use resource_cache::fetch::Fetcher;
use resource_cache::prefetch::PrefetchOptions;
use resource_cache::storage::{MemoryBackend, PersistentStore};
use resource_cache::{AppState, CacheError, Result};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

/// Serves "payload of <key>", except for keys containing "/down/".
struct OriginFetcher;

#[async_trait]
impl Fetcher for OriginFetcher {
    async fn fetch(&self, key: &str) -> Result<Bytes> {
        if key.contains("/down/") {
            return Err(CacheError::NetworkError(format!("{} unreachable", key)));
        }
        Ok(Bytes::from(format!("payload of {}", key)))
    }
}

fn create_test_app() -> Router {
    let clock = Arc::new(ManualClock::new(0));
    let store = PersistentStore::new(Arc::new(MemoryBackend::new()));
    let engine = CacheEngine::new(
        StrategyTable::default_web(),
        Arc::new(OriginFetcher),
        clock.clone(),
        store.clone(),
        EngineOptions::default(),
    );
    let recorder = Arc::new(BehaviorRecorder::new(100, clock, store));
    create_router(AppState::new(engine, recorder, PrefetchOptions::default()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_bytes(body: Body) -> Bytes {
    axum::body::to_bytes(body, usize::MAX).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_method(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

// == Resolve Endpoint Tests ==

#[tokio::test]
async fn test_resolve_network_then_cache() {
    let app = create_test_app();

    let response = app.clone().oneshot(get("/resolve/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_SOURCE_HEADER], "network");
    assert_eq!(
        body_to_bytes(response.into_body()).await,
        Bytes::from("payload of /static/app.js")
    );

    let response = app.oneshot(get("/resolve/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_SOURCE_HEADER], "cache");
}

#[tokio::test]
async fn test_resolve_unknown_override() {
    let app = create_test_app();

    let response = app
        .oneshot(get("/resolve/app.js?strategy=nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_resolve_unreachable_cache_first() {
    let app = create_test_app();

    let response = app.oneshot(get("/resolve/down/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_resolve_unreachable_network_first() {
    let app = create_test_app();

    let response = app.oneshot(get("/resolve/api/down/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// == Entries Endpoint Tests ==

#[tokio::test]
async fn test_put_get_delete_entry() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(with_method(
            "PUT",
            "/entries/img/logo.png?strategy=images",
            Body::from("png-bytes"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/entries/img/logo.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_bytes(response.into_body()).await, Bytes::from("png-bytes"));

    let response = app
        .clone()
        .oneshot(with_method("DELETE", "/entries/img/logo.png", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], true);
    assert_eq!(json["key"], "/img/logo.png");

    let response = app.oneshot(get("/entries/img/logo.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_entry_requires_strategy() {
    let app = create_test_app();

    let response = app
        .oneshot(with_method("PUT", "/entries/a.png", Body::from("x")))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_clear_entries() {
    let app = create_test_app();
    app.clone().oneshot(get("/resolve/a.js")).await.unwrap();
    app.clone().oneshot(get("/resolve/b.css")).await.unwrap();

    let response = app
        .clone()
        .oneshot(with_method("DELETE", "/entries", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["cleared"], 2);

    let response = app
        .oneshot(with_method("DELETE", "/entries", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await["cleared"], 0);
}

// == Stats Endpoint Tests ==

#[tokio::test]
async fn test_stats_reflect_resolves() {
    let app = create_test_app();
    app.clone().oneshot(get("/resolve/app.js")).await.unwrap();
    app.clone().oneshot(get("/resolve/app.js")).await.unwrap();

    let response = app.clone().oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["strategies"]["app-shell"]["hits"], 1);
    assert_eq!(json["strategies"]["app-shell"]["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
    assert_eq!(json["degraded"], false);

    let response = app
        .clone()
        .oneshot(with_method("DELETE", "/stats", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(app.oneshot(get("/stats")).await.unwrap().into_body()).await;
    assert_eq!(json["strategies"]["app-shell"]["hits"], 0);
    assert_eq!(json["strategies"]["app-shell"]["item_count"], 1);
}

// == Behavior Endpoint Tests ==

#[tokio::test]
async fn test_events_predictions_and_navigate() {
    let app = create_test_app();

    for session in ["s1", "s2", "s3"] {
        for key in ["/home", "/feed"] {
            let body = format!(r#"{{"resource_key":"{}","session_id":"{}"}}"#, key, session);
            let response = app
                .clone()
                .oneshot(with_method("POST", "/events", Body::from(body)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
    }

    let response = app.clone().oneshot(get("/predictions/home?limit=3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["predictions"][0]["resource_key"], "/feed");
    assert_eq!(json["predictions"][0]["confidence"], 1.0);

    let response = app
        .oneshot(with_method(
            "POST",
            "/navigate",
            Body::from(r#"{"resource_key":"/home"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["scheduled"][0]["resource_key"], "/feed");
    assert_eq!(json["scheduled"][0]["priority"], "high");
}

#[tokio::test]
async fn test_event_validation() {
    let app = create_test_app();

    let response = app
        .oneshot(with_method(
            "POST",
            "/events",
            Body::from(r#"{"resource_key":"","session_id":"s"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predictions_cold_start() {
    let app = create_test_app();

    let response = app.oneshot(get("/predictions/nowhere")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["predictions"].as_array().unwrap().len(), 0);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
