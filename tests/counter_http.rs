//! End-to-end behavior of the counter endpoint.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

use visitor_counter::config::{CounterConfig, IncrementStrategy, MethodPolicy};
use visitor_counter::store::{DocumentKey, DocumentStore, FieldValue, MemoryStore};
use visitor_counter::CounterServer;

mod common;

use common::CountingStore;

fn router(config: CounterConfig, store: Arc<dyn DocumentStore>) -> Router {
    CounterServer::new(config, store).unwrap().router()
}

async fn send(router: &Router, method: Method) -> (StatusCode, axum::http::HeaderMap, String) {
    let request = Request::builder()
        .method(method)
        .uri("/")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

fn key() -> DocumentKey {
    DocumentKey::new("site_data", "visitor_count")
}

async fn stored_count(store: &CountingStore) -> Option<FieldValue> {
    store
        .inner
        .get(&key())
        .await
        .unwrap()
        .and_then(|doc| doc.get("count").cloned())
}

#[tokio::test]
async fn test_visit_visit_preflight_scenario() {
    let store = Arc::new(CountingStore::default());
    let router = router(CounterConfig::default(), store.clone());

    let (status, headers, body) = send(&router, Method::GET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    assert_eq!(stored_count(&store).await, Some(FieldValue::Integer(1)));

    let (status, _, body) = send(&router, Method::GET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "2");
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    assert_eq!(stored_count(&store).await, Some(FieldValue::Integer(2)));

    let calls_before = store.calls();
    let (status, headers, body) = send(&router, Method::OPTIONS).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    assert_eq!(store.calls(), calls_before);
    assert_eq!(stored_count(&store).await, Some(FieldValue::Integer(2)));
}

#[tokio::test]
async fn test_preflight_ignores_request_headers() {
    let store = Arc::new(CountingStore::default());
    let router = router(CounterConfig::default(), store.clone());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/some/path?x=1")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "Authorization, X-Custom")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("ignored"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_sequential_visits_count_up() {
    let router = router(CounterConfig::default(), Arc::new(MemoryStore::new()));

    let mut previous = 0u64;
    for _ in 0..25 {
        let (status, _, body) = send(&router, Method::GET).await;
        assert_eq!(status, StatusCode::OK);
        let count: u64 = body.parse().unwrap();
        assert_eq!(count, previous + 1);
        previous = count;
    }
}

#[tokio::test]
async fn test_permissive_policy_counts_any_method() {
    let store = Arc::new(CountingStore::default());
    let router = router(CounterConfig::default(), store.clone());

    let (status, headers, body) = send(&router, Method::POST).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let (_, _, body) = send(&router, Method::DELETE).await;
    assert_eq!(body, "2");
}

#[tokio::test]
async fn test_strict_policy_rejects_other_methods() {
    let store = Arc::new(CountingStore::default());
    let mut config = CounterConfig::default();
    config.methods.policy = MethodPolicy::Strict;
    let router = router(config, store.clone());

    let (status, headers, body) = send(&router, Method::POST).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[header::ALLOW], "GET, HEAD, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(body.is_empty());
    assert_eq!(store.calls(), 0);

    let (status, _, body) = send(&router, Method::GET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");

    let (status, _, _) = send(&router, Method::OPTIONS).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_store_failure_is_generic_500() {
    let store = Arc::new(CountingStore::failing());
    let router = router(CounterConfig::default(), store.clone());

    let (status, headers, body) = send(&router, Method::GET).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Internal Server Error");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_custom_document_location() {
    let store = Arc::new(MemoryStore::new());
    let mut config = CounterConfig::default();
    config.counter.collection = "stats".into();
    config.counter.document = "homepage".into();
    config.counter.field = "visits".into();
    config.increment.strategy = IncrementStrategy::CompareAndSwap;
    let router = router(config, store.clone());

    let (_, _, body) = send(&router, Method::GET).await;
    assert_eq!(body, "1");

    let doc = store.get(&DocumentKey::new("stats", "homepage")).await.unwrap().unwrap();
    assert_eq!(doc.get("visits"), Some(&FieldValue::Integer(1)));
    assert!(store.get(&key()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visits_over_socket() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let mut config = CounterConfig::default();
    config.increment.strategy = IncrementStrategy::CompareAndSwap;
    config.increment.max_attempts = 500;
    config.increment.base_delay_ms = 1;
    config.increment.max_delay_ms = 5;
    let (addr, shutdown) = common::start_server(config, store.clone()).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let mut handles = Vec::new();
    for _ in 0..30 {
        let client = client.clone();
        let url = format!("http://{}/", addr);
        handles.push(tokio::spawn(async move {
            let res = client.get(url).send().await.unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(res.headers()["access-control-allow-origin"], "*");
            res.text().await.unwrap().parse::<u64>().unwrap()
        }));
    }

    let mut counts = Vec::new();
    for h in handles {
        counts.push(h.await.unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=30).collect::<Vec<u64>>());

    let doc = store.get(&key()).await.unwrap().unwrap();
    assert_eq!(doc.get("count"), Some(&FieldValue::Integer(30)));

    shutdown.trigger();
}
