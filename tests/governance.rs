//! In-process integration tests for the governed analysis pipeline.
//!
//! Each test builds a full router around an injected stub provider, so the
//! rate limiter, cache and event bus are exercised exactly as they are in
//! production, without any network dependency.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chart_insight_backend::api::create_router;
use chart_insight_backend::config::Config;
use chart_insight_backend::provider::{AnalysisJob, AnalysisProvider, ProviderError};
use chart_insight_backend::state::AppState;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tower::ServiceExt;

/// Stub provider that counts calls and can be switched into failure mode.
struct StubProvider {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StubProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AnalysisProvider for StubProvider {
    fn analyze(&self, job: AnalysisJob) -> BoxFuture<'_, Result<Value, ProviderError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        Box::pin(async move {
            if failing {
                Err(ProviderError::Status(503))
            } else {
                Ok(json!({ "trend": "bullish", "prompt": job.prompt }))
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

/// Minimal valid PNG payload for image validation.
fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}

fn analyze_body(prompt: &str) -> String {
    json!({
        "prompt": prompt,
        "image_base64": BASE64.encode(png_bytes()),
        "chart": { "symbol": "BTCUSD", "timeframe": "4h" }
    })
    .to_string()
}

fn build_app(max_requests: u32) -> (Router, Arc<AppState>, Arc<StubProvider>) {
    let mut config = Config::default();
    config.rate_limit.max_requests = max_requests;

    let provider = Arc::new(StubProvider::new());
    let state = Arc::new(
        AppState::with_provider(config, Arc::clone(&provider) as Arc<dyn AnalysisProvider>)
            .expect("state should build from default config"),
    );
    (create_router(Arc::clone(&state)), state, provider)
}

fn analyze_request(prompt: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/analysis")
        .header("Content-Type", "application/json")
        .body(Body::from(analyze_body(prompt)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_identical_requests_hit_cache_once() {
    let (app, _state, provider) = build_app(100);

    let first = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = json_body(first).await;
    assert_eq!(first_body["cached"], json!(false));

    let second = app
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = json_body(second).await;
    assert_eq!(second_body["cached"], json!(true));
    assert_eq!(second_body["fingerprint"], first_body["fingerprint"]);

    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_rate_limit_denies_before_cache() {
    let (app, _state, provider) = build_app(1);

    let first = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Identical request would be a cache hit, but the limiter runs first.
    let second = app
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("Retry-After"));
    assert!(second.headers().contains_key("X-RateLimit-Reset"));

    let body = json_body(second).await;
    assert_eq!(body["error"], json!("RATE_LIMIT_EXCEEDED"));

    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_rate_limit_headers_on_allowed_response() {
    let (app, _state, _provider) = build_app(10);

    let response = app
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "10");
    assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "9");
    assert!(headers.contains_key("X-RateLimit-Reset"));
}

#[tokio::test]
async fn test_health_exempt_from_rate_limit() {
    let (app, _state, _provider) = build_app(1);

    let warm = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(warm.status(), StatusCode::OK);

    let throttled = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    let health = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_provider_failure_is_not_cached() {
    let (app, _state, provider) = build_app(100);
    provider.set_failing(true);

    let failed = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

    provider.set_failing(false);
    let retried = app
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(retried.status(), StatusCode::OK);
    let body = json_body(retried).await;
    assert_eq!(body["cached"], json!(false));

    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_invalid_image_rejected() {
    let (app, _state, provider) = build_app(100);

    let body = json!({
        "prompt": "describe the trend",
        "image_base64": BASE64.encode(b"definitely not an image"),
    })
    .to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/analysis")
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_metrics_accumulate_and_reset() {
    let (app, state, _provider) = build_app(100);

    for prompt in ["first", "second", "first"] {
        let response = app.clone().oneshot(analyze_request(prompt)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let metrics = state.cache.metrics();
    assert_eq!(metrics.request_count, 3);
    // One of the three requests was a cache hit.
    assert!((metrics.cache_hit_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.error_rate, 0.0);

    let reset = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/metrics/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    assert_eq!(state.cache.metrics().request_count, 0);
}

#[tokio::test]
async fn test_pipeline_publishes_diagnostic_events() {
    let (app, state, _provider) = build_app(100);

    let response = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = state.events.recent_events();
    assert!(
        events
            .iter()
            .any(|e| e.source == "pipeline" && e.message == "analysis completed")
    );

    let recent = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/events/recent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(recent.status(), StatusCode::OK);
    let body = json_body(recent).await;
    assert!(body["count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_cache_admin_round_trip() {
    let (app, state, _provider) = build_app(100);

    let warm = app
        .clone()
        .oneshot(analyze_request("describe the trend"))
        .await
        .unwrap();
    assert_eq!(warm.status(), StatusCode::OK);
    assert_eq!(state.cache.len(), 1);

    let cleared = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let body = json_body(cleared).await;
    assert_eq!(body["removed"], json!(1));
    assert_eq!(state.cache.len(), 0);

    let patched = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/v1/cache/config")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "ttl_secs": 120 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
}
