//! API request handlers.

use crate::error::ApiError;
use crate::governance::{
    CacheConfigPatch, CacheMetrics, CacheStats, EventLevel, FingerprintInput, HealthStatus,
    LiveEvent, fingerprint,
};
use crate::image;
use crate::models::{
    AnalyzeRequest, AnalyzeResponse, CacheConfigUpdateRequest, CacheConfigUpdateResponse,
    ClearCacheResponse, DetailedHealthResponse, HealthResponse, RecentEventsResponse,
    ResetMetricsResponse,
};
use crate::provider::AnalysisJob;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Combines two health classifications, keeping the worse one.
fn worst_status(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    match (a, b) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Warning, _) | (_, HealthStatus::Warning) => HealthStatus::Warning,
        _ => HealthStatus::Healthy,
    }
}

/// Converts a runtime cache config request into the cache's patch type.
fn to_cache_patch(request: &CacheConfigUpdateRequest) -> CacheConfigPatch {
    CacheConfigPatch {
        enabled: request.enabled,
        ttl: request.ttl_secs.map(Duration::from_secs),
        max_entries: request.max_entries,
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Detailed health aggregation across governance components.
///
/// Advisory only: a degraded status is reported, never used to halt traffic.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Aggregated component health", body = DetailedHealthResponse)
    ),
    tag = "Health"
)]
pub async fn detailed_health(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let cache = state.cache.health();
    let provider_reachable = state.provider.health_check().await;

    let provider_status = if provider_reachable {
        HealthStatus::Healthy
    } else {
        HealthStatus::Warning
    };

    Json(DetailedHealthResponse {
        status: worst_status(cache.status, provider_status),
        cache,
        provider_reachable,
    })
}

// ============================================================================
// Analysis Pipeline
// ============================================================================

/// Analyzes a trading-chart image.
///
/// Governance ordering: the rate limiter already ran in middleware; here the
/// cache is consulted before the provider is invoked. Cache and event bus
/// failures never surface to the caller.
#[utoipa::path(
    post,
    path = "/api/v1/analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis result", body = AnalyzeResponse),
        (status = 400, description = "Invalid request or image"),
        (status = 413, description = "Image too large"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 502, description = "Provider failure")
    ),
    tag = "Analysis"
)]
pub async fn analyze_chart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let started = Instant::now();

    if request.prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("prompt cannot be empty".to_string()));
    }

    let image_bytes = BASE64
        .decode(request.image_base64.as_bytes())
        .map_err(|e| ApiError::InvalidImage(format!("invalid base64 payload: {e}")))?;
    image::validate_image(&image_bytes, state.config.provider.max_image_bytes)?;

    let key = fingerprint(&FingerprintInput {
        prompt: &request.prompt,
        image_bytes: &image_bytes,
        symbol: request.chart.symbol.as_deref(),
        timeframe: request.chart.timeframe.as_deref(),
    });

    if let Some(analysis) = state.cache.get(&key) {
        state.cache.record_metrics(started.elapsed(), false);
        state.events.publish(
            LiveEvent::new(EventLevel::Info, "pipeline", "analysis served from cache")
                .with_details(serde_json::json!({ "fingerprint": key })),
        );
        return Ok(Json(AnalyzeResponse {
            analysis,
            cached: true,
            fingerprint: key,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }));
    }

    let job = AnalysisJob {
        prompt: request.prompt.clone(),
        image_bytes,
        chart: request.chart.clone(),
    };

    match state.provider.analyze(job).await {
        Ok(analysis) => {
            let elapsed = started.elapsed();
            state.cache.record_metrics(elapsed, false);
            state.cache.put(&key, analysis.clone());
            state.events.publish(
                LiveEvent::new(EventLevel::Info, "pipeline", "analysis completed").with_details(
                    serde_json::json!({
                        "fingerprint": key,
                        "elapsed_ms": elapsed.as_millis() as u64,
                    }),
                ),
            );
            Ok(Json(AnalyzeResponse {
                analysis,
                cached: false,
                fingerprint: key,
                elapsed_ms: elapsed.as_millis() as u64,
            }))
        }
        Err(e) => {
            state.cache.record_metrics(started.elapsed(), true);
            warn!("provider analysis failed: {}", e);
            state.events.publish(
                LiveEvent::new(EventLevel::Error, "pipeline", "analysis failed")
                    .with_details(serde_json::json!({ "error": e.to_string() })),
            );
            Err(ApiError::Provider(e.to_string()))
        }
    }
}

// ============================================================================
// Cache Administration
// ============================================================================

/// Live cache occupancy statistics.
#[utoipa::path(
    get,
    path = "/api/v1/cache/stats",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStats)
    ),
    tag = "Cache"
)]
pub async fn get_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Clears the response cache.
#[utoipa::path(
    delete,
    path = "/api/v1/cache",
    responses(
        (status = 200, description = "Cache cleared", body = ClearCacheResponse)
    ),
    tag = "Cache"
)]
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let removed = state.cache.len();
    state.cache.clear();
    Json(ClearCacheResponse {
        success: true,
        removed,
    })
}

/// Applies a partial cache configuration update.
#[utoipa::path(
    patch,
    path = "/api/v1/cache/config",
    request_body = CacheConfigUpdateRequest,
    responses(
        (status = 200, description = "Configuration updated", body = CacheConfigUpdateResponse),
        (status = 400, description = "Invalid configuration value")
    ),
    tag = "Cache"
)]
pub async fn update_cache_config(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CacheConfigUpdateRequest>,
) -> Result<Json<CacheConfigUpdateResponse>, ApiError> {
    state.cache.update_config(to_cache_patch(&request))?;
    Ok(Json(CacheConfigUpdateResponse {
        success: true,
        message: "cache configuration updated".to_string(),
    }))
}

// ============================================================================
// Metrics
// ============================================================================

/// Rolling pipeline metrics.
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    responses(
        (status = 200, description = "Pipeline metrics", body = CacheMetrics)
    ),
    tag = "Metrics"
)]
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<CacheMetrics> {
    Json(state.cache.metrics())
}

/// Zeroes the rolling pipeline metrics.
#[utoipa::path(
    post,
    path = "/api/v1/metrics/reset",
    responses(
        (status = 200, description = "Metrics reset", body = ResetMetricsResponse)
    ),
    tag = "Metrics"
)]
pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> Json<ResetMetricsResponse> {
    state.cache.reset_metrics();
    Json(ResetMetricsResponse {
        success: true,
        last_reset_ms: state.cache.metrics().last_reset_ms,
    })
}

// ============================================================================
// Events
// ============================================================================

/// Snapshot of the buffered diagnostic events, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/events/recent",
    responses(
        (status = 200, description = "Recent events", body = RecentEventsResponse)
    ),
    tag = "Events"
)]
pub async fn get_recent_events(State(state): State<Arc<AppState>>) -> Json<RecentEventsResponse> {
    let events = state.events.recent_events();
    let count = events.len();
    Json(RecentEventsResponse { events, count })
}
