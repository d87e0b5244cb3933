//! Route configuration.

use crate::api::{handlers, middleware, stream};
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, patch, post};
use std::sync::Arc;

/// Creates the API router.
///
/// The rate limit middleware wraps every route except `/health`, so
/// governance runs strictly before any handler work.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/v1/health", get(handlers::detailed_health))
        // Analysis pipeline
        .route("/api/v1/analysis", post(handlers::analyze_chart))
        // Cache administration
        .route("/api/v1/cache", delete(handlers::clear_cache))
        .route("/api/v1/cache/stats", get(handlers::get_cache_stats))
        .route("/api/v1/cache/config", patch(handlers::update_cache_config))
        // Metrics
        .route("/api/v1/metrics", get(handlers::get_metrics))
        .route("/api/v1/metrics/reset", post(handlers::reset_metrics))
        // Events
        .route("/api/v1/events/recent", get(handlers::get_recent_events))
        .route("/api/v1/events/stream", get(stream::stream_events))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::rate_limit_middleware,
        ))
        .with_state(state)
}
