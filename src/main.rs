//! Chart Insight Backend Server
//!
//! REST API server for governed trading-chart analysis.

use chart_insight_backend::api::create_router;
use chart_insight_backend::config::Config;
use chart_insight_backend::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use chart_insight_backend::governance::{
    CacheHealth, CacheMetrics, CacheStats, EventLevel, HealthStatus, LiveEvent,
};
use chart_insight_backend::models::{
    AnalyzeRequest, AnalyzeResponse, CacheConfigUpdateRequest, CacheConfigUpdateResponse,
    ChartMetadata, ClearCacheResponse, DetailedHealthResponse, HealthResponse,
    RecentEventsResponse, ResetMetricsResponse,
};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        chart_insight_backend::api::handlers::health_check,
        chart_insight_backend::api::handlers::detailed_health,
        chart_insight_backend::api::handlers::analyze_chart,
        chart_insight_backend::api::handlers::get_cache_stats,
        chart_insight_backend::api::handlers::clear_cache,
        chart_insight_backend::api::handlers::update_cache_config,
        chart_insight_backend::api::handlers::get_metrics,
        chart_insight_backend::api::handlers::reset_metrics,
        chart_insight_backend::api::handlers::get_recent_events,
        chart_insight_backend::api::stream::stream_events,
    ),
    components(
        schemas(
            HealthResponse,
            DetailedHealthResponse,
            HealthStatus,
            CacheHealth,
            CacheStats,
            CacheMetrics,
            AnalyzeRequest,
            AnalyzeResponse,
            ChartMetadata,
            CacheConfigUpdateRequest,
            CacheConfigUpdateResponse,
            ClearCacheResponse,
            ResetMetricsResponse,
            RecentEventsResponse,
            LiveEvent,
            EventLevel,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Analysis", description = "Chart analysis pipeline"),
        (name = "Cache", description = "Response cache administration"),
        (name = "Metrics", description = "Rolling pipeline metrics"),
        (name = "Events", description = "Live diagnostic events"),
    ),
    info(
        title = "Chart Insight Backend API",
        version = "0.2.0",
        description = "REST API for rate-limited, cached trading-chart analysis",
        license(name = "MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from CONFIG_PATH if set, defaults otherwise
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            Config::load(&path)?
        }
        Err(_) => Config::default(),
    };

    // Host and port env overrides take precedence over the config file
    let host = std::env::var("HOST").unwrap_or_else(|_| config.server.host.clone());
    let port: u16 = match std::env::var("PORT") {
        Ok(value) => value.parse()?,
        Err(_) => config.server.port,
    };

    // Create application state and spawn the governance sweep loops
    let state = Arc::new(AppState::from_config(config)?);
    state.start_background_tasks();
    state.events.publish(LiveEvent::new(
        EventLevel::Info,
        "system",
        "server starting",
    ));

    info!("Starting Chart Insight Backend on {}:{}", host, port);
    info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        host, port
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = create_router(Arc::clone(&state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start the server
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_after(tokio::signal::ctrl_c()))
        .await?;

    info!("Shutting down, stopping background tasks");
    state.shutdown();

    Ok(())
}

/// Resolves once the shutdown signal fires.
///
/// A failure to install the signal handler must not look like a shutdown
/// request, so the error branch parks forever instead of returning.
async fn shutdown_after(signal: impl std::future::Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!("failed to install shutdown signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
