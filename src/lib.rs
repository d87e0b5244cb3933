//! # Chart Insight Backend - REST API Server
//!
//! A REST API backend that accepts trading-chart images, forwards them to an
//! external AI analysis provider, and governs every request through an
//! in-process rate limiter, response cache and live diagnostics bus. Built
//! with [Axum](https://crates.io/crates/axum) for async HTTP handling and
//! provides OpenAPI/Swagger documentation via
//! [utoipa](https://crates.io/crates/utoipa).
//!
//! ## Key Features
//!
//! - **Request Governance**: Every inbound request passes the per-key
//!   fixed-window rate limiter before any work runs; rejections surface as
//!   structured 429 responses with retry hints.
//!
//! - **Response Caching**: Analysis results are stored under a deterministic
//!   request fingerprint with TTL plus composite LFU+LRU eviction, so
//!   logically identical requests only pay for the provider call once.
//!
//! - **Live Diagnostics**: A bounded event bus feeds a server-sent-events
//!   endpoint with backlog replay, heartbeats and per-subscriber failure
//!   isolation.
//!
//! - **OpenAPI Documentation**: Auto-generated Swagger UI for API exploration
//!   and testing at `/swagger-ui/`.
//!
//! - **Structured Logging**: Request tracing with `tower-http` for debugging
//!   and monitoring.
//!
//! - **Thread-Safe State**: Shared application state using `Arc` for
//!   concurrent request handling; each governance store is lock-protected.
//!
//! ## Architecture
//!
//! ```text
//! inbound request
//!   └── RateLimiter (middleware, short-circuits with 429)
//!         └── ResponseCache (fingerprint lookup, short-circuits on hit)
//!               └── AnalysisProvider (external AI service)
//!
//! all three publish diagnostic events ──► LiveEventBus ──► /api/v1/events/stream
//! ```
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Route handlers, middleware and router configuration |
//! | [`config`] | TOML configuration loading and validation |
//! | [`error`] | API error types with `IntoResponse` implementation |
//! | [`governance`] | Rate limiter, response cache and live event bus |
//! | [`image`] | Minimal chart image validation |
//! | [`models`] | Request/response DTOs with OpenAPI schemas |
//! | [`provider`] | Upstream AI analysis provider client |
//! | [`state`] | Application state management |
//!
//! ## API Endpoints
//!
//! ### Health & Metrics
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/health` | Liveness check (rate limit exempt) |
//! | GET | `/api/v1/health` | Aggregated component health |
//! | GET | `/api/v1/metrics` | Rolling pipeline metrics |
//! | POST | `/api/v1/metrics/reset` | Zero the rolling metrics |
//!
//! ### Analysis
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/api/v1/analysis` | Analyze a trading-chart image |
//!
//! ### Cache
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/v1/cache/stats` | Live cache occupancy |
//! | DELETE | `/api/v1/cache` | Clear the cache |
//! | PATCH | `/api/v1/cache/config` | Partial runtime configuration update |
//!
//! ### Events
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/v1/events/recent` | Buffered diagnostic events |
//! | GET | `/api/v1/events/stream` | Server-sent event stream |
//!
//! ## Example Usage
//!
//! ### Starting the Server
//!
//! ```bash
//! # Development mode
//! cargo run
//!
//! # With custom host/port
//! HOST=127.0.0.1 PORT=3000 cargo run
//!
//! # With a configuration file
//! CONFIG_PATH=config.toml cargo run
//! ```
//!
//! ### API Requests
//!
//! ```bash
//! # Analyze a chart image
//! curl -X POST http://localhost:8080/api/v1/analysis \
//!   -H "Content-Type: application/json" \
//!   -d '{"prompt": "describe the trend", "image_base64": "<...>",
//!        "chart": {"symbol": "BTCUSD", "timeframe": "4h"}}'
//!
//! # Inspect cache occupancy
//! curl http://localhost:8080/api/v1/cache/stats
//!
//! # Follow the live diagnostics stream
//! curl -N http://localhost:8080/api/v1/events/stream
//! ```
//!
//! ## Swagger UI
//!
//! Once the server is running, access the interactive API documentation at:
//!
//! ```text
//! http://localhost:8080/swagger-ui/
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod governance;
pub mod image;
pub mod models;
pub mod provider;
pub mod state;
