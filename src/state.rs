//! Application state management.

use crate::config::Config;
use crate::governance::{LiveEventBus, RateLimiter, ResponseCache};
use crate::provider::{AnalysisProvider, HttpAnalysisProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Application state shared across all handlers.
///
/// Every governance component is an explicit instance constructed from
/// configuration, never a process-wide singleton, so tests can run multiple
/// isolated states side by side.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Per-key request rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Response cache for analysis results.
    pub cache: Arc<ResponseCache>,
    /// Diagnostic event bus.
    pub events: Arc<LiveEventBus>,
    /// Upstream analysis provider.
    pub provider: Arc<dyn AnalysisProvider>,
    /// Server start time.
    started_at: Instant,
}

impl AppState {
    /// Creates application state from configuration with the HTTP provider.
    ///
    /// # Errors
    /// Returns error if any component configuration is invalid or the
    /// provider client cannot be built.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let provider: Arc<dyn AnalysisProvider> =
            Arc::new(HttpAnalysisProvider::new(&config.provider)?);
        Self::with_provider(config, provider)
    }

    /// Creates application state with an injected provider implementation.
    ///
    /// # Errors
    /// Returns error if any component configuration is invalid.
    pub fn with_provider(
        config: Config,
        provider: Arc<dyn AnalysisProvider>,
    ) -> anyhow::Result<Self> {
        let events = Arc::new(LiveEventBus::new(
            config.events.buffer_capacity,
            Duration::from_millis(config.events.keepalive_interval_ms),
        ));

        let rate_limiter = Arc::new(
            RateLimiter::new(config.rate_limit.to_limiter_config())?
                .with_event_bus(Arc::clone(&events)),
        );

        let cache = Arc::new(
            ResponseCache::new(config.cache.to_cache_config())?
                .with_event_bus(Arc::clone(&events)),
        );

        Ok(Self {
            config,
            rate_limiter,
            cache,
            events,
            provider,
            started_at: Instant::now(),
        })
    }

    /// Starts the periodic sweeps owned by the governance components.
    pub fn start_background_tasks(&self) {
        self.rate_limiter.start_sweep();
        self.cache.start_sweep();
        info!("governance background sweeps started");
    }

    /// Cancels all background work owned by this state.
    pub fn shutdown(&self) {
        self.rate_limiter.shutdown();
        self.cache.shutdown();
        self.events.shutdown();
        info!("governance components shut down");
    }

    /// Seconds since this state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
