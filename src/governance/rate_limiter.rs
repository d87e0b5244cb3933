//! Per-key fixed-window rate limiting.
//!
//! Each key owns a counter that resets at fixed window boundaries. The
//! algorithm deliberately remains fixed-window rather than sliding-log or
//! token-bucket: a caller can burst up to twice the configured rate across a
//! window boundary. Window expiry is checked lazily on every hit, so the
//! periodic sweep only bounds memory for keys that stop arriving.

use super::events::{EventLevel, LiveEvent, LiveEventBus};
use super::{GovernanceError, now_ms};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Rate limiter tunables.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Length of the counting window.
    pub window: Duration,
    /// Maximum requests allowed per key per window.
    pub max_requests: u32,
    /// Revert the counter increment when the request later succeeds.
    pub skip_successful_requests: bool,
    /// Revert the counter increment when the request later fails.
    pub skip_failed_requests: bool,
    /// How often the background sweep removes expired entries.
    pub cleanup_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
            skip_successful_requests: false,
            skip_failed_requests: false,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl RateLimiterConfig {
    /// Validates the tunables.
    ///
    /// # Errors
    /// Returns error if the window or the request budget is non-positive.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.window.is_zero() {
            return Err(GovernanceError::InvalidValue(
                "rate limit window must be positive".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(GovernanceError::InvalidValue(
                "rate limit max_requests must be positive".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(GovernanceError::InvalidValue(
                "rate limit cleanup_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a rate limit check. Always a value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Configured request budget per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window resets, in epoch milliseconds.
    pub reset_at_ms: u64,
    /// How long to wait before retrying. Zero when allowed.
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    /// Window reset time in whole epoch seconds, for the `X-RateLimit-Reset` header.
    #[must_use]
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_at_ms / 1000
    }

    /// Retry hint in whole seconds, rounded up, for the `Retry-After` header.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }
}

/// Per-key window counter.
#[derive(Debug)]
struct WindowEntry {
    /// Requests counted in the current window.
    count: u32,
    /// End of the current window in epoch milliseconds.
    reset_at_ms: u64,
}

/// Fixed-window per-key rate limiter backed by a DashMap.
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<DashMap<String, WindowEntry>>,
    /// Optional diagnostics sink for throttle events.
    bus: Option<Arc<LiveEventBus>>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Creates a rate limiter.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn new(config: RateLimiterConfig) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self {
            config,
            entries: Arc::new(DashMap::new()),
            bus: None,
            sweep_handle: Mutex::new(None),
        })
    }

    /// Attaches a diagnostics bus; throttled keys publish a warning event.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<LiveEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Checks whether a request for `key` may proceed, reserving one slot
    /// from the window budget when it may.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, now_ms())
    }

    /// Reports the final outcome of a previously allowed request.
    ///
    /// When the matching skip flag is configured, the slot reserved by
    /// `check` is returned to the current window budget.
    pub fn record_outcome(&self, key: &str, success: bool) {
        let revert = (success && self.config.skip_successful_requests)
            || (!success && self.config.skip_failed_requests);
        if !revert {
            return;
        }

        if let Some(mut entry) = self.entries.get_mut(key)
            && now_ms() <= entry.reset_at_ms
        {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    /// Starts the periodic sweep that drops expired entries.
    ///
    /// The sweep only bounds memory; window expiry is already checked lazily
    /// on every hit.
    pub fn start_sweep(&self) {
        let mut handle = self.sweep_handle.lock();
        if handle.is_some() {
            return;
        }

        let entries = Arc::clone(&self.entries);
        let interval = self.config.cleanup_interval;
        *handle = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await;
            loop {
                tick.tick().await;
                let removed = Self::sweep_expired(&entries, now_ms());
                if removed > 0 {
                    debug!("rate limiter sweep removed {} expired keys", removed);
                }
            }
        }));
    }

    /// Cancels the background sweep.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweep_handle.lock().take() {
            handle.abort();
        }
    }

    /// Number of tracked keys (for monitoring).
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    fn check_at(&self, key: &str, now_ms: u64) -> RateLimitDecision {
        let limit = self.config.max_requests;
        let window_ms = self.config.window.as_millis() as u64;

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at_ms: now_ms + window_ms,
            });

        // A stale entry is treated as absent even before the sweep runs.
        if now_ms > entry.reset_at_ms {
            entry.count = 0;
            entry.reset_at_ms = now_ms + window_ms;
        }

        if entry.count >= limit {
            let decision = RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms: entry.reset_at_ms,
                retry_after_ms: entry.reset_at_ms.saturating_sub(now_ms),
            };
            drop(entry);
            self.publish_throttled(key, decision.retry_after_ms);
            return decision;
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_at_ms: entry.reset_at_ms,
            retry_after_ms: 0,
        }
    }

    fn publish_throttled(&self, key: &str, retry_after_ms: u64) {
        if let Some(bus) = &self.bus {
            bus.publish(
                LiveEvent::new(
                    EventLevel::Warning,
                    "rate-limiter",
                    format!("rate limit exceeded for key {key}"),
                )
                .with_details(serde_json::json!({
                    "key": key,
                    "retry_after_ms": retry_after_ms,
                })),
            );
        }
    }

    fn sweep_expired(entries: &DashMap<String, WindowEntry>, now_ms: u64) -> usize {
        let stale: Vec<String> = entries
            .iter()
            .filter(|entry| now_ms > entry.value().reset_at_ms)
            .map(|entry| entry.key().clone())
            .collect();

        let count = stale.len();
        for key in stale {
            entries.remove(&key);
        }
        count
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.entries.len())
            .finish()
    }
}
