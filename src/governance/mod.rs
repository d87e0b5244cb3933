//! Request governance and diagnostics layer.
//!
//! Every inbound request passes through this layer before any expensive work
//! runs: the rate limiter decides whether the request may proceed, the
//! response cache short-circuits recomputation of identical requests, and the
//! live event bus carries diagnostic events to the streaming endpoint.
//!
//! Each component owns disjoint state, is constructed from explicit
//! configuration, and exposes a `shutdown` method that cancels its background
//! tasks.

pub mod cache;
pub mod events;
pub mod rate_limiter;

pub use cache::{
    CacheConfig, CacheConfigPatch, CacheHealth, CacheMetrics, CacheStats, FingerprintInput,
    HealthStatus, ResponseCache, fingerprint,
};
pub use events::{EventLevel, EventSubscription, LiveEvent, LiveEventBus};
pub use rate_limiter::{RateLimitDecision, RateLimiter, RateLimiterConfig};

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised when constructing a governance component.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// A configuration tunable is out of range.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
