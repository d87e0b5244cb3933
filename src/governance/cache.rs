//! Content-addressed response cache with TTL and usage-based eviction.
//!
//! Analysis results are stored under a deterministic fingerprint of the
//! request, so a logically identical request served twice only pays for the
//! upstream provider call once. Expiry is two-phase: every read checks the
//! entry's age (lazy), and a periodic sweep drops entries past their TTL even
//! when nobody reads them again (eager).
//!
//! Eviction is composite LFU+LRU, not pure LRU: when the cache is full the
//! bottom ~20% of entries ordered by `(access_count, created_at)` are removed
//! before the new entry is inserted. Under skewed access patterns this keeps
//! hot entries alive longer than recency alone would.

use super::events::{EventLevel, LiveEvent, LiveEventBus};
use super::{GovernanceError, now_ms};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use utoipa::ToSchema;

/// How many payload bytes participate in the fingerprint hash.
///
/// The fingerprint is a cheap rolling hash over a bounded prefix, not a
/// cryptographic digest. Payloads that differ only beyond this prefix (and
/// have the same length) collide; that is an accepted risk at this layer.
const FINGERPRINT_PREFIX_BYTES: usize = 4096;

/// Share of entries removed when the cache is full, as a divisor (5 = 20%).
const EVICTION_DIVISOR: usize = 5;

/// Cache tunables.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is active. A disabled cache misses on every read.
    pub enabled: bool,
    /// Entry time-to-live.
    pub ttl: Duration,
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// How often the background sweep removes expired entries.
    pub sweep_interval: Duration,
    /// Memory estimate above which health degrades to warning.
    pub memory_warning_bytes: u64,
    /// Memory estimate above which health degrades to unhealthy.
    pub memory_critical_bytes: u64,
    /// Error rate above which health degrades to warning.
    pub error_rate_warning: f64,
    /// Error rate above which health degrades to unhealthy.
    pub error_rate_critical: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            max_entries: 1000,
            sweep_interval: Duration::from_secs(600),
            memory_warning_bytes: 50 * 1024 * 1024,
            memory_critical_bytes: 100 * 1024 * 1024,
            error_rate_warning: 0.05,
            error_rate_critical: 0.15,
        }
    }
}

impl CacheConfig {
    /// Validates the tunables.
    ///
    /// # Errors
    /// Returns error if any duration or bound is non-positive, or the
    /// warning thresholds are not below the critical ones.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.ttl.is_zero() {
            return Err(GovernanceError::InvalidValue(
                "cache ttl must be positive".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(GovernanceError::InvalidValue(
                "cache max_entries must be positive".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(GovernanceError::InvalidValue(
                "cache sweep_interval must be positive".to_string(),
            ));
        }
        if self.memory_warning_bytes >= self.memory_critical_bytes {
            return Err(GovernanceError::InvalidValue(
                "cache memory_warning_bytes must be below memory_critical_bytes".to_string(),
            ));
        }
        if self.error_rate_warning >= self.error_rate_critical {
            return Err(GovernanceError::InvalidValue(
                "cache error_rate_warning must be below error_rate_critical".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runtime-adjustable subset of [`CacheConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheConfigPatch {
    /// New enabled flag, if changing.
    pub enabled: Option<bool>,
    /// New TTL, if changing.
    pub ttl: Option<Duration>,
    /// New entry bound, if changing.
    pub max_entries: Option<usize>,
}

/// Semantically relevant fields of an analysis request, used to derive the
/// cache fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    /// Analysis prompt text.
    pub prompt: &'a str,
    /// Raw chart image payload.
    pub image_bytes: &'a [u8],
    /// Instrument symbol from the chart metadata.
    pub symbol: Option<&'a str>,
    /// Chart timeframe from the chart metadata.
    pub timeframe: Option<&'a str>,
}

/// Live cache occupancy snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStats {
    /// Current number of live entries.
    pub size: usize,
    /// Configured entry bound.
    pub max_size: usize,
    /// Hit rate since the last metrics reset, 0.0 to 1.0.
    pub hit_rate: f64,
    /// Estimated memory usage in bytes.
    pub memory_usage_bytes: u64,
    /// Whether caching is active.
    pub enabled: bool,
}

/// Rolling pipeline metrics accumulated via [`ResponseCache::record_metrics`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheMetrics {
    /// Requests recorded since the last reset.
    pub request_count: u64,
    /// Mean recorded response time in milliseconds.
    pub average_response_time_ms: f64,
    /// Cache hit rate, 0.0 to 1.0.
    pub cache_hit_rate: f64,
    /// Share of recorded requests that failed, 0.0 to 1.0.
    pub error_rate: f64,
    /// Estimated memory usage in bytes.
    pub memory_usage_bytes: u64,
    /// When the metrics were last reset, in epoch milliseconds.
    pub last_reset_ms: u64,
}

/// Aggregate health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All indicators within bounds.
    Healthy,
    /// At least one indicator past its warning threshold.
    Warning,
    /// At least one indicator past its critical threshold.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result. Advisory only; degraded status never halts traffic.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheHealth {
    /// Overall classification.
    pub status: HealthStatus,
    /// Estimated memory usage in bytes.
    pub memory_usage_bytes: u64,
    /// Share of recorded requests that failed.
    pub error_rate: f64,
    /// Current number of live entries.
    pub entries: usize,
}

/// A cached analysis result.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at_ms: u64,
    last_accessed_at_ms: u64,
    access_count: u64,
    size_bytes: u64,
}

#[derive(Debug)]
struct MetricsState {
    request_count: u64,
    total_response_time_ms: u64,
    error_count: u64,
    hits: u64,
    misses: u64,
    last_reset_ms: u64,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            request_count: 0,
            total_response_time_ms: 0,
            error_count: 0,
            hits: 0,
            misses: 0,
            last_reset_ms: now_ms(),
        }
    }

    fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }
}

/// Computes the deterministic cache key for a request.
///
/// Prompt text and metadata are normalized (trimmed, lowercased) so
/// incidental formatting does not change the key. The payload contributes a
/// rolling hash over a bounded prefix plus its full length.
#[must_use]
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let prompt = input.prompt.trim().to_lowercase();
    let mut hash = rolling_hash(5381, prompt.as_bytes());

    let prefix_len = input.image_bytes.len().min(FINGERPRINT_PREFIX_BYTES);
    hash = rolling_hash(hash, &input.image_bytes[..prefix_len]);

    for field in [input.symbol, input.timeframe].into_iter().flatten() {
        hash = rolling_hash(hash, field.trim().to_lowercase().as_bytes());
    }

    format!("{:016x}-{:x}", hash, input.image_bytes.len())
}

/// djb2-style rolling hash.
fn rolling_hash(seed: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(seed, |h, b| h.wrapping_mul(33).wrapping_add(u64::from(*b)))
}

/// In-memory response cache backed by a DashMap.
pub struct ResponseCache {
    config: RwLock<CacheConfig>,
    entries: DashMap<String, CacheEntry>,
    metrics: Mutex<MetricsState>,
    /// Optional diagnostics sink for eviction/clear events.
    bus: Option<Arc<LiveEventBus>>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseCache {
    /// Creates a response cache.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn new(config: CacheConfig) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            entries: DashMap::new(),
            metrics: Mutex::new(MetricsState::new()),
            bus: None,
            sweep_handle: Mutex::new(None),
        })
    }

    /// Attaches a diagnostics bus; evictions and clears publish events.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<LiveEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Looks up a cached result. A miss is a normal outcome, never an error.
    ///
    /// Expired entries are removed here (lazy expiry); a hit refreshes the
    /// entry's access bookkeeping.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, now_ms())
    }

    /// Stores a result under `key`, evicting least-used entries first when
    /// the cache is full.
    pub fn put(&self, key: &str, value: Value) {
        self.put_at(key, value, now_ms());
    }

    /// Records the outcome of one pipeline request. Called by the request
    /// pipeline, which is the only place that knows the upstream latency.
    pub fn record_metrics(&self, elapsed: Duration, is_error: bool) {
        let mut metrics = self.metrics.lock();
        metrics.request_count += 1;
        metrics.total_response_time_ms += elapsed.as_millis() as u64;
        if is_error {
            metrics.error_count += 1;
        }
    }

    /// Rolling pipeline metrics since the last reset.
    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        let memory = self.memory_usage_bytes();
        let metrics = self.metrics.lock();
        CacheMetrics {
            request_count: metrics.request_count,
            average_response_time_ms: if metrics.request_count == 0 {
                0.0
            } else {
                metrics.total_response_time_ms as f64 / metrics.request_count as f64
            },
            cache_hit_rate: metrics.hit_rate(),
            error_rate: metrics.error_rate(),
            memory_usage_bytes: memory,
            last_reset_ms: metrics.last_reset_ms,
        }
    }

    /// Zeroes the rolling metrics.
    pub fn reset_metrics(&self) {
        *self.metrics.lock() = MetricsState::new();
    }

    /// Live occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let config = self.config.read();
        CacheStats {
            size: self.entries.len(),
            max_size: config.max_entries,
            hit_rate: self.metrics.lock().hit_rate(),
            memory_usage_bytes: self.memory_usage_bytes(),
            enabled: config.enabled,
        }
    }

    /// Classifies cache health from memory usage and error rate.
    #[must_use]
    pub fn health(&self) -> CacheHealth {
        let config = self.config.read();
        let memory = self.memory_usage_bytes();
        let error_rate = self.metrics.lock().error_rate();

        let status = if memory >= config.memory_critical_bytes
            || error_rate >= config.error_rate_critical
        {
            HealthStatus::Unhealthy
        } else if memory >= config.memory_warning_bytes || error_rate >= config.error_rate_warning
        {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        CacheHealth {
            status,
            memory_usage_bytes: memory,
            error_rate,
            entries: self.entries.len(),
        }
    }

    /// Applies a partial runtime configuration update.
    ///
    /// # Errors
    /// Returns error if the patched configuration would be invalid.
    pub fn update_config(&self, patch: CacheConfigPatch) -> Result<(), GovernanceError> {
        let mut candidate = self.config.read().clone();
        if let Some(enabled) = patch.enabled {
            candidate.enabled = enabled;
        }
        if let Some(ttl) = patch.ttl {
            candidate.ttl = ttl;
        }
        if let Some(max_entries) = patch.max_entries {
            candidate.max_entries = max_entries;
        }
        candidate.validate()?;
        *self.config.write() = candidate;
        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        info!("cache cleared, {} entries removed", removed);
        self.publish(
            EventLevel::Info,
            "cache cleared",
            serde_json::json!({ "removed": removed }),
        );
    }

    /// Starts the periodic sweep that drops entries past their TTL.
    ///
    /// Complements lazy read-time expiry; the sweep bounds memory for keys
    /// that are never read again.
    pub fn start_sweep(self: &Arc<Self>) {
        let mut handle = self.sweep_handle.lock();
        if handle.is_some() {
            return;
        }

        let cache = Arc::clone(self);
        let interval = self.config.read().sweep_interval;
        *handle = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await;
            loop {
                tick.tick().await;
                let removed = cache.sweep_expired(now_ms());
                if removed > 0 {
                    debug!("cache sweep removed {} expired entries", removed);
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

    /// Current number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_at(&self, key: &str, now_ms: u64) -> Option<Value> {
        if !self.config.read().enabled {
            self.metrics.lock().misses += 1;
            return None;
        }
        let ttl_ms = self.config.read().ttl.as_millis() as u64;

        let expired = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if now_ms.saturating_sub(entry.created_at_ms) > ttl_ms {
                    true
                } else {
                    entry.access_count += 1;
                    entry.last_accessed_at_ms = now_ms;
                    let value = entry.value.clone();
                    drop(entry);
                    self.metrics.lock().hits += 1;
                    return Some(value);
                }
            }
            None => {
                self.metrics.lock().misses += 1;
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
        }
        self.metrics.lock().misses += 1;
        None
    }

    fn put_at(&self, key: &str, value: Value, now_ms: u64) {
        let (enabled, max_entries) = {
            let config = self.config.read();
            (config.enabled, config.max_entries)
        };
        if !enabled {
            return;
        }

        if self.entries.len() >= max_entries && !self.entries.contains_key(key) {
            self.evict_least_used(max_entries);
        }

        let size_bytes = estimate_size(key, &value);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at_ms: now_ms,
                last_accessed_at_ms: now_ms,
                access_count: 0,
                size_bytes,
            },
        );
    }

    /// Removes the bottom ~20% of entries ordered by access count, then age.
    fn evict_least_used(&self, max_entries: usize) {
        let mut ranked: Vec<(String, u64, u64)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().access_count,
                    entry.value().created_at_ms,
                )
            })
            .collect();
        ranked.sort_by_key(|(_, access_count, created_at_ms)| (*access_count, *created_at_ms));

        let evict_count = (max_entries / EVICTION_DIVISOR).max(1);
        let mut evicted = 0usize;
        for (key, _, _) in ranked.into_iter().take(evict_count) {
            self.entries.remove(&key);
            evicted += 1;
        }

        debug!("cache evicted {} least-used entries", evicted);
        self.publish(
            EventLevel::Debug,
            "cache eviction",
            serde_json::json!({ "evicted": evicted }),
        );
    }

    fn sweep_expired(&self, now_ms: u64) -> usize {
        let ttl_ms = self.config.read().ttl.as_millis() as u64;

        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| now_ms.saturating_sub(entry.value().created_at_ms) > ttl_ms)
            .map(|entry| entry.key().clone())
            .collect();

        let count = stale.len();
        for key in stale {
            self.entries.remove(&key);
        }
        count
    }

    fn memory_usage_bytes(&self) -> u64 {
        self.entries.iter().map(|entry| entry.value().size_bytes).sum()
    }

    fn publish(&self, level: EventLevel, message: &str, details: Value) {
        if let Some(bus) = &self.bus {
            bus.publish(LiveEvent::new(level, "cache", message).with_details(details));
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.len())
            .field("config", &*self.config.read())
            .finish()
    }
}

/// Rough per-entry memory estimate: key plus serialized value length.
fn estimate_size(key: &str, value: &Value) -> u64 {
    let value_len = serde_json::to_string(value).map_or(0, |s| s.len());
    (key.len() + value_len) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(max_entries: usize, ttl_ms: u64) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            max_entries,
            ttl: Duration::from_millis(ttl_ms),
            ..CacheConfig::default()
        })
        .expect("valid config")
    }

    fn input<'a>(prompt: &'a str, image: &'a [u8]) -> FingerprintInput<'a> {
        FingerprintInput {
            prompt,
            image_bytes: image,
            symbol: Some("BTCUSD"),
            timeframe: Some("4h"),
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let image = vec![7u8; 1024];
        let a = fingerprint(&input("Describe the trend", &image));
        let b = fingerprint(&input("Describe the trend", &image));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_normalizes_incidental_formatting() {
        let image = vec![7u8; 1024];
        let a = fingerprint(&input("Describe the trend", &image));
        let b = fingerprint(&input("  describe THE trend  ", &image));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let image = vec![7u8; 1024];
        let base = fingerprint(&input("describe the trend", &image));

        assert_ne!(base, fingerprint(&input("find support levels", &image)));

        let other_image = vec![9u8; 1024];
        assert_ne!(base, fingerprint(&input("describe the trend", &other_image)));

        let longer = vec![7u8; 2048];
        assert_ne!(base, fingerprint(&input("describe the trend", &longer)));

        let mut metadata = input("describe the trend", &image);
        metadata.symbol = Some("ETHUSD");
        assert_ne!(base, fingerprint(&metadata));
    }

    #[test]
    fn test_get_after_put_returns_same_value() {
        let cache = cache(10, 60_000);
        let value = json!({ "trend": "bullish", "confidence": 0.8 });

        cache.put("fp", value.clone());
        assert_eq!(cache.get("fp"), Some(value));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = cache(10, 1000);

        cache.put_at("fp", json!("v"), 0);
        assert_eq!(cache.get_at("fp", 500), Some(json!("v")));
        assert_eq!(cache.get_at("fp", 1001), None);
        // Lazy expiry also removed the entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_keeps_size_bounded() {
        let cache = cache(2, 60_000);

        cache.put_at("a", json!("a"), 0);
        cache.put_at("b", json!("b"), 1);
        // Touch b so a is the least-used entry.
        assert!(cache.get_at("b", 2).is_some());

        cache.put_at("c", json!("c"), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_at("c", 4).is_some());
        assert!(cache.get_at("b", 4).is_some());
        assert!(cache.get_at("a", 4).is_none());
    }

    #[test]
    fn test_eviction_ties_break_by_age() {
        let cache = cache(2, 60_000);

        cache.put_at("old", json!(1), 0);
        cache.put_at("new", json!(2), 10);
        cache.put_at("c", json!(3), 20);

        // Equal access counts: the older entry goes first.
        assert!(cache.get_at("old", 30).is_none());
        assert!(cache.get_at("new", 30).is_some());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = ResponseCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
        .expect("valid config");

        cache.put("fp", json!("v"));
        assert_eq!(cache.get("fp"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let cache = cache(10, 1000);

        cache.put_at("stale", json!(1), 0);
        cache.put_at("fresh", json!(2), 5000);

        assert_eq!(cache.sweep_expired(5000), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("fresh", 5000).is_some());
    }

    #[test]
    fn test_metrics_accumulate_and_reset() {
        let cache = cache(10, 60_000);

        cache.put("fp", json!("v"));
        assert!(cache.get("fp").is_some());
        assert!(cache.get("missing").is_none());

        cache.record_metrics(Duration::from_millis(100), false);
        cache.record_metrics(Duration::from_millis(300), true);

        let metrics = cache.metrics();
        assert_eq!(metrics.request_count, 2);
        assert!((metrics.average_response_time_ms - 200.0).abs() < f64::EPSILON);
        assert!((metrics.cache_hit_rate - 0.5).abs() < f64::EPSILON);
        assert!((metrics.error_rate - 0.5).abs() < f64::EPSILON);

        cache.reset_metrics();
        let metrics = cache.metrics();
        assert_eq!(metrics.request_count, 0);
        assert!(metrics.cache_hit_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_reflect_occupancy() {
        let cache = cache(5, 60_000);
        cache.put("a", json!("payload"));

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 5);
        assert!(stats.enabled);
        assert!(stats.memory_usage_bytes > 0);
    }

    #[test]
    fn test_health_threshold_bands() {
        let cache = ResponseCache::new(CacheConfig {
            error_rate_warning: 0.25,
            error_rate_critical: 0.75,
            ..CacheConfig::default()
        })
        .expect("valid config");

        assert_eq!(cache.health().status, HealthStatus::Healthy);

        cache.record_metrics(Duration::from_millis(10), false);
        cache.record_metrics(Duration::from_millis(10), true);
        assert_eq!(cache.health().status, HealthStatus::Warning);

        cache.record_metrics(Duration::from_millis(10), true);
        cache.record_metrics(Duration::from_millis(10), true);
        assert_eq!(cache.health().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_update_config_applies_and_validates() {
        let cache = cache(10, 60_000);

        cache
            .update_config(CacheConfigPatch {
                enabled: Some(false),
                ..CacheConfigPatch::default()
            })
            .expect("valid patch");
        assert!(!cache.stats().enabled);

        let invalid = cache.update_config(CacheConfigPatch {
            ttl: Some(Duration::ZERO),
            ..CacheConfigPatch::default()
        });
        assert!(invalid.is_err());
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = cache(10, 60_000);
        cache.put("a", json!(1));
        cache.put("b", json!(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(
            ResponseCache::new(CacheConfig {
                ttl: Duration::ZERO,
                ..CacheConfig::default()
            })
            .is_err()
        );
        assert!(
            ResponseCache::new(CacheConfig {
                max_entries: 0,
                ..CacheConfig::default()
            })
            .is_err()
        );
        assert!(
            ResponseCache::new(CacheConfig {
                memory_warning_bytes: 100,
                memory_critical_bytes: 100,
                ..CacheConfig::default()
            })
            .is_err()
        );
    }
}
