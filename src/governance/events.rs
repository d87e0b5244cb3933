//! Bounded live event bus for diagnostics.
//!
//! Keeps a ring buffer of the most recent diagnostic events and fans each
//! published event out to attached subscribers. The buffer backs backlog
//! replay for late subscribers; fan-out isolates subscriber failures so one
//! misbehaving observer cannot break delivery to the rest.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default number of events retained in the ring buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 200;

/// Default interval between keep-alive ticks while subscribers are attached.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Severity level of a live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Informational event.
    Info,
    /// Warning event.
    Warning,
    /// Error event.
    Error,
    /// Debug/trace event.
    Debug,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// A diagnostic event. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LiveEvent {
    /// Unique event identifier.
    pub id: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Severity level.
    pub level: EventLevel,
    /// Human-readable message.
    pub message: String,
    /// Component that emitted the event.
    pub source: String,
    /// Optional structured payload.
    #[serde(default)]
    pub details: Value,
}

impl LiveEvent {
    /// Creates an event with a fresh id and current timestamp.
    #[must_use]
    pub fn new(level: EventLevel, source: &str, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            level,
            message: message.into(),
            source: source.to_string(),
            details: Value::Null,
        }
    }

    /// Attaches a structured payload to the event.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Callback invoked for every published event.
pub type EventHandler = Box<dyn Fn(&LiveEvent) + Send + Sync>;

/// Bounded publish/subscribe event bus.
///
/// All stores are lock-protected; `publish` serializes append and fan-out so
/// every subscriber observes events in publish order. Handlers must not
/// publish back into the bus.
pub struct LiveEventBus {
    /// Maximum number of buffered events.
    capacity: usize,
    /// Keep-alive tick interval.
    keepalive_interval: Duration,
    /// Ring buffer of the most recent events, oldest first.
    buffer: Mutex<VecDeque<LiveEvent>>,
    /// Attached subscriber callbacks.
    subscribers: DashMap<u64, EventHandler>,
    /// Next subscription identifier.
    next_sub_id: AtomicU64,
    /// Serializes append + fan-out, and snapshot + attach.
    publish_lock: Mutex<()>,
    /// Keep-alive ticker task, present only while subscribers are attached.
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LiveEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEventBus")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffer.lock().len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for LiveEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_KEEPALIVE_INTERVAL)
    }
}

impl LiveEventBus {
    /// Creates a bus retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize, keepalive_interval: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            keepalive_interval,
            buffer: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            subscribers: DashMap::new(),
            next_sub_id: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
            ticker: Mutex::new(None),
        }
    }

    /// Publishes an event: normalizes missing fields, appends it to the ring
    /// buffer (dropping the oldest at capacity) and fans it out to every
    /// attached subscriber.
    ///
    /// A panicking subscriber is caught and logged; delivery continues to the
    /// remaining subscribers.
    pub fn publish(&self, event: LiveEvent) {
        let event = Self::normalize(event);

        let _guard = self.publish_lock.lock();
        {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }

        for entry in self.subscribers.iter() {
            let handler = entry.value();
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(
                    subscription = *entry.key(),
                    "live event subscriber panicked; dropping its delivery"
                );
            }
        }
    }

    /// Fills in defaults for any missing event fields.
    fn normalize(mut event: LiveEvent) -> LiveEvent {
        if event.id.is_empty() {
            event.id = Uuid::new_v4().to_string();
        }
        if event.timestamp.is_empty() {
            event.timestamp = Utc::now().to_rfc3339();
        }
        if event.source.is_empty() {
            event.source = "system".to_string();
        }
        event
    }

    /// Registers a subscriber callback for every future publish.
    ///
    /// Starts the keep-alive ticker when the first subscriber attaches.
    pub fn subscribe(self: &Arc<Self>, handler: EventHandler) -> EventSubscription {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, handler);
        self.start_ticker_if_needed();

        EventSubscription {
            bus: Arc::clone(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Atomically snapshots the current backlog and attaches a subscriber.
    ///
    /// No event published after the snapshot can be missed by the new
    /// subscriber, and none can appear in both the snapshot and the live
    /// delivery.
    pub fn subscribe_with_backlog(
        self: &Arc<Self>,
        handler: EventHandler,
    ) -> (Vec<LiveEvent>, EventSubscription) {
        let backlog;
        let id;
        {
            let _guard = self.publish_lock.lock();
            backlog = self.buffer.lock().iter().cloned().collect();
            id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
            self.subscribers.insert(id, handler);
        }
        self.start_ticker_if_needed();

        (
            backlog,
            EventSubscription {
                bus: Arc::clone(self),
                id,
                active: AtomicBool::new(true),
            },
        )
    }

    /// Returns the buffered events, oldest first.
    #[must_use]
    pub fn recent_events(&self) -> Vec<LiveEvent> {
        self.buffer.lock().iter().cloned().collect()
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the keep-alive ticker is currently running.
    #[must_use]
    pub fn keepalive_active(&self) -> bool {
        self.ticker.lock().is_some()
    }

    /// Stops the keep-alive ticker and detaches all subscribers.
    pub fn shutdown(&self) {
        self.subscribers.clear();
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    fn start_ticker_if_needed(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() || self.subscribers.is_empty() {
            return;
        }

        let bus = Arc::clone(self);
        let interval = self.keepalive_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                bus.publish(
                    LiveEvent::new(EventLevel::Debug, "event-bus", "keep-alive").with_details(
                        serde_json::json!({ "epoch_ms": Utc::now().timestamp_millis() }),
                    ),
                );
            }
        }));
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers.remove(&id);
        if self.subscribers.is_empty()
            && let Some(handle) = self.ticker.lock().take()
        {
            handle.abort();
        }
    }
}

/// Handle to an active subscription. Unsubscribes on drop.
pub struct EventSubscription {
    bus: Arc<LiveEventBus>,
    id: u64,
    active: AtomicBool,
}

impl EventSubscription {
    /// Detaches the subscriber. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.bus.remove_subscriber(self.id);
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
