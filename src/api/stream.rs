//! Server-sent events endpoint for live diagnostics.
//!
//! Connection lifecycle: on open the client receives a `: connected` comment,
//! then the full event backlog in publish order, then live events as they are
//! published. A `: heartbeat <epoch-ms>` comment is written periodically to
//! defeat idle-connection timeouts in intermediary proxies. Cleanup
//! (unsubscribe + heartbeat cancel) runs exactly once when the client
//! disconnects or a write fails.

use crate::governance::{EventSubscription, LiveEvent};
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use chrono::Utc;
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Per-connection frame buffer depth. A stalled client drops frames once the
/// channel is full instead of growing it without bound.
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Sends a frame if the channel has room; a full channel drops the frame.
fn try_send(tx: &mpsc::Sender<Event>, event: Event) {
    let _ = tx.clone().try_send(event);
}

/// Formats the heartbeat comment payload.
fn heartbeat_comment() -> String {
    format!("heartbeat {}", Utc::now().timestamp_millis())
}

/// Serializes a live event into an SSE data frame.
fn event_frame(event: &LiveEvent) -> Option<Event> {
    serde_json::to_string(event)
        .ok()
        .map(|json| Event::default().data(json))
}

/// Preserves publish order across the backlog/live handoff.
///
/// Live events delivered before the backlog has been written are parked;
/// `open` writes the backlog, flushes the parked events, and switches to
/// direct delivery. The client therefore observes every event exactly once,
/// in publish order.
struct OrderingGate {
    sink: Box<dyn Fn(&LiveEvent) + Send + Sync>,
    parked: Mutex<Option<Vec<LiveEvent>>>,
}

impl OrderingGate {
    fn new(sink: Box<dyn Fn(&LiveEvent) + Send + Sync>) -> Self {
        Self {
            sink,
            parked: Mutex::new(Some(Vec::new())),
        }
    }

    /// Delivery path for the live bus subscription.
    fn deliver(&self, event: &LiveEvent) {
        let mut parked = self.parked.lock();
        match parked.as_mut() {
            Some(pending) => pending.push(event.clone()),
            None => (self.sink)(event),
        }
    }

    /// Writes the backlog, then anything parked while it was being written,
    /// then opens the gate for direct delivery.
    fn open(&self, backlog: &[LiveEvent]) {
        for event in backlog {
            (self.sink)(event);
        }
        let mut parked = self.parked.lock();
        if let Some(pending) = parked.take() {
            for event in &pending {
                (self.sink)(event);
            }
        }
    }
}

/// Owns the per-connection resources; dropping it runs cleanup exactly once.
struct StreamGuard {
    subscription: EventSubscription,
    heartbeat: JoinHandle<()>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        self.heartbeat.abort();
        debug!("event stream client disconnected");
    }
}

/// Live event streaming endpoint.
#[utoipa::path(
    get,
    path = "/api/v1/events/stream",
    responses(
        (status = 200, description = "Server-sent event stream of diagnostic events")
    ),
    tag = "Events"
)]
pub async fn stream_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<Event>(STREAM_CHANNEL_CAPACITY);

    try_send(&tx, Event::default().comment("connected"));

    let frame_tx = tx.clone();
    let gate = Arc::new(OrderingGate::new(Box::new(move |event| {
        if let Some(frame) = event_frame(event) {
            try_send(&frame_tx, frame);
        }
    })));

    let live_gate = Arc::clone(&gate);
    let (backlog, subscription) = state
        .events
        .subscribe_with_backlog(Box::new(move |event| live_gate.deliver(event)));
    gate.open(&backlog);

    let heartbeat_tx = tx.clone();
    let interval = Duration::from_secs(state.config.events.heartbeat_interval_secs);
    let heartbeat = tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            match heartbeat_tx
                .clone()
                .try_send(Event::default().comment(heartbeat_comment()))
            {
                Err(e) if e.is_disconnected() => break,
                // A full channel skips the heartbeat; the client is stalled.
                _ => {}
            }
        }
    });

    let guard = StreamGuard {
        subscription,
        heartbeat,
    };

    let stream = rx.map(move |event| {
        let _connection = &guard;
        Ok::<Event, Infallible>(event)
    });

    (
        [
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
            ("X-Accel-Buffering", "no"),
        ],
        Sse::new(stream),
    )
}
