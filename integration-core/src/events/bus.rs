//! A topic-based publish/subscribe bus with exact and single-level wildcard
//! matching, synchronous and asynchronous dispatch, and per-handler panic
//! isolation.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{trace, warn};
use uuid::Uuid;

/// A time-ordered identifier handed out on subscribe. Never recycled within
/// a bus instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// A published event: the topic it landed on, an arbitrary JSON payload, and
/// the bus's own delivery timestamp (milliseconds since the Unix epoch).
/// Callers never set this themselves — [`EventBus::publish`] and
/// [`EventBus::publish_async`] stamp it at dispatch time, so every record
/// gets one regardless of which caller published it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
}

impl EventRecord {
    fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub type Handler = Arc<dyn Fn(&EventRecord) + Send + Sync>;

#[derive(Clone)]
enum Pattern {
    Exact(String),
    /// Stored without the trailing `.*`; matches `<prefix>.<anything>`.
    Wildcard(String),
}

impl Pattern {
    fn parse(topic_pattern: &str) -> Self {
        match topic_pattern.strip_suffix(".*") {
            Some(prefix) => Pattern::Wildcard(prefix.to_string()),
            None => Pattern::Exact(topic_pattern.to_string()),
        }
    }

    fn matches(&self, topic: &str) -> bool {
        match self {
            Pattern::Exact(pattern) => pattern == topic,
            Pattern::Wildcard(prefix) => topic
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|rest| !rest.is_empty()),
        }
    }
}

struct Subscription {
    pattern: Pattern,
    handler: Handler,
}

/// A capability trait for "somewhere to announce that something happened",
/// decoupling subsystems from the concrete [`EventBus`] and its subscription
/// machinery.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: serde_json::Value);
}

/// Topic-based event bus. Opens running; [`EventBus::close`] is idempotent
/// and, once it has run, makes subscribe a no-op and publish a silent drop.
pub struct EventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Registers `handler` against `topic_pattern` (an exact topic or a
    /// `prefix.*` wildcard). Returns an unregistered id, matching nothing,
    /// if the bus is already closed.
    pub async fn subscribe(
        &self,
        topic_pattern: impl Into<String>,
        handler: impl Fn(&EventRecord) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        if self.is_closed() {
            return id;
        }
        let pattern = Pattern::parse(&topic_pattern.into());
        let mut subs = self.subscriptions.write().await;
        subs.insert(
            id,
            Subscription {
                pattern,
                handler: Arc::new(handler),
            },
        );
        id
    }

    /// Idempotent: returns `false` if `id` was never registered or was
    /// already removed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.write().await.remove(&id).is_some()
    }

    /// Invokes every matching handler synchronously, in an unspecified
    /// order. A panic in one handler is caught and logged; it neither
    /// propagates nor blocks the remaining handlers.
    pub async fn publish(&self, topic: &str, payload: serde_json::Value) {
        if self.is_closed() {
            trace!(topic, "publish on closed bus dropped");
            return;
        }
        let record = EventRecord::new(topic, payload);
        let subs = self.subscriptions.read().await;
        for sub in subs.values().filter(|sub| sub.pattern.matches(topic)) {
            let handler = Arc::clone(&sub.handler);
            let record = record.clone();
            if let Err(panic) =
                std::panic::catch_unwind(AssertUnwindSafe(|| handler(&record)))
            {
                warn!(topic, ?panic, "event handler panicked");
            }
        }
    }

    /// Schedules each matching handler on its own task, guarded identically
    /// to [`EventBus::publish`]. Does not wait for handlers to finish.
    pub async fn publish_async(&self, topic: &str, payload: serde_json::Value) {
        if self.is_closed() {
            trace!(topic, "publish_async on closed bus dropped");
            return;
        }
        let record = EventRecord::new(topic, payload);
        let subs = self.subscriptions.read().await;
        for sub in subs.values().filter(|sub| sub.pattern.matches(topic)) {
            let handler = Arc::clone(&sub.handler);
            let record = record.clone();
            let topic_label = record.topic.clone();
            crate::coordination::spawn_guarded(
                format!("event-handler:{topic_label}"),
                async move { handler(&record) },
                None,
            );
        }
    }

    /// Clears all subscription tables. Idempotent. Deliveries already in
    /// flight from `publish_async` may still complete, observing an empty
    /// table for any further matching.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscriptions.write().await.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// `EventPublisher::publish` is synchronous by contract so feature
// subsystems can "announce this happened" without awaiting, while the bus
// itself is lock-guarded behind an async `RwLock`. Implementing the trait
// for `Arc<EventBus>` rather than `EventBus` lets the impl clone a handle
// and hand the actual dispatch to a spawned task.
impl EventPublisher for Arc<EventBus> {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        let bus = Arc::clone(self);
        let topic = topic.to_string();
        tokio::spawn(async move {
            bus.publish(&topic, payload).await;
        });
    }
}
