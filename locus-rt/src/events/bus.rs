// Layer 1: Standard library imports
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::warn;

// Layer 3: Internal module imports
use crate::message::DomainEvent;

/// Subscription key matching every emitted event.
pub const EMIT_WILDCARD: &str = "EMIT:*";

/// Listener invoked for each matching emitted event.
pub type EventListener = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Event bus error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus was destroyed; no further operations are accepted
    #[error("Event bus is destroyed")]
    Destroyed,

    /// Subscription key was neither `EMIT:*` nor an `EMIT:`-prefixed type
    #[error("Subscription key must start with 'EMIT:': {0}")]
    InvalidKey(String),
}

struct ListenerEntry {
    id: u64,
    listener: EventListener,
}

struct BusInner {
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,
    destroyed: AtomicBool,
    next_id: AtomicU64,
}

/// Per-actor event bus with snapshot dispatch.
///
/// `emit` snapshots the matching listener set before invoking anything, so
/// subscribing or unsubscribing *during* an emission never affects that
/// emission. A panicking listener is caught, logged, and does not interrupt
/// the remaining listeners.
///
/// # Example
/// ```rust
/// use locus_rt::events::{EventBus, EMIT_WILDCARD};
/// use locus_rt::message::DomainEvent;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// let bus = EventBus::new();
/// let hits = Arc::new(AtomicU64::new(0));
///
/// let counter = Arc::clone(&hits);
/// let sub = bus
///     .subscribe(EMIT_WILDCARD, Arc::new(move |_| {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }))
///     .unwrap();
///
/// bus.emit(&DomainEvent::new("PING")).unwrap();
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
///
/// sub.unsubscribe();
/// bus.emit(&DomainEvent::new("PING")).unwrap();
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to
/// remove the listener. Dropping the handle keeps the subscription alive
/// (subscriptions are cleared when the owning actor stops).
pub struct Subscription {
    bus: Weak<BusInner>,
    key: String,
    id: u64,
}

impl Subscription {
    /// Remove the listener from the bus.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut listeners = inner.listeners.lock();
            if let Some(entries) = listeners.get_mut(&self.key) {
                entries.retain(|e| e.id != self.id);
                if entries.is_empty() {
                    listeners.remove(&self.key);
                }
            }
        }
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(HashMap::new()),
                destroyed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscription key for a concrete event type.
    pub fn key_for(kind: &str) -> String {
        format!("EMIT:{kind}")
    }

    /// Subscribe a listener under `EMIT:*` or `EMIT:{TYPE}`.
    ///
    /// # Errors
    ///
    /// [`BusError::Destroyed`] after `destroy`, [`BusError::InvalidKey`] for
    /// keys outside the `EMIT:` namespace.
    pub fn subscribe(&self, key: &str, listener: EventListener) -> Result<Subscription, BusError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(BusError::Destroyed);
        }
        if !key.starts_with("EMIT:") || key.len() <= "EMIT:".len() {
            return Err(BusError::InvalidKey(key.to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(ListenerEntry { id, listener });

        Ok(Subscription {
            bus: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        })
    }

    /// Emit an event to all subscribers of its type and of the wildcard.
    ///
    /// Returns the number of listeners invoked.
    ///
    /// # Errors
    ///
    /// [`BusError::Destroyed`] after `destroy`.
    pub fn emit(&self, event: &DomainEvent) -> Result<usize, BusError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(BusError::Destroyed);
        }

        // Snapshot under the lock, dispatch outside it.
        let snapshot: Vec<EventListener> = {
            let listeners = self.inner.listeners.lock();
            let typed = listeners.get(&Self::key_for(event.kind()));
            let wildcard = listeners.get(EMIT_WILDCARD);
            typed
                .into_iter()
                .flatten()
                .chain(wildcard.into_iter().flatten())
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };

        let delivered = snapshot.len();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(event = event.kind(), "event listener panicked; isolated");
            }
        }
        Ok(delivered)
    }

    /// Total number of subscribed listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().values().map(Vec::len).sum()
    }

    /// Clear all subscribers and refuse further operations.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.listeners.lock().clear();
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> EventListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn test_typed_subscription_matches_only_its_type() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = bus.subscribe("EMIT:PING", counting_listener(&hits)).unwrap();

        bus.emit(&DomainEvent::new("PING")).unwrap();
        bus.emit(&DomainEvent::new("PONG")).unwrap();

        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = bus.subscribe(EMIT_WILDCARD, counting_listener(&hits)).unwrap();

        bus.emit(&DomainEvent::new("PING")).unwrap();
        bus.emit(&DomainEvent::new("PONG")).unwrap();

        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = bus.subscribe("EMIT:PING", counting_listener(&hits)).unwrap();

        sub.unsubscribe();
        bus.emit(&DomainEvent::new("PING")).unwrap();

        assert_eq!(hits.load(Ordering::Relaxed), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let bus = EventBus::new();
        let result = bus.subscribe("PING", Arc::new(|_| {}));
        assert!(matches!(result, Err(BusError::InvalidKey(_))));

        let result = bus.subscribe("EMIT:", Arc::new(|_| {}));
        assert!(matches!(result, Err(BusError::InvalidKey(_))));
    }

    #[test]
    fn test_destroy_clears_and_refuses() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = bus.subscribe(EMIT_WILDCARD, counting_listener(&hits)).unwrap();

        bus.destroy();

        assert!(bus.is_destroyed());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.emit(&DomainEvent::new("PING")), Err(BusError::Destroyed));
        assert!(matches!(
            bus.subscribe(EMIT_WILDCARD, Arc::new(|_| {})),
            Err(BusError::Destroyed)
        ));
    }

    #[test]
    fn test_subscribe_during_emit_does_not_affect_that_emit() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        // The first listener subscribes a second one while handling the
        // event; the snapshot means the second never sees this emission.
        let bus_clone = bus.clone();
        let hits_clone = Arc::clone(&hits);
        let _sub = bus
            .subscribe(
                EMIT_WILDCARD,
                Arc::new(move |_| {
                    let _ = bus_clone.subscribe(EMIT_WILDCARD, counting_listener(&hits_clone));
                }),
            )
            .unwrap();

        bus.emit(&DomainEvent::new("FIRST")).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        bus.emit(&DomainEvent::new("SECOND")).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = bus
            .subscribe(EMIT_WILDCARD, Arc::new(|_| panic!("listener bug")))
            .unwrap();
        let _good = bus.subscribe(EMIT_WILDCARD, counting_listener(&hits)).unwrap();

        let delivered = bus.emit(&DomainEvent::new("PING")).unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_emit_returns_delivered_count() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = bus.subscribe("EMIT:PING", counting_listener(&hits)).unwrap();
        let _b = bus.subscribe(EMIT_WILDCARD, counting_listener(&hits)).unwrap();

        assert_eq!(bus.emit(&DomainEvent::new("PING")).unwrap(), 2);
        assert_eq!(bus.emit(&DomainEvent::new("OTHER")).unwrap(), 1);
    }
}
