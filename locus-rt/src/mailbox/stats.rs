//! Lock-free mailbox statistics.
//!
//! Counters use relaxed atomics; the queue size is derived from the
//! enqueued/dequeued difference, mirroring how the channel itself tracks
//! occupancy.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

// Layer 3: Internal module imports
// (none)

/// Atomic counters shared between a mailbox and its senders.
#[derive(Debug, Default)]
pub struct MailboxStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
}

impl MailboxStats {
    /// Create a stats recorder with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        *self.last_message_at.write() = Some(Utc::now());
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Total envelopes accepted into the queue.
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total envelopes handed to the actor.
    pub fn dequeued_count(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Total envelopes dropped by the `Drop` overflow policy.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Total sends rejected by the `Fail` overflow policy.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Envelopes currently queued (enqueued minus dequeued).
    pub fn size(&self) -> usize {
        self.enqueued_count().saturating_sub(self.dequeued_count()) as usize
    }

    /// Timestamp of the last dequeue, if any.
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        *self.last_message_at.read()
    }

    /// Take a point-in-time snapshot, computing utilisation against the
    /// given capacity.
    pub fn snapshot(&self, capacity: usize) -> MailboxStatsSnapshot {
        let size = self.size();
        MailboxStatsSnapshot {
            enqueued: self.enqueued_count(),
            dequeued: self.dequeued_count(),
            dropped: self.dropped_count(),
            rejected: self.rejected_count(),
            size,
            capacity,
            utilization: if capacity == 0 {
                0.0
            } else {
                size as f64 / capacity as f64
            },
        }
    }
}

/// Read-only snapshot of mailbox statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailboxStatsSnapshot {
    /// Total envelopes accepted into the queue
    pub enqueued: u64,
    /// Total envelopes handed to the actor
    pub dequeued: u64,
    /// Total envelopes dropped (Drop policy)
    pub dropped: u64,
    /// Total sends rejected (Fail policy)
    pub rejected: u64,
    /// Current queue occupancy
    pub size: usize,
    /// Configured capacity
    pub capacity: usize,
    /// size / capacity
    pub utilization: f64,
}
