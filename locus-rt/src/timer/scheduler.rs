// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

// Layer 3: Internal module imports
use super::clock::Clock;
use crate::message::Envelope;
use crate::util::Address;

/// Timer error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// `advance_time` called while running on a monotonic clock
    #[error("time can only be advanced on a virtual clock")]
    NotVirtual,
}

/// Future returned by the delivery sink.
pub type DeliveryFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Sink the scheduler hands due envelopes to (the system's send path).
pub type DeliverySink = Arc<dyn Fn(Address, Envelope) -> DeliveryFuture + Send + Sync>;

/// One scheduled delivery, visible through [`Scheduler::scheduled`].
#[derive(Debug, Clone)]
pub struct ScheduledEntry {
    /// Entry id (caller-supplied or generated)
    pub id: String,

    /// Target actor
    pub target: Address,

    /// Envelope to deliver
    pub envelope: Envelope,

    /// Absolute deadline in scheduler milliseconds
    pub deadline_ms: u64,

    seq: u64,
}

struct SchedulerInner {
    clock: Clock,
    queue: Mutex<Vec<ScheduledEntry>>,
    next_seq: AtomicU64,
    notify: Notify,
    sink: DeliverySink,
}

/// Timer actor: scheduled envelope delivery decoupled from wall time.
///
/// Entries are ordered by `(deadline, insertion order)`, so two entries
/// with equal deadlines deliver in the order they were scheduled.
/// Scheduling under an existing id replaces the previous entry.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler delivering through `sink` on the given clock.
    pub fn new(clock: Clock, sink: DeliverySink) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                clock,
                queue: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(0),
                notify: Notify::new(),
                sink,
            }),
        }
    }

    /// The scheduler's clock.
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Schedule `envelope` for delivery to `target` after `delay`.
    ///
    /// Returns the entry id. Supplying an id that is already scheduled
    /// replaces the previous entry.
    pub fn schedule(
        &self,
        target: Address,
        envelope: Envelope,
        delay: Duration,
        id: Option<String>,
    ) -> String {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let deadline_ms = self.inner.clock.now_ms() + delay.as_millis() as u64;
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        {
            let mut queue = self.inner.queue.lock();
            queue.retain(|entry| entry.id != id);
            queue.push(ScheduledEntry {
                id: id.clone(),
                target,
                envelope,
                deadline_ms,
                seq,
            });
        }
        debug!(id = %id, deadline_ms, "timer scheduled");
        self.inner.notify.notify_one();
        id
    }

    /// Cancel a scheduled entry. Returns whether it existed.
    pub fn cancel(&self, id: &str) -> bool {
        let mut queue = self.inner.queue.lock();
        let before = queue.len();
        queue.retain(|entry| entry.id != id);
        let cancelled = queue.len() != before;
        drop(queue);
        if cancelled {
            self.inner.notify.notify_one();
        }
        cancelled
    }

    /// Cancel every entry targeting `address` (called when an actor stops).
    /// Returns how many were cancelled.
    pub fn cancel_for(&self, address: &Address) -> usize {
        let mut queue = self.inner.queue.lock();
        let before = queue.len();
        queue.retain(|entry| &entry.target != address);
        before - queue.len()
    }

    /// Snapshot of pending entries, soonest first.
    pub fn scheduled(&self) -> Vec<ScheduledEntry> {
        let mut entries = self.inner.queue.lock().clone();
        entries.sort_by_key(|entry| (entry.deadline_ms, entry.seq));
        entries
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance the virtual clock by `ms` and deliver everything now due,
    /// in deadline-then-insertion order.
    ///
    /// # Errors
    ///
    /// [`TimerError::NotVirtual`] on a monotonic clock.
    pub async fn advance_time(&self, ms: u64) -> Result<usize, TimerError> {
        self.inner
            .clock
            .advance(ms)
            .map_err(|_| TimerError::NotVirtual)?;
        Ok(self.deliver_due().await)
    }

    /// Set the virtual clock to at least `ms` and deliver everything due.
    ///
    /// # Errors
    ///
    /// [`TimerError::NotVirtual`] on a monotonic clock.
    pub async fn flush_with_time(&self, ms: u64) -> Result<usize, TimerError> {
        let now = self.inner.clock.now_ms();
        let delta = ms.saturating_sub(now);
        self.advance_time(delta).await
    }

    /// Pop and deliver all entries whose deadline has passed.
    async fn deliver_due(&self) -> usize {
        let now = self.inner.clock.now_ms();
        let mut due: Vec<ScheduledEntry> = {
            let mut queue = self.inner.queue.lock();
            let (ready, pending): (Vec<_>, Vec<_>) =
                queue.drain(..).partition(|entry| entry.deadline_ms <= now);
            *queue = pending;
            ready
        };
        due.sort_by_key(|entry| (entry.deadline_ms, entry.seq));

        let delivered = due.len();
        for entry in due {
            debug!(id = %entry.id, target = %entry.target, "timer delivery");
            (self.inner.sink)(entry.target, entry.envelope).await;
        }
        delivered
    }

    /// Spawn the production delivery loop on the current tokio runtime.
    ///
    /// Sleeps until the earliest deadline (or until woken by a schedule or
    /// cancel), then delivers everything due. The system aborts the task on
    /// stop. Only meaningful on a monotonic clock; with a virtual clock the
    /// loop just parks until woken and nothing comes due on its own.
    pub fn spawn_delivery_task(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let next_deadline = scheduler
                    .inner
                    .queue
                    .lock()
                    .iter()
                    .map(|entry| entry.deadline_ms)
                    .min();

                match next_deadline {
                    None => scheduler.inner.notify.notified().await,
                    Some(deadline_ms) => {
                        let now = scheduler.inner.clock.now_ms();
                        if deadline_ms > now {
                            let wait = Duration::from_millis(deadline_ms - now);
                            tokio::select! {
                                _ = tokio::time::sleep(wait) => {}
                                _ = scheduler.inner.notify.notified() => continue,
                            }
                        }
                        scheduler.deliver_due().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn addr(id: &str) -> Address {
        Address::new("local", "worker", id).unwrap()
    }

    /// Sink capturing (target id, envelope kind) pairs.
    fn capture_sink() -> (DeliverySink, Arc<PlMutex<Vec<(String, String)>>>) {
        let seen: Arc<PlMutex<Vec<(String, String)>>> = Arc::new(PlMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: DeliverySink = Arc::new(move |target: Address, envelope: Envelope| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                seen.lock().push((target.id().to_string(), envelope.kind().to_string()));
            })
        });
        (sink, seen)
    }

    fn virtual_scheduler() -> (Scheduler, Arc<PlMutex<Vec<(String, String)>>>) {
        let (sink, seen) = capture_sink();
        (Scheduler::new(Clock::virtual_clock(), sink), seen)
    }

    #[tokio::test]
    async fn test_advance_time_delivers_due_entries() {
        let (scheduler, seen) = virtual_scheduler();

        scheduler.schedule(addr("w"), Envelope::new("MSG_50"), Duration::from_millis(50), None);
        scheduler.schedule(addr("w"), Envelope::new("MSG_100"), Duration::from_millis(100), None);
        scheduler.schedule(addr("w"), Envelope::new("MSG_200"), Duration::from_millis(200), None);

        scheduler.advance_time(50).await.unwrap();
        assert_eq!(
            seen.lock().iter().map(|(_, k)| k.clone()).collect::<Vec<_>>(),
            vec!["MSG_50"]
        );

        scheduler.advance_time(50).await.unwrap();
        assert_eq!(
            seen.lock().iter().map(|(_, k)| k.clone()).collect::<Vec<_>>(),
            vec!["MSG_50", "MSG_100"]
        );

        scheduler.advance_time(100).await.unwrap();
        assert_eq!(
            seen.lock().iter().map(|(_, k)| k.clone()).collect::<Vec<_>>(),
            vec!["MSG_50", "MSG_100", "MSG_200"]
        );
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_equal_deadlines_deliver_in_insertion_order() {
        let (scheduler, seen) = virtual_scheduler();

        scheduler.schedule(addr("w"), Envelope::new("FIRST"), Duration::from_millis(10), None);
        scheduler.schedule(addr("w"), Envelope::new("SECOND"), Duration::from_millis(10), None);
        scheduler.schedule(addr("w"), Envelope::new("THIRD"), Duration::from_millis(10), None);

        scheduler.advance_time(10).await.unwrap();

        assert_eq!(
            seen.lock().iter().map(|(_, k)| k.clone()).collect::<Vec<_>>(),
            vec!["FIRST", "SECOND", "THIRD"]
        );
    }

    #[tokio::test]
    async fn test_cancel_removes_entry() {
        let (scheduler, seen) = virtual_scheduler();

        let id = scheduler.schedule(addr("w"), Envelope::new("MSG"), Duration::from_millis(10), None);
        assert!(scheduler.cancel(&id));
        assert!(!scheduler.cancel(&id));

        scheduler.advance_time(20).await.unwrap();
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_with_same_id_replaces() {
        let (scheduler, seen) = virtual_scheduler();

        scheduler.schedule(
            addr("w"),
            Envelope::new("OLD"),
            Duration::from_millis(10),
            Some("tick".into()),
        );
        scheduler.schedule(
            addr("w"),
            Envelope::new("NEW"),
            Duration::from_millis(10),
            Some("tick".into()),
        );

        assert_eq!(scheduler.len(), 1);
        scheduler.advance_time(10).await.unwrap();
        assert_eq!(
            seen.lock().iter().map(|(_, k)| k.clone()).collect::<Vec<_>>(),
            vec!["NEW"]
        );
    }

    #[tokio::test]
    async fn test_cancel_for_target() {
        let (scheduler, _seen) = virtual_scheduler();

        scheduler.schedule(addr("a"), Envelope::new("M1"), Duration::from_millis(10), None);
        scheduler.schedule(addr("a"), Envelope::new("M2"), Duration::from_millis(20), None);
        scheduler.schedule(addr("b"), Envelope::new("M3"), Duration::from_millis(30), None);

        assert_eq!(scheduler.cancel_for(&addr("a")), 2);
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_snapshot_sorted() {
        let (scheduler, _seen) = virtual_scheduler();

        scheduler.schedule(addr("w"), Envelope::new("LATE"), Duration::from_millis(100), None);
        scheduler.schedule(addr("w"), Envelope::new("SOON"), Duration::from_millis(10), None);

        let entries = scheduler.scheduled();
        assert_eq!(entries[0].envelope.kind(), "SOON");
        assert_eq!(entries[1].envelope.kind(), "LATE");
    }

    #[tokio::test]
    async fn test_advance_rejected_on_monotonic_clock() {
        let (sink, _seen) = capture_sink();
        let scheduler = Scheduler::new(Clock::monotonic(), sink);

        assert_eq!(scheduler.advance_time(10).await, Err(TimerError::NotVirtual));
    }

    #[tokio::test]
    async fn test_flush_with_time_is_absolute() {
        let (scheduler, seen) = virtual_scheduler();

        scheduler.schedule(addr("w"), Envelope::new("A"), Duration::from_millis(40), None);
        scheduler.flush_with_time(100).await.unwrap();

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(scheduler.clock().now_ms(), 100);

        // Flushing to a time already passed advances nothing.
        scheduler.flush_with_time(50).await.unwrap();
        assert_eq!(scheduler.clock().now_ms(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_delivery_task() {
        let (sink, seen) = capture_sink();
        let scheduler = Scheduler::new(Clock::monotonic(), sink);
        let handle = scheduler.spawn_delivery_task();

        scheduler.schedule(addr("w"), Envelope::new("TICK"), Duration::from_millis(50), None);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(seen.lock().len(), 1);

        handle.abort();
    }
}
