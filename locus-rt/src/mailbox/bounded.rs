// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::overflow::{MailboxConfig, MailboxError, Overflow};
use super::stats::{MailboxStats, MailboxStatsSnapshot};
use crate::message::Envelope;

/// Receiving half of a bounded mailbox, owned by exactly one actor.
///
/// Built on a tokio mpsc channel so FIFO order per producer is a channel
/// guarantee and parked senders resume as capacity frees.
///
/// # Example
/// ```rust
/// use locus_rt::mailbox::{Mailbox, MailboxConfig, Overflow};
/// use locus_rt::message::Envelope;
///
/// # async fn example() {
/// let (mut mailbox, sender) = Mailbox::open(MailboxConfig::new(16, Overflow::Fail)).unwrap();
/// sender.enqueue(Envelope::new("PING")).await.unwrap();
/// let env = mailbox.recv().await.unwrap();
/// assert_eq!(env.kind(), "PING");
/// # }
/// ```
pub struct Mailbox {
    receiver: mpsc::Receiver<Envelope>,
    capacity: usize,
    stats: Arc<MailboxStats>,
}

/// Cloneable sending half of a bounded mailbox.
#[derive(Clone)]
pub struct MailboxSender {
    sender: mpsc::Sender<Envelope>,
    overflow: Overflow,
    capacity: usize,
    stats: Arc<MailboxStats>,
}

impl Mailbox {
    /// Open a mailbox with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::InvalidCapacity`] when capacity is zero.
    pub fn open(config: MailboxConfig) -> Result<(Self, MailboxSender), MailboxError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.capacity);
        let stats = Arc::new(MailboxStats::new());

        let mailbox = Self {
            receiver,
            capacity: config.capacity,
            stats: Arc::clone(&stats),
        };
        let sender = MailboxSender {
            sender,
            overflow: config.overflow,
            capacity: config.capacity,
            stats,
        };

        Ok((mailbox, sender))
    }

    /// Receive the next envelope.
    ///
    /// Returns `None` once the mailbox is stopped and drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        let envelope = self.receiver.recv().await?;
        self.stats.record_dequeued();
        Some(envelope)
    }

    /// Current number of queued envelopes.
    pub fn len(&self) -> usize {
        self.stats.size()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop the mailbox: parked senders are rejected with
    /// [`MailboxError::Stopped`], further enqueues fail, and the remaining
    /// queue is discarded. Returns the number of discarded envelopes.
    pub fn stop(&mut self) -> usize {
        self.receiver.close();
        self.clear()
    }

    /// Discard all queued envelopes without stopping the mailbox.
    /// Returns the number discarded.
    pub fn clear(&mut self) -> usize {
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            self.stats.record_dequeued();
            discarded += 1;
        }
        discarded
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> MailboxStatsSnapshot {
        self.stats.snapshot(self.capacity)
    }

    /// Shared stats handle (used by the hosting cell for depth sampling).
    pub(crate) fn stats_handle(&self) -> Arc<MailboxStats> {
        Arc::clone(&self.stats)
    }
}

impl MailboxSender {
    /// Enqueue an envelope according to the overflow policy.
    ///
    /// - `Park`: waits for capacity; only the caller is suspended.
    /// - `Drop`: a full queue silently discards the envelope (counted).
    /// - `Fail`: a full queue returns [`MailboxError::Full`].
    ///
    /// # Errors
    ///
    /// [`MailboxError::Stopped`] once the mailbox has been stopped,
    /// [`MailboxError::Full`] under the `Fail` policy.
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), MailboxError> {
        match self.overflow {
            Overflow::Park => {
                self.sender
                    .send(envelope)
                    .await
                    .map_err(|_| MailboxError::Stopped)?;
                self.stats.record_enqueued();
                Ok(())
            }
            Overflow::Drop => match self.sender.try_send(envelope) {
                Ok(()) => {
                    self.stats.record_enqueued();
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.stats.record_dropped();
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(MailboxError::Stopped),
            },
            Overflow::Fail => match self.sender.try_send(envelope) {
                Ok(()) => {
                    self.stats.record_enqueued();
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.stats.record_rejected();
                    Err(MailboxError::Full {
                        capacity: self.capacity,
                    })
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(MailboxError::Stopped),
            },
        }
    }

    /// Enqueue without ever waiting, regardless of policy.
    ///
    /// # Errors
    ///
    /// [`MailboxError::Full`] or [`MailboxError::Stopped`].
    pub fn try_enqueue(&self, envelope: Envelope) -> Result<(), MailboxError> {
        self.sender.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.stats.record_rejected();
                MailboxError::Full {
                    capacity: self.capacity,
                }
            }
            mpsc::error::TrySendError::Closed(_) => MailboxError::Stopped,
        })?;
        self.stats.record_enqueued();
        Ok(())
    }

    /// Whether the mailbox has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }

    /// Current number of queued envelopes.
    pub fn len(&self) -> usize {
        self.stats.size()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open(capacity: usize, overflow: Overflow) -> (Mailbox, MailboxSender) {
        Mailbox::open(MailboxConfig::new(capacity, overflow)).unwrap()
    }

    #[tokio::test]
    async fn test_open_rejects_zero_capacity() {
        let result = Mailbox::open(MailboxConfig::new(0, Overflow::Fail));
        assert!(matches!(result, Err(MailboxError::InvalidCapacity(0))));
    }

    #[tokio::test]
    async fn test_enqueue_recv_fifo() {
        let (mut mailbox, sender) = open(10, Overflow::Fail);

        sender.enqueue(Envelope::new("A")).await.unwrap();
        sender.enqueue(Envelope::new("B")).await.unwrap();

        assert_eq!(mailbox.recv().await.unwrap().kind(), "A");
        assert_eq!(mailbox.recv().await.unwrap().kind(), "B");
    }

    #[tokio::test]
    async fn test_fail_policy_rejects_when_full() {
        let (mailbox, sender) = open(2, Overflow::Fail);

        sender.enqueue(Envelope::new("1")).await.unwrap();
        sender.enqueue(Envelope::new("2")).await.unwrap();

        let result = sender.enqueue(Envelope::new("3")).await;
        assert!(matches!(result, Err(MailboxError::Full { capacity: 2 })));
        assert_eq!(mailbox.stats().rejected, 1);
        assert_eq!(mailbox.len(), 2);
    }

    #[tokio::test]
    async fn test_drop_policy_discards_newest() {
        let (mut mailbox, sender) = open(1, Overflow::Drop);

        sender.enqueue(Envelope::new("keep")).await.unwrap();
        sender.enqueue(Envelope::new("lost")).await.unwrap();

        assert_eq!(mailbox.stats().dropped, 1);
        assert_eq!(mailbox.recv().await.unwrap().kind(), "keep");
        assert!(mailbox.is_empty());
    }

    #[tokio::test]
    async fn test_park_policy_waits_for_capacity() {
        let (mut mailbox, sender) = open(1, Overflow::Park);

        sender.enqueue(Envelope::new("first")).await.unwrap();

        let parked = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.enqueue(Envelope::new("second")).await })
        };

        // Give the parked sender a moment to suspend on the full queue.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!parked.is_finished());

        assert_eq!(mailbox.recv().await.unwrap().kind(), "first");
        parked.await.unwrap().unwrap();
        assert_eq!(mailbox.recv().await.unwrap().kind(), "second");
    }

    #[tokio::test]
    async fn test_stop_rejects_parked_senders() {
        let (mut mailbox, sender) = open(1, Overflow::Park);

        sender.enqueue(Envelope::new("first")).await.unwrap();

        let parked = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.enqueue(Envelope::new("second")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        mailbox.stop();

        let result = parked.await.unwrap();
        assert!(matches!(result, Err(MailboxError::Stopped)));
    }

    #[tokio::test]
    async fn test_stop_disables_enqueue_and_empties_queue() {
        let (mut mailbox, sender) = open(4, Overflow::Fail);

        sender.enqueue(Envelope::new("1")).await.unwrap();
        sender.enqueue(Envelope::new("2")).await.unwrap();

        let discarded = mailbox.stop();
        assert_eq!(discarded, 2);
        assert_eq!(mailbox.len(), 0);
        assert!(sender.is_stopped());

        let result = sender.enqueue(Envelope::new("3")).await;
        assert!(matches!(result, Err(MailboxError::Stopped)));
    }

    #[tokio::test]
    async fn test_clear_keeps_mailbox_usable() {
        let (mut mailbox, sender) = open(4, Overflow::Fail);

        sender.enqueue(Envelope::new("1")).await.unwrap();
        assert_eq!(mailbox.clear(), 1);

        sender.enqueue(Envelope::new("2")).await.unwrap();
        assert_eq!(mailbox.recv().await.unwrap().kind(), "2");
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let (mut mailbox, sender) = open(10, Overflow::Fail);

        sender.enqueue(Envelope::new("1")).await.unwrap();
        sender.enqueue(Envelope::new("2")).await.unwrap();
        let _ = mailbox.recv().await.unwrap();

        let stats = mailbox.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dequeued, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 10);
    }

    #[tokio::test]
    async fn test_multiple_senders_share_stats() {
        let (mailbox, sender) = open(10, Overflow::Fail);
        let sender2 = sender.clone();

        sender.enqueue(Envelope::new("a")).await.unwrap();
        sender2.enqueue(Envelope::new("b")).await.unwrap();

        assert_eq!(mailbox.stats().enqueued, 2);
    }
}
