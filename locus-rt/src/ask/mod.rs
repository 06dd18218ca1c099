//! Request/response correlation.
//!
//! Every ask stores a oneshot resolver in the [`CorrelationTable`] keyed by
//! its 128-bit correlation id. Replies demultiplex through the table, so
//! out-of-order replies resolve the right caller; stopping an actor fails
//! every outstanding ask targeting it.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::message::Envelope;
use crate::util::{duration_serde, Address, CorrelationId};

/// Default reply deadline.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default base delay between retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Options for an ask exchange.
///
/// # Example
/// ```rust
/// use locus_rt::ask::AskOptions;
/// use std::time::Duration;
///
/// let opts = AskOptions::default()
///     .with_timeout(Duration::from_millis(100))
///     .with_retries(2);
/// assert_eq!(opts.retries, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOptions {
    /// Deadline for each attempt
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Additional attempts after the first times out
    pub retries: u32,

    /// Base delay before a retry; grows exponentially with jitter
    #[serde(with = "duration_serde")]
    pub retry_delay: Duration,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ASK_TIMEOUT,
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl AskOptions {
    /// Builder method: set the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method: set the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Builder method: set the base retry delay.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Why a pending ask was failed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskFailure {
    /// The target actor stopped before replying
    ActorStopped,
}

/// Resolution delivered to a waiting asker.
pub type AskResolution = Result<Envelope, AskFailure>;

struct Pending {
    tx: oneshot::Sender<AskResolution>,
    target: Address,
}

/// Concurrent table of outstanding asks: correlation id → resolver.
///
/// At most one resolver exists per id; re-registering an id replaces (and
/// thereby cancels) the previous resolver.
pub struct CorrelationTable {
    pending: DashMap<CorrelationId, Pending>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Register a pending ask; the returned receiver resolves with the
    /// reply envelope or an [`AskFailure`].
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        target: Address,
    ) -> oneshot::Receiver<AskResolution> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, Pending { tx, target });
        rx
    }

    /// Resolve a pending ask with a reply envelope.
    ///
    /// Returns whether a resolver existed for the id.
    pub fn complete(&self, correlation_id: CorrelationId, reply: Envelope) -> bool {
        match self.pending.remove(&correlation_id) {
            Some((_, pending)) => {
                let _ = pending.tx.send(Ok(reply));
                true
            }
            None => false,
        }
    }

    /// Drop a pending ask without resolving (deadline handling re-registers
    /// per attempt; the final timeout removes the entry here).
    pub fn remove(&self, correlation_id: CorrelationId) {
        self.pending.remove(&correlation_id);
    }

    /// Fail every outstanding ask targeting `address`.
    ///
    /// Returns how many were failed.
    pub fn fail_for_target(&self, address: &Address) -> usize {
        let ids: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| &entry.value().target == address)
            .map(|entry| *entry.key())
            .collect();

        let mut failed = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.tx.send(Err(AskFailure::ActorStopped));
                failed += 1;
            }
        }
        failed
    }

    /// Fail every outstanding ask (system shutdown).
    pub fn fail_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.tx.send(Err(AskFailure::ActorStopped));
                failed += 1;
            }
        }
        failed
    }

    /// Number of outstanding asks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no asks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(id: &str) -> Address {
        Address::new("local", "worker", id).unwrap()
    }

    #[tokio::test]
    async fn test_complete_resolves_receiver() {
        let table = CorrelationTable::new();
        let id = CorrelationId::new();
        let rx = table.register(id, addr("a"));

        let reply = Envelope::new("RESPONSE").with_correlation_id(id);
        assert!(table.complete(id, reply.clone()));

        let resolution = rx.await.unwrap();
        assert_eq!(resolution.unwrap(), reply);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_complete_unknown_id_is_false() {
        let table = CorrelationTable::new();
        assert!(!table.complete(CorrelationId::new(), Envelope::new("RESPONSE")));
    }

    #[tokio::test]
    async fn test_out_of_order_replies_demultiplex() {
        let table = CorrelationTable::new();
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        let rx1 = table.register(id1, addr("a"));
        let rx2 = table.register(id2, addr("a"));

        // Replies arrive in reverse order.
        table.complete(id2, Envelope::new("RESPONSE").with_field("n", 2.into()));
        table.complete(id1, Envelope::new("RESPONSE").with_field("n", 1.into()));

        assert_eq!(rx1.await.unwrap().unwrap().field("n"), Some(&1.into()));
        assert_eq!(rx2.await.unwrap().unwrap().field("n"), Some(&2.into()));
    }

    #[tokio::test]
    async fn test_fail_for_target_rejects_only_that_target() {
        let table = CorrelationTable::new();
        let id_a = CorrelationId::new();
        let id_b = CorrelationId::new();
        let rx_a = table.register(id_a, addr("a"));
        let _rx_b = table.register(id_b, addr("b"));

        assert_eq!(table.fail_for_target(&addr("a")), 1);
        assert_eq!(rx_a.await.unwrap(), Err(AskFailure::ActorStopped));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let table = CorrelationTable::new();
        let rx1 = table.register(CorrelationId::new(), addr("a"));
        let rx2 = table.register(CorrelationId::new(), addr("b"));

        assert_eq!(table.fail_all(), 2);
        assert_eq!(rx1.await.unwrap(), Err(AskFailure::ActorStopped));
        assert_eq!(rx2.await.unwrap(), Err(AskFailure::ActorStopped));
    }

    #[tokio::test]
    async fn test_remove_drops_resolver() {
        let table = CorrelationTable::new();
        let id = CorrelationId::new();
        let rx = table.register(id, addr("a"));

        table.remove(id);
        assert!(rx.await.is_err()); // channel closed without resolution
    }

    #[test]
    fn test_options_builders() {
        let opts = AskOptions::default()
            .with_timeout(Duration::from_millis(250))
            .with_retries(3)
            .with_retry_delay(Duration::from_millis(50));

        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.retries, 3);
        assert_eq!(opts.retry_delay, Duration::from_millis(50));
    }
}
