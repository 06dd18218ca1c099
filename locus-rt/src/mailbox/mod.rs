//! Bounded per-actor message queues with overflow control.
//!
//! Every actor owns exactly one bounded FIFO mailbox. When the queue is at
//! capacity the configured [`Overflow`] policy decides whether the sender
//! parks, the message is dropped, or the send fails. The mailbox never
//! interprets envelopes; it only moves them.
//!
//! # Components
//!
//! - [`Mailbox`] / [`MailboxSender`] - receiving and sending halves
//! - [`Overflow`] - overflow policies (Park, Drop, Fail)
//! - [`MailboxConfig`] - capacity and policy configuration
//! - [`MailboxStats`] - atomic enqueue/dequeue/drop counters

pub mod bounded;
pub mod overflow;
pub mod stats;

pub use bounded::{Mailbox, MailboxSender};
pub use overflow::{MailboxConfig, MailboxError, Overflow, DEFAULT_MAILBOX_CAPACITY};
pub use stats::{MailboxStats, MailboxStatsSnapshot};
