//! Overflow policies and configuration for bounded mailboxes.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Default capacity for bounded mailboxes.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// What happens when an envelope arrives at a full mailbox.
///
/// # Policy Selection
///
/// - **Park**: suspend the sender until capacity frees; the target actor is
///   never blocked. Use when delivery matters more than sender latency.
/// - **Drop**: discard the newest message silently and count it. Use for
///   best-effort streams (telemetry, gauges).
/// - **Fail**: reject the send immediately with [`MailboxError::Full`]. Use
///   when the caller must learn about overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Overflow {
    /// Suspend the sender until space becomes available (async wait).
    Park,

    /// Drop the incoming message and increment the dropped counter.
    Drop,

    /// Return [`MailboxError::Full`] to the sender immediately.
    #[default]
    Fail,
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Park => write!(f, "Park"),
            Self::Drop => write!(f, "Drop"),
            Self::Fail => write!(f, "Fail"),
        }
    }
}

/// Mailbox error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// Mailbox is full and the overflow policy is `Fail`
    #[error("Mailbox is full (capacity: {capacity})")]
    Full { capacity: usize },

    /// Mailbox was stopped; parked senders are rejected and enqueue is disabled
    #[error("Mailbox is stopped")]
    Stopped,

    /// Capacity below the minimum of 1
    #[error("Mailbox capacity must be >= 1, got {0}")]
    InvalidCapacity(usize),
}

/// Per-actor mailbox configuration.
///
/// # Example
/// ```rust
/// use locus_rt::mailbox::{MailboxConfig, Overflow};
///
/// let config = MailboxConfig::new(64, Overflow::Park);
/// assert!(config.validate().is_ok());
///
/// let invalid = MailboxConfig::new(0, Overflow::Fail);
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Maximum queued envelopes; must be >= 1
    pub capacity: usize,

    /// Policy applied when the queue is full
    pub overflow: Overflow,
}

impl MailboxConfig {
    /// Create a new configuration.
    pub fn new(capacity: usize, overflow: Overflow) -> Self {
        Self { capacity, overflow }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::InvalidCapacity`] when capacity is zero.
    pub fn validate(&self) -> Result<(), MailboxError> {
        if self.capacity == 0 {
            return Err(MailboxError::InvalidCapacity(0));
        }
        Ok(())
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAILBOX_CAPACITY,
            overflow: Overflow::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_default() {
        assert_eq!(Overflow::default(), Overflow::Fail);
    }

    #[test]
    fn test_overflow_display() {
        assert_eq!(Overflow::Park.to_string(), "Park");
        assert_eq!(Overflow::Drop.to_string(), "Drop");
        assert_eq!(Overflow::Fail.to_string(), "Fail");
    }

    #[test]
    fn test_config_default() {
        let config = MailboxConfig::default();
        assert_eq!(config.capacity, DEFAULT_MAILBOX_CAPACITY);
        assert_eq!(config.overflow, Overflow::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let config = MailboxConfig::new(0, Overflow::Park);
        assert_eq!(config.validate(), Err(MailboxError::InvalidCapacity(0)));
    }

    #[test]
    fn test_error_display() {
        let err = MailboxError::Full { capacity: 8 };
        assert!(err.to_string().contains("full"));
        assert!(err.to_string().contains('8'));

        assert_eq!(MailboxError::Stopped.to_string(), "Mailbox is stopped");
    }
}
