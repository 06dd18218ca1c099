//! Caller-facing error taxonomy for system operations.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::events::BusError;
use crate::message::Violation;
use crate::util::{Address, AddressParseError};

/// Errors reported through `send`.
///
/// Sender-facing by design: handler failures never surface here, they go to
/// the supervisor chain.
#[derive(Debug, Error)]
pub enum SendError {
    /// Envelope failed boundary validation; never enqueued
    #[error("invalid envelope: {}", .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidEnvelope(Vec<Violation>),

    /// Target mailbox is full under the `Fail` overflow policy
    #[error("mailbox full for {address} (capacity {capacity})")]
    MailboxFull {
        /// Target actor
        address: Address,
        /// Its mailbox capacity
        capacity: usize,
    },

    /// Target address resolves nowhere
    #[error("no such actor: {0}")]
    NoSuchActor(Address),

    /// Target actor has stopped (loud variant of the stopped-send policy)
    #[error("actor stopped: {0}")]
    ActorStopped(Address),

    /// The system is not running
    #[error("system is not running")]
    SystemNotRunning,
}

impl SendError {
    /// Whether retrying the send later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::MailboxFull { .. })
    }
}

/// Errors reported through `ask`.
#[derive(Debug, Error)]
pub enum AskError {
    /// The underlying send failed
    #[error(transparent)]
    Send(#[from] SendError),

    /// No correlated reply arrived within the deadline, across all attempts
    #[error("ask to {target} timed out after {timeout:?} ({attempts} attempts)")]
    Timeout {
        /// Ask target
        target: Address,
        /// Per-attempt deadline
        timeout: Duration,
        /// Attempts made (1 + retries)
        attempts: u32,
    },

    /// The target stopped before replying
    #[error("actor stopped before replying: {0}")]
    ActorStopped(Address),
}

/// Errors reported through `spawn`.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The system is not running
    #[error("system is not running")]
    SystemNotRunning,

    /// The configured actor limit was reached
    #[error("actor limit exceeded: current {current}, max {max}")]
    ActorLimitExceeded {
        /// Actors currently alive
        current: usize,
        /// Configured limit
        max: usize,
    },

    /// The requested address is already taken
    #[error("address already in use: {0}")]
    AddressInUse(Address),

    /// Spawn options produced an invalid address
    #[error(transparent)]
    InvalidAddress(#[from] AddressParseError),

    /// The behaviour's mailbox configuration is invalid
    #[error(transparent)]
    InvalidMailbox(#[from] crate::mailbox::MailboxError),
}

/// Errors from system-level operations (subscribe, stop_actor, ...).
#[derive(Debug, Error)]
pub enum SystemError {
    /// The system is not running
    #[error("system is not running")]
    NotRunning,

    /// `start` was called on a system that already started
    #[error("system already started")]
    AlreadyStarted,

    /// The address resolves to no live actor
    #[error("no such actor: {0}")]
    NoSuchActor(Address),

    /// The actor's event bus refused the operation
    #[error(transparent)]
    Bus(#[from] BusError),

    /// An actor did not stop within the deadline
    #[error("actor did not stop within {0:?}")]
    StopTimeout(Duration),
}
