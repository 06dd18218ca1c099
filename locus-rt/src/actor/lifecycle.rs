//! Actor status machine and lifecycle tracking.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

// Layer 3: Internal module imports
// (none)

/// Status of a managed actor.
///
/// # Transitions
///
/// ```text
/// Starting -> Running -> (Suspended -> Running)* -> Stopping -> Stopped
///     |          |
///     v          v
///  Failed    Restarting -> Starting
/// ```
///
/// `Stopped` is terminal; `Failed` may only move to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorStatus {
    /// Initialising (`on_start` in progress)
    Starting,

    /// Processing messages
    Running,

    /// Delivery paused; mailbox keeps accepting
    Suspended,

    /// Being recreated after a supervised restart
    Restarting,

    /// Shutting down (`on_stop` in progress)
    Stopping,

    /// Terminal: fully stopped
    Stopped,

    /// Failed and awaiting terminal stop
    Failed,
}

impl Default for ActorStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl ActorStatus {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ActorStatus) -> bool {
        use ActorStatus::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Starting, Restarting)
                | (Running, Suspended)
                | (Running, Restarting)
                | (Running, Stopping)
                | (Running, Failed)
                | (Suspended, Running)
                | (Suspended, Stopping)
                | (Restarting, Starting)
                | (Restarting, Failed)
                | (Stopping, Stopped)
                | (Failed, Stopped)
        )
    }

    /// Whether the actor is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Lifecycle tracker: current status, restart count, transition timestamps.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: ActorStatus,
    last_transition: DateTime<Utc>,
    restart_count: u32,
}

impl Lifecycle {
    /// Create a tracker in `Starting`.
    pub fn new() -> Self {
        Self {
            status: ActorStatus::Starting,
            last_transition: Utc::now(),
            restart_count: 0,
        }
    }

    /// Move to `next` if legal. Illegal transitions are ignored (logged)
    /// and return `false`.
    pub fn transition_to(&mut self, next: ActorStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(from = ?self.status, to = ?next, "ignoring illegal status transition");
            return false;
        }
        if next == ActorStatus::Restarting {
            self.restart_count += 1;
        }
        self.status = next;
        self.last_transition = Utc::now();
        true
    }

    /// Current status.
    pub fn status(&self) -> ActorStatus {
        self.status
    }

    /// Number of supervised restarts so far.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Timestamp of the last status change.
    pub fn last_transition(&self) -> DateTime<Utc> {
        self.last_transition
    }

    /// Whether the actor is processing messages.
    pub fn is_running(&self) -> bool {
        self.status == ActorStatus::Running
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lifecycle() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.status(), ActorStatus::Starting);
        assert_eq!(lifecycle.restart_count(), 0);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_normal_progression() {
        let mut lifecycle = Lifecycle::new();

        assert!(lifecycle.transition_to(ActorStatus::Running));
        assert!(lifecycle.is_running());
        assert!(lifecycle.transition_to(ActorStatus::Stopping));
        assert!(lifecycle.transition_to(ActorStatus::Stopped));
        assert!(lifecycle.status().is_terminal());
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition_to(ActorStatus::Running);

        assert!(lifecycle.transition_to(ActorStatus::Suspended));
        assert!(lifecycle.transition_to(ActorStatus::Running));
        assert!(lifecycle.transition_to(ActorStatus::Suspended));
        assert!(lifecycle.transition_to(ActorStatus::Running));
    }

    #[test]
    fn test_restart_increments_count() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition_to(ActorStatus::Running);

        assert!(lifecycle.transition_to(ActorStatus::Restarting));
        assert_eq!(lifecycle.restart_count(), 1);
        assert!(lifecycle.transition_to(ActorStatus::Starting));
        assert!(lifecycle.transition_to(ActorStatus::Running));

        lifecycle.transition_to(ActorStatus::Restarting);
        assert_eq!(lifecycle.restart_count(), 2);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition_to(ActorStatus::Running);
        lifecycle.transition_to(ActorStatus::Stopping);
        lifecycle.transition_to(ActorStatus::Stopped);

        assert!(!lifecycle.transition_to(ActorStatus::Running));
        assert!(!lifecycle.transition_to(ActorStatus::Starting));
        assert_eq!(lifecycle.status(), ActorStatus::Stopped);
    }

    #[test]
    fn test_failed_only_moves_to_stopped() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition_to(ActorStatus::Running);
        lifecycle.transition_to(ActorStatus::Failed);

        assert!(!lifecycle.transition_to(ActorStatus::Running));
        assert!(lifecycle.transition_to(ActorStatus::Stopped));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.transition_to(ActorStatus::Suspended));
        assert_eq!(lifecycle.status(), ActorStatus::Starting);
    }
}
