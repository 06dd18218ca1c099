// Layer 1: Standard library imports
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tracing::warn;

// Layer 3: Internal module imports
use super::backoff::{BackoffPolicy, RestartBackoff};
use crate::actor::HandlerError;
use crate::util::Address;

/// Default restart limit within the time window.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default sliding window for counting restarts.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(60);

/// What the supervisor does with a failing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Stop the child, recreate it with initial context, resume delivery.
    ///
    /// Counts against the restart limit; exceeding it forces `Escalate`.
    Restart,

    /// Stop the child and drop its pending mailbox.
    Stop,

    /// Forward the failure to this supervisor's own supervisor.
    Escalate,

    /// Discard the failing message only; keep state and continue.
    Resume,
}

impl Default for Directive {
    /// Default supervision outcome is to restart with fresh state.
    fn default() -> Self {
        Self::Restart
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart => write!(f, "Restart"),
            Self::Stop => write!(f, "Stop"),
            Self::Escalate => write!(f, "Escalate"),
            Self::Resume => write!(f, "Resume"),
        }
    }
}

/// Closure deciding a directive from a concrete failure.
pub type FailureDecider = Arc<dyn Fn(&HandlerError, &Address) -> Directive + Send + Sync>;

/// Per-actor supervision policy, immutable after spawn.
///
/// When no decider is configured, every failure maps to `directive`
/// (default `Restart`). A decider that panics also maps to `Restart`, so a
/// broken policy never takes down supervision itself.
///
/// # Example
/// ```rust
/// use locus_rt::supervisor::{Directive, SupervisionPolicy};
/// use std::time::Duration;
///
/// // Restart up to 5 times per 30 seconds, stop on messages mentioning "fatal":
/// let policy = SupervisionPolicy::default()
///     .with_limits(5, Duration::from_secs(30))
///     .with_decider(|err, _child| {
///         if err.to_string().contains("fatal") {
///             Directive::Stop
///         } else {
///             Directive::Restart
///         }
///     });
/// assert_eq!(policy.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct SupervisionPolicy {
    /// Directive applied when no decider is configured
    pub directive: Directive,

    /// Optional failure-specific decider
    pub decider: Option<FailureDecider>,

    /// Restarts allowed within `time_window` before forced escalation
    pub max_retries: u32,

    /// Sliding window for the restart limit
    pub time_window: Duration,

    /// Optional delay policy between restart attempts
    pub backoff: Option<BackoffPolicy>,
}

impl Default for SupervisionPolicy {
    fn default() -> Self {
        Self {
            directive: Directive::Restart,
            decider: None,
            max_retries: DEFAULT_MAX_RETRIES,
            time_window: DEFAULT_TIME_WINDOW,
            backoff: None,
        }
    }
}

impl fmt::Debug for SupervisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisionPolicy")
            .field("directive", &self.directive)
            .field("decider", &self.decider.as_ref().map(|_| "<closure>"))
            .field("max_retries", &self.max_retries)
            .field("time_window", &self.time_window)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl SupervisionPolicy {
    /// Policy applying a fixed directive to every failure.
    pub fn always(directive: Directive) -> Self {
        Self {
            directive,
            ..Self::default()
        }
    }

    /// Builder method: set the failure decider.
    pub fn with_decider(
        mut self,
        decider: impl Fn(&HandlerError, &Address) -> Directive + Send + Sync + 'static,
    ) -> Self {
        self.decider = Some(Arc::new(decider));
        self
    }

    /// Builder method: set the restart limit and window.
    pub fn with_limits(mut self, max_retries: u32, time_window: Duration) -> Self {
        self.max_retries = max_retries;
        self.time_window = time_window;
        self
    }

    /// Builder method: set the restart delay policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Compute the directive for a failure of `child`.
    ///
    /// A panicking decider defaults to `Restart`.
    pub fn decide(&self, error: &HandlerError, child: &Address) -> Directive {
        match &self.decider {
            Some(decider) => {
                catch_unwind(AssertUnwindSafe(|| decider(error, child))).unwrap_or_else(|_| {
                    warn!(child = %child, "supervision decider panicked; defaulting to Restart");
                    Directive::Restart
                })
            }
            None => self.directive,
        }
    }

    /// Restart tracker configured from this policy's limits and backoff.
    pub fn restart_tracker(&self) -> RestartBackoff {
        let tracker = RestartBackoff::new(self.max_retries, self.time_window);
        match self.backoff {
            Some(backoff) => tracker.with_policy(backoff),
            None => tracker,
        }
    }
}
