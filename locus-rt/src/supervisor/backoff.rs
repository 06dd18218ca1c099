//! Restart rate limiting and restart-delay policies.
//!
//! A sliding window tracks recent restarts so supervisors never restart a
//! child more than `max_restarts` times per window; old entries expire as
//! the window slides forward, preventing permanent lockout after transient
//! trouble. The delay between attempts grows per the configured
//! [`BackoffKind`].

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::duration_serde;

/// Growth shape of the restart delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackoffKind {
    /// `initial_delay * multiplier^(attempt - 1)`
    Exponential {
        /// Per-attempt growth factor (≥ 1.0)
        multiplier: f64,
    },

    /// `initial_delay * attempt`
    Linear,

    /// `initial_delay * fib(attempt)` with fib(1) = fib(2) = 1
    Fibonacci,
}

/// Delay policy applied before each supervised restart.
///
/// # Example
/// ```rust
/// use locus_rt::supervisor::{BackoffKind, BackoffPolicy};
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
///     .with_max_delay(Duration::from_secs(5));
///
/// assert_eq!(policy.delay_for(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Growth shape
    pub kind: BackoffKind,

    /// Delay before the first restart attempt
    #[serde(with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound on any computed delay
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,

    /// Apply ±25% random jitter to each delay
    pub jitter: bool,
}

impl BackoffPolicy {
    /// Exponential policy with the given initial delay and multiplier.
    pub fn exponential(initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            kind: BackoffKind::Exponential { multiplier },
            initial_delay,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }

    /// Linear policy with the given initial delay.
    pub fn linear(initial_delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Linear,
            initial_delay,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }

    /// Fibonacci policy with the given initial delay.
    pub fn fibonacci(initial_delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fibonacci,
            initial_delay,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }

    /// Builder method: set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Builder method: enable ±25% jitter.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Deterministic delay for the given attempt (1-based), before jitter.
    ///
    /// Attempts are capped at 32 so growth cannot overflow; the cap is far
    /// above any realistic restart window.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.clamp(1, 32);
        let base_ms = self.initial_delay.as_millis() as f64;

        let delay_ms = match self.kind {
            BackoffKind::Exponential { multiplier } => {
                base_ms * multiplier.max(1.0).powi(attempt as i32 - 1)
            }
            BackoffKind::Linear => base_ms * attempt as f64,
            BackoffKind::Fibonacci => base_ms * fib(attempt) as f64,
        };

        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }

    /// Delay for the given attempt with jitter applied if configured.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((delay.as_millis() as f64 * factor) as u64).min(self.max_delay)
    }
}

fn fib(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 2..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    if n <= 2 {
        1
    } else {
        b
    }
}

/// Sliding-window restart tracker.
///
/// Records restart timestamps; entries older than the window expire
/// automatically, so the count reflects only recent restarts. State resets
/// on a successful supervision attach or clean stop.
///
/// # Example
/// ```rust
/// use locus_rt::supervisor::RestartBackoff;
/// use std::time::Duration;
///
/// let mut backoff = RestartBackoff::new(3, Duration::from_secs(60));
///
/// backoff.record_restart();
/// backoff.record_restart();
/// assert!(!backoff.is_limit_exceeded());
///
/// backoff.record_restart();
/// assert!(backoff.is_limit_exceeded());
/// ```
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    max_restarts: u32,
    restart_window: Duration,
    restart_history: VecDeque<DateTime<Utc>>,
    policy: Option<BackoffPolicy>,
}

impl RestartBackoff {
    /// Create a tracker allowing `max_restarts` per `restart_window`.
    pub fn new(max_restarts: u32, restart_window: Duration) -> Self {
        Self {
            max_restarts,
            restart_window,
            restart_history: VecDeque::new(),
            policy: None,
        }
    }

    /// Builder method: attach a restart-delay policy.
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Record a restart at the current time.
    pub fn record_restart(&mut self) {
        self.restart_history.push_front(Utc::now());
    }

    /// Whether the number of restarts within the window reached the limit.
    pub fn is_limit_exceeded(&mut self) -> bool {
        self.cleanup_expired();
        self.restart_history.len() >= self.max_restarts as usize
    }

    /// Restarts currently inside the window.
    pub fn restart_count(&mut self) -> u32 {
        self.cleanup_expired();
        self.restart_history.len() as u32
    }

    /// Delay to apply before the next restart attempt.
    ///
    /// Zero when no [`BackoffPolicy`] is attached.
    pub fn next_delay(&mut self) -> Duration {
        self.cleanup_expired();
        let attempt = (self.restart_history.len() as u32).max(1);
        match &self.policy {
            Some(policy) => policy.jittered_delay_for(attempt),
            None => Duration::ZERO,
        }
    }

    /// Clear all tracked restarts (clean stop or successful re-attach).
    pub fn reset(&mut self) {
        self.restart_history.clear();
    }

    fn cleanup_expired(&mut self) {
        let Ok(window) = chrono::Duration::from_std(self.restart_window) else {
            return;
        };
        let window_start = Utc::now() - window;

        while let Some(&oldest) = self.restart_history.back() {
            if oldest < window_start {
                self.restart_history.pop_back();
            } else {
                break;
            }
        }
    }
}
