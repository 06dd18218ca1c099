// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::time::Instant;

// Layer 3: Internal module imports
// (none)

/// Source of scheduler time.
///
/// The monotonic variant reads elapsed time since creation from the tokio
/// clock; the virtual variant only moves when explicitly advanced, making
/// timer behaviour fully deterministic in tests.
///
/// # Example
/// ```rust
/// use locus_rt::timer::Clock;
///
/// let clock = Clock::virtual_clock();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(50).unwrap();
/// assert_eq!(clock.now_ms(), 50);
///
/// let monotonic = Clock::monotonic();
/// assert!(monotonic.advance(50).is_err());
/// ```
#[derive(Clone)]
pub enum Clock {
    /// Monotonic wall time, measured from clock creation
    Monotonic {
        /// Origin instant; `now_ms` is the elapsed time since it
        epoch: Instant,
    },

    /// Manually advanced time in milliseconds
    Virtual(Arc<AtomicU64>),
}

/// Advancing a monotonic clock is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot advance a monotonic clock; use a virtual clock in tests")]
pub struct NotVirtual;

impl Clock {
    /// Monotonic production clock.
    pub fn monotonic() -> Self {
        Self::Monotonic {
            epoch: Instant::now(),
        }
    }

    /// Virtual test clock starting at zero.
    pub fn virtual_clock() -> Self {
        Self::Virtual(Arc::new(AtomicU64::new(0)))
    }

    /// Current scheduler time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        match self {
            Self::Monotonic { epoch } => epoch.elapsed().as_millis() as u64,
            Self::Virtual(now) => now.load(Ordering::Acquire),
        }
    }

    /// Advance a virtual clock by `ms`, returning the new now.
    ///
    /// # Errors
    ///
    /// [`NotVirtual`] on a monotonic clock.
    pub fn advance(&self, ms: u64) -> Result<u64, NotVirtual> {
        match self {
            Self::Monotonic { .. } => Err(NotVirtual),
            Self::Virtual(now) => Ok(now.fetch_add(ms, Ordering::AcqRel) + ms),
        }
    }

    /// Whether this clock only moves via [`Clock::advance`].
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_starts_at_zero() {
        let clock = Clock::virtual_clock();
        assert_eq!(clock.now_ms(), 0);
        assert!(clock.is_virtual());
    }

    #[test]
    fn test_virtual_clock_advances() {
        let clock = Clock::virtual_clock();
        assert_eq!(clock.advance(50).unwrap(), 50);
        assert_eq!(clock.advance(100).unwrap(), 150);
        assert_eq!(clock.now_ms(), 150);
    }

    #[test]
    fn test_virtual_clock_shared_between_clones() {
        let clock = Clock::virtual_clock();
        let other = clock.clone();

        clock.advance(30).unwrap();
        assert_eq!(other.now_ms(), 30);
    }

    #[test]
    fn test_monotonic_clock_rejects_advance() {
        let clock = Clock::monotonic();
        assert!(!clock.is_virtual());
        assert_eq!(clock.advance(10), Err(NotVirtual));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_tokio_time() {
        let clock = Clock::monotonic();
        tokio::time::advance(std::time::Duration::from_millis(200)).await;
        assert!(clock.now_ms() >= 200);
    }
}
