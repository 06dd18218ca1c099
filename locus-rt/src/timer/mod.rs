//! Virtualisable scheduled delivery.
//!
//! The timer actor decouples delayed sends from wall-clock time. In
//! production the [`Clock`] is monotonic and a background task delivers due
//! envelopes; in test mode the clock is virtual and only `advance_time`
//! moves it, delivering everything due in deadline-then-insertion order.

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, NotVirtual};
pub use scheduler::{DeliveryFuture, DeliverySink, ScheduledEntry, Scheduler, TimerError};
