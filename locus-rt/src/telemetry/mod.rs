//! Minimal-overhead telemetry wired as interceptors.
//!
//! [`MetricsInterceptor`] keeps bounded sample rings of processing times
//! and queue depths and derives `avg/min/max/p95/p99`; a periodic tick
//! exports snapshots through a callback. [`LoggingInterceptor`] buffers
//! per-message records, samples by rate, and flushes batches through
//! `tracing` on size or tick.

pub mod logging;
pub mod metrics;

pub use logging::{LoggingConfig, LoggingInterceptor};
pub use metrics::{
    ExportCallback, MetricsConfig, MetricsInterceptor, MetricsSnapshot, RuntimeMetrics,
    SampleStats,
};
