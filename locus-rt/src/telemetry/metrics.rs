// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use crate::interceptor::{Intercept, Interceptor, InterceptorError, MessageContext};
use crate::message::Envelope;
use crate::util::Address;

/// Metadata key carrying the handler start time between hooks.
const START_KEY: &str = "metrics.start_us";

/// Metrics collection configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Bounded ring of processing-time samples
    pub max_processing_samples: usize,

    /// Bounded ring of queue-depth samples
    pub max_depth_samples: usize,

    /// Interval of the export tick
    pub export_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_processing_samples: 1000,
            max_depth_samples: 100,
            export_interval: Duration::from_secs(60),
        }
    }
}

/// Aggregate over one bounded sample ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    /// Samples currently in the ring
    pub count: usize,
    /// Arithmetic mean
    pub avg: f64,
    /// Smallest sample
    pub min: u64,
    /// Largest sample
    pub max: u64,
    /// 95th percentile
    pub p95: u64,
    /// 99th percentile
    pub p99: u64,
}

impl SampleStats {
    fn empty() -> Self {
        Self {
            count: 0,
            avg: 0.0,
            min: 0,
            max: 0,
            p95: 0,
            p99: 0,
        }
    }

    fn from_samples(samples: &VecDeque<u64>) -> Self {
        if samples.is_empty() {
            return Self::empty();
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        Self {
            count,
            avg: sum as f64 / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            p95: sorted[percentile_index(count, 95)],
            p99: sorted[percentile_index(count, 99)],
        }
    }
}

fn percentile_index(count: usize, percentile: usize) -> usize {
    ((count * percentile).div_ceil(100)).saturating_sub(1).min(count - 1)
}

/// Point-in-time metrics export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// Messages processed successfully
    pub processed: u64,
    /// Handler failures observed
    pub failed: u64,
    /// Processing-time stats in microseconds
    pub processing_us: SampleStats,
    /// Queue-depth stats
    pub queue_depth: SampleStats,
}

/// Shared metrics store with bounded sample rings.
pub struct RuntimeMetrics {
    config: MetricsConfig,
    processing_us: Mutex<VecDeque<u64>>,
    queue_depths: Mutex<VecDeque<u64>>,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl RuntimeMetrics {
    /// Create a store with the given bounds.
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            processing_us: Mutex::new(VecDeque::with_capacity(config.max_processing_samples)),
            queue_depths: Mutex::new(VecDeque::with_capacity(config.max_depth_samples)),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Record one handler duration in microseconds.
    pub fn record_processing_micros(&self, micros: u64) {
        let mut samples = self.processing_us.lock();
        if samples.len() == self.config.max_processing_samples {
            samples.pop_front();
        }
        samples.push_back(micros);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one mailbox depth observation.
    pub fn record_queue_depth(&self, depth: u64) {
        let mut samples = self.queue_depths.lock();
        if samples.len() == self.config.max_depth_samples {
            samples.pop_front();
        }
        samples.push_back(depth);
    }

    /// Record a handler failure.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all aggregates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            processing_us: SampleStats::from_samples(&self.processing_us.lock()),
            queue_depth: SampleStats::from_samples(&self.queue_depths.lock()),
        }
    }
}

/// Callback receiving periodic snapshots.
pub type ExportCallback = Arc<dyn Fn(MetricsSnapshot) + Send + Sync>;

/// Interceptor measuring handler processing time.
///
/// The start time rides the per-exchange [`MessageContext`] metadata, so
/// no envelope is retained and no identity map is needed: the context is
/// dropped with the exchange either way.
pub struct MetricsInterceptor {
    metrics: Arc<RuntimeMetrics>,
    epoch: Instant,
}

impl MetricsInterceptor {
    /// Create an interceptor feeding the given store.
    pub fn new(metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            metrics,
            epoch: Instant::now(),
        }
    }

    /// The shared store.
    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    fn elapsed_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

impl Interceptor for MetricsInterceptor {
    fn before_receive(
        &self,
        _envelope: &Envelope,
        _actor: &Address,
        ctx: &mut MessageContext,
    ) -> Result<Intercept, InterceptorError> {
        ctx.set(START_KEY, json!(self.elapsed_us()));
        Ok(Intercept::Continue)
    }

    fn after_process(
        &self,
        _envelope: &Envelope,
        _actor: &Address,
        ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        if let Some(start) = ctx.take(START_KEY).and_then(|v| v.as_u64()) {
            self.metrics
                .record_processing_micros(self.elapsed_us().saturating_sub(start));
        }
        Ok(())
    }

    fn on_error(
        &self,
        _error: &crate::actor::HandlerError,
        _envelope: &Envelope,
        _actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        self.metrics.record_failure();
        Ok(())
    }
}

/// Spawn the periodic export tick; aborted by the system on stop.
pub fn spawn_export_task(
    metrics: Arc<RuntimeMetrics>,
    interval: Duration,
    callback: ExportCallback,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; skip it so
        // the first export covers a full interval.
        tick.tick().await;
        loop {
            tick.tick().await;
            callback(metrics.snapshot());
        }
    })
}
