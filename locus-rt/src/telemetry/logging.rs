// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// Layer 3: Internal module imports
use crate::actor::HandlerError;
use crate::interceptor::{Interceptor, InterceptorError, MessageContext};
use crate::message::Envelope;
use crate::util::Address;

/// Message-log configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggingConfig {
    /// Fraction of messages recorded, in `[0, 1]`
    pub sample_rate: f64,

    /// Buffer size that forces a flush
    pub batch_size: usize,

    /// Interval of the background flush tick
    pub flush_interval: Duration,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            batch_size: 64,
            flush_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
struct LogRecord {
    at: DateTime<Utc>,
    actor: String,
    kind: String,
    outcome: &'static str,
}

/// Interceptor batching per-message log records.
///
/// Records are sampled by rate, buffered, and flushed through `tracing`
/// when the buffer reaches `batch_size` or the flush tick fires.
pub struct LoggingInterceptor {
    config: LoggingConfig,
    buffer: Mutex<Vec<LogRecord>>,
}

impl LoggingInterceptor {
    /// Create an interceptor with the given configuration.
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Number of buffered, not-yet-flushed records.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Flush the buffer through `tracing`. Returns how many flushed.
    pub fn flush(&self) -> usize {
        let records: Vec<LogRecord> = std::mem::take(&mut *self.buffer.lock());
        if records.is_empty() {
            return 0;
        }
        for record in &records {
            debug!(
                at = %record.at,
                actor = %record.actor,
                kind = %record.kind,
                outcome = record.outcome,
                "message"
            );
        }
        info!(flushed = records.len(), "message log batch");
        records.len()
    }

    fn sampled(&self) -> bool {
        self.config.sample_rate >= 1.0
            || rand::thread_rng().gen::<f64>() < self.config.sample_rate
    }

    fn record(&self, actor: &Address, envelope: &Envelope, outcome: &'static str) {
        if !self.sampled() {
            return;
        }
        let should_flush = {
            let mut buffer = self.buffer.lock();
            buffer.push(LogRecord {
                at: Utc::now(),
                actor: actor.path(),
                kind: envelope.kind().to_string(),
                outcome,
            });
            buffer.len() >= self.config.batch_size
        };
        if should_flush {
            self.flush();
        }
    }

    /// Spawn the background flush tick; aborted by the system on stop.
    pub fn spawn_flush_task(interceptor: &Arc<Self>) -> JoinHandle<()> {
        let interceptor = Arc::clone(interceptor);
        let interval = interceptor.config.flush_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                interceptor.flush();
            }
        })
    }
}

impl Interceptor for LoggingInterceptor {
    fn after_process(
        &self,
        envelope: &Envelope,
        actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        self.record(actor, envelope, "ok");
        Ok(())
    }

    fn on_error(
        &self,
        _error: &HandlerError,
        envelope: &Envelope,
        actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        self.record(actor, envelope, "error");
        Ok(())
    }
}
