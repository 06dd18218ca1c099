//! The actor system facade: lifecycle, spawn/stop, send/ask, subscribe.

// Layer 1: Standard library imports
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::cell::ActorCell;
use super::config::SystemConfig;
use super::errors::{AskError, SendError, SpawnError, SystemError};
use super::events::{SystemEvent, SystemEventKind};
use super::shared::{CellHandle, GuardianReport, StopReason, SystemShared, SystemState};
use crate::actor::{
    factory_of, ActorStatus, Behavior, BehaviorFactory, HandlerError, MessageInput,
};
use crate::ask::{AskFailure, AskOptions, CorrelationTable};
use crate::directory::{Directory, DirectoryStats, Location};
use crate::events::{EventBus, EventListener, Subscription};
use crate::interceptor::{
    Interceptor, InterceptorId, InterceptorOptions, InterceptorRegistry,
};
use crate::mailbox::{Mailbox, MailboxConfig, MailboxStatsSnapshot, Overflow};
use crate::message::{Envelope, MessagePlan};
use crate::supervisor::{BackoffPolicy, Directive, SupervisionPolicy};
use crate::telemetry::{
    ExportCallback, MetricsConfig, MetricsInterceptor, RuntimeMetrics,
};
use crate::timer::{Clock, Scheduler};
use crate::util::{Address, CorrelationId};

/// Options for `spawn`.
#[derive(Clone, Default)]
pub struct SpawnOptions {
    /// Explicit id segment; a UUID is synthesised when absent
    pub id: Option<String>,

    /// Actor type segment of the address (default "actor")
    pub kind: Option<String>,

    /// Spawn without supervision: any failure stops the actor
    pub unsupervised: bool,

    /// Mailbox override (otherwise the behaviour's configuration)
    pub mailbox: Option<MailboxConfig>,

    /// Supervision override (otherwise the behaviour's policy)
    pub supervision: Option<SupervisionPolicy>,
}

impl SpawnOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the id segment.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method: set the actor type segment.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Builder method: override the mailbox configuration.
    pub fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Builder method: override the supervision policy.
    pub fn with_supervision(mut self, supervision: SupervisionPolicy) -> Self {
        self.supervision = Some(supervision);
        self
    }

    /// Builder method: disable supervision (failures stop the actor).
    pub fn unsupervised(mut self) -> Self {
        self.unsupervised = true;
        self
    }
}

/// Point-in-time system counters.
#[derive(Debug, Clone)]
pub struct SystemStats {
    /// Whether the system is running
    pub running: bool,
    /// Live actors
    pub actors: usize,
    /// Stopped actors still in the registry
    pub stopped_actors: usize,
    /// Outstanding system-level asks
    pub pending_asks: usize,
    /// Pending timer entries
    pub scheduled_timers: usize,
    /// Directory counters
    pub directory: DirectoryStats,
}

/// Behaviour of the system-event actor: unwrap `EMIT_SYSTEM_EVENT`
/// envelopes and fan the event out on its own bus.
struct SystemEventsBehavior;

#[async_trait]
impl Behavior for SystemEventsBehavior {
    fn mailbox(&self) -> MailboxConfig {
        // Best-effort stream: never park lifecycle emitters, never fail them.
        MailboxConfig::new(1024, Overflow::Drop)
    }

    async fn on_message(&mut self, input: MessageInput<'_>) -> Result<MessagePlan, HandlerError> {
        match SystemEvent::from_envelope(input.msg) {
            Some(event) => Ok(MessagePlan::Emit(event.to_domain_event())),
            None => Ok(MessagePlan::Noop),
        }
    }
}

/// Location-transparent actor system.
///
/// Owns the guardian (root supervisor), the directory, the timer actor and
/// the system-event actor. Cheap to clone; all clones share one runtime.
///
/// # Example
/// ```rust,no_run
/// use locus_rt::prelude::*;
/// use serde_json::json;
///
/// # struct Echo;
/// # #[async_trait::async_trait]
/// # impl Behavior for Echo {
/// #     async fn on_message(&mut self, input: MessageInput<'_>) -> Result<MessagePlan, HandlerError> {
/// #         Ok(MessagePlan::Noop)
/// #     }
/// # }
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let system = ActorSystem::create(SystemConfig::default())?;
/// system.start().await?;
///
/// let address = system.spawn(|| Echo, SpawnOptions::new().with_kind("echo")).await?;
/// system.send(&address, Envelope::new("PING")).await?;
///
/// system.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    shared: Arc<SystemShared>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ActorSystem {
    /// Create a system from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid configuration value.
    pub fn create(config: SystemConfig) -> Result<Self, String> {
        config.validate()?;

        let system_events_addr = Address::new(&config.node_address, "system", "events")
            .map_err(|e| e.to_string())?;

        let interceptors = InterceptorRegistry::new();
        let metrics = if config.enable_metrics {
            let metrics = Arc::new(RuntimeMetrics::new(MetricsConfig::default()));
            interceptors.register(
                Arc::new(MetricsInterceptor::new(Arc::clone(&metrics))),
                InterceptorOptions::named("metrics").with_priority(1000),
            );
            Some(metrics)
        } else {
            None
        };

        // The scheduler's sink needs the shared state that owns the
        // scheduler; the slot breaks the construction cycle.
        let shared_slot: Arc<OnceLock<Weak<SystemShared>>> = Arc::new(OnceLock::new());
        let sink_slot = Arc::clone(&shared_slot);
        let scheduler = Scheduler::new(
            if config.virtual_clock {
                Clock::virtual_clock()
            } else {
                Clock::monotonic()
            },
            Arc::new(move |target: Address, envelope: Envelope| {
                let slot = Arc::clone(&sink_slot);
                Box::pin(async move {
                    if let Some(shared) = slot.get().and_then(Weak::upgrade) {
                        if let Err(error) = shared.send_to(&target, envelope).await {
                            debug!(target = %target, %error, "timer delivery failed");
                        }
                    }
                })
            }),
        );

        let directory = Directory::new(config.directory.clone());
        let shared = Arc::new(SystemShared {
            config,
            state: RwLock::new(SystemState::Created),
            cells: DashMap::new(),
            directory,
            interceptors,
            correlations: CorrelationTable::new(),
            scheduler,
            metrics,
            guardian_tx: RwLock::new(None),
            system_events_addr,
        });
        let _ = shared_slot.set(Arc::downgrade(&shared));

        Ok(Self {
            shared,
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Start the system: guardian, system-event actor, background tasks.
    ///
    /// # Errors
    ///
    /// [`SystemError::AlreadyStarted`] on a second call.
    pub async fn start(&self) -> Result<(), SystemError> {
        {
            let mut state = self.shared.state.write();
            if *state != SystemState::Created {
                return Err(SystemError::AlreadyStarted);
            }
            *state = SystemState::Running;
        }

        // Guardian: terminal handler for escalated failures.
        let (guardian_tx, mut guardian_rx) = mpsc::unbounded_channel::<GuardianReport>();
        *self.shared.guardian_tx.write() = Some(guardian_tx);
        let shared = Arc::clone(&self.shared);
        let guardian = tokio::spawn(async move {
            while let Some(report) = guardian_rx.recv().await {
                warn!(
                    actor = %report.address,
                    error = %report.error,
                    "failure escalated to guardian; stopping subtree"
                );
                shared.emit_system_event(
                    SystemEventKind::ActorFailed,
                    json!({"address": report.address.path(), "reason": report.error}),
                );
                if let Some(handle) = shared.cells.get(&report.address) {
                    let _ = handle.stop_tx.send(StopReason::Escalated);
                }
            }
        });
        self.tasks.lock().push(guardian);

        // System-event actor; lifecycle events are best-effort, so a spawn
        // failure degrades to silent no-op emits.
        let spawn_result = self
            .spawn_factory(
                factory_of(|| SystemEventsBehavior),
                SpawnOptions::new().with_kind("system").with_id("events"),
            )
            .await;
        if let Err(error) = spawn_result {
            warn!(%error, "system-event actor failed to spawn");
        }

        self.tasks.lock().push(self.shared.directory.spawn_cleanup());
        if !self.shared.config.virtual_clock {
            self.tasks.lock().push(self.shared.scheduler.spawn_delivery_task());
        }

        self.shared.emit_system_event(
            SystemEventKind::Started,
            json!({"node": self.shared.config.node_address}),
        );
        Ok(())
    }

    /// Stop the system: children breadth-first, then the guardian, then
    /// the system-event actor. Afterwards `is_running` is false and no
    /// handler can run.
    ///
    /// # Errors
    ///
    /// [`SystemError::NotRunning`] unless the system is running.
    pub async fn stop(&self) -> Result<(), SystemError> {
        {
            let mut state = self.shared.state.write();
            if *state != SystemState::Running {
                return Err(SystemError::NotRunning);
            }
            *state = SystemState::Stopping;
        }

        self.shared
            .emit_system_event(SystemEventKind::Stopping, json!({}));

        // Stop every child of the guardian except the system-event actor,
        // which must outlive them to fan out their lifecycle events.
        let children: Vec<Address> = self
            .shared
            .cells
            .iter()
            .filter(|entry| entry.key() != &self.shared.system_events_addr)
            .map(|entry| entry.key().clone())
            .collect();
        for address in &children {
            if let Some(handle) = self.shared.cells.get(address) {
                let _ = handle.stop_tx.send(StopReason::SystemShutdown);
            }
        }
        self.wait_until_stopped(&children).await;

        self.shared
            .emit_system_event(SystemEventKind::Stopped, json!({}));
        // Let the system-event actor drain the final events before it stops.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let events_addr = self.shared.system_events_addr.clone();
        if let Some(handle) = self.shared.cells.get(&events_addr) {
            let _ = handle.stop_tx.send(StopReason::SystemShutdown);
        }
        self.wait_until_stopped(std::slice::from_ref(&events_addr)).await;

        self.shared.correlations.fail_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        // Abort any cell task that ignored the stop deadline.
        for entry in self.shared.cells.iter() {
            if let Some(task) = entry.value().task.lock().take() {
                task.abort();
            }
        }
        self.shared.cells.clear();
        *self.shared.state.write() = SystemState::Stopped;
        Ok(())
    }

    /// Whether the system accepts spawns and sends.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Spawn an actor from a behaviour factory.
    ///
    /// The factory runs once now and again on every supervised restart, so
    /// restarts always begin from fresh behaviour state.
    ///
    /// # Errors
    ///
    /// See [`SpawnError`].
    pub async fn spawn<B, F>(
        &self,
        factory: F,
        options: SpawnOptions,
    ) -> Result<Address, SpawnError>
    where
        B: Behavior,
        F: Fn() -> B + Send + Sync + 'static,
    {
        self.spawn_factory(factory_of(factory), options).await
    }

    /// Spawn from an already-boxed behaviour factory.
    ///
    /// # Errors
    ///
    /// See [`SpawnError`].
    pub async fn spawn_factory(
        &self,
        factory: BehaviorFactory,
        options: SpawnOptions,
    ) -> Result<Address, SpawnError> {
        if !self.shared.is_running() {
            return Err(SpawnError::SystemNotRunning);
        }

        let max_actors = self.shared.config.max_actors;
        if max_actors > 0 {
            let current = self.live_actor_count();
            if current >= max_actors {
                return Err(SpawnError::ActorLimitExceeded {
                    current,
                    max: max_actors,
                });
            }
        }

        let behavior = factory();
        let mailbox_config = options.mailbox.unwrap_or_else(|| behavior.mailbox());
        let policy = if options.unsupervised {
            SupervisionPolicy::always(Directive::Stop)
        } else {
            options
                .supervision
                .unwrap_or_else(|| behavior.supervision())
        };

        let kind = options.kind.as_deref().unwrap_or("actor");
        let id = options.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let address = Address::new(&self.shared.config.node_address, kind, id)?;
        if self.shared.cells.contains_key(&address) {
            return Err(SpawnError::AddressInUse(address));
        }

        let (mailbox, sender) = Mailbox::open(mailbox_config)?;
        let stats = mailbox.stats_handle();
        let bus = EventBus::new();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(ActorStatus::Starting));

        self.shared.cells.insert(
            address.clone(),
            CellHandle {
                sender,
                bus: bus.clone(),
                stop_tx,
                status: Arc::clone(&status),
                stats,
                capacity: mailbox_config.capacity,
                task: Mutex::new(None),
            },
        );
        self.shared.directory.register(
            address.clone(),
            Location::local(&self.shared.config.node_address),
        );

        let context = behavior.initial_context();
        let cell = ActorCell::new(
            address.clone(),
            factory,
            behavior,
            context,
            mailbox,
            bus,
            policy,
            stop_rx,
            status,
            Arc::clone(&self.shared),
        );
        let task = tokio::spawn(cell.run());
        if let Some(handle) = self.shared.cells.get(&address) {
            *handle.task.lock() = Some(task);
        }

        self.shared.emit_system_event(
            SystemEventKind::ActorSpawned,
            json!({"address": address.path()}),
        );
        Ok(address)
    }

    /// Stop one actor and wait for it to finish.
    ///
    /// # Errors
    ///
    /// [`SystemError::NoSuchActor`] for unknown addresses,
    /// [`SystemError::StopTimeout`] if it does not stop in time.
    pub async fn stop_actor(&self, address: &Address) -> Result<(), SystemError> {
        let Some(handle) = self.shared.cells.get(address) else {
            return Err(SystemError::NoSuchActor(address.clone()));
        };
        if *handle.status.read() == ActorStatus::Stopped {
            return Ok(());
        }
        let _ = handle.stop_tx.send(StopReason::External);
        drop(handle);

        let deadline = Instant::now() + self.shared.config.stop_timeout;
        loop {
            match self.actor_status(address) {
                Some(ActorStatus::Stopped) | None => return Ok(()),
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(SystemError::StopTimeout(self.shared.config.stop_timeout));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Fire-and-forget send. Returns once the envelope is enqueued (or
    /// refused); never waits on handler execution.
    ///
    /// # Errors
    ///
    /// See [`SendError`].
    pub async fn send(&self, target: &Address, envelope: Envelope) -> Result<(), SendError> {
        self.shared.send_to(target, envelope).await
    }

    /// Correlated request/response with timeout and retries.
    ///
    /// Each attempt stamps the same correlation id, waits up to
    /// `options.timeout`, and on expiry retries after an exponentially
    /// growing, jittered delay. Dropping the returned future cancels the
    /// exchange including pending retries.
    ///
    /// # Errors
    ///
    /// See [`AskError`].
    pub async fn ask(
        &self,
        target: &Address,
        envelope: Envelope,
        options: AskOptions,
    ) -> Result<Envelope, AskError> {
        let correlation_id = CorrelationId::new();
        let reply_to = Address::new(
            &self.shared.config.node_address,
            "system",
            format!("ask-{correlation_id}"),
        )
        .unwrap_or_else(|_| Address::anonymous(&self.shared.config.node_address, "system"));

        let backoff = BackoffPolicy::exponential(options.retry_delay, 2.0).with_jitter();
        let max_attempts = options.retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let rx = self.shared.correlations.register(correlation_id, target.clone());
            let request = envelope
                .clone()
                .with_correlation_id(correlation_id)
                .with_sender(reply_to.clone());

            if let Err(error) = self.shared.send_to(target, request).await {
                self.shared.correlations.remove(correlation_id);
                return Err(AskError::Send(error));
            }

            match tokio::time::timeout(options.timeout, rx).await {
                Ok(Ok(Ok(reply))) => return Ok(reply),
                Ok(Ok(Err(AskFailure::ActorStopped))) => {
                    return Err(AskError::ActorStopped(target.clone()));
                }
                Ok(Err(_)) => {
                    // Resolver dropped without resolution.
                    return Err(AskError::ActorStopped(target.clone()));
                }
                Err(_) => {
                    self.shared.correlations.remove(correlation_id);
                    if attempt >= max_attempts {
                        return Err(AskError::Timeout {
                            target: target.clone(),
                            timeout: options.timeout,
                            attempts: attempt,
                        });
                    }
                    tokio::time::sleep(backoff.jittered_delay_for(attempt)).await;
                }
            }
        }
    }

    /// Ask with the system's configured defaults.
    ///
    /// # Errors
    ///
    /// See [`AskError`].
    pub async fn ask_default(
        &self,
        target: &Address,
        envelope: Envelope,
    ) -> Result<Envelope, AskError> {
        self.ask(target, envelope, self.shared.config.ask).await
    }

    /// Subscribe to an actor's emitted events (`EMIT:*` or `EMIT:{TYPE}`).
    ///
    /// # Errors
    ///
    /// [`SystemError::NoSuchActor`] or a bus error after destroy.
    pub fn subscribe(
        &self,
        address: &Address,
        key: &str,
        listener: EventListener,
    ) -> Result<Subscription, SystemError> {
        let handle = self
            .shared
            .cells
            .get(address)
            .ok_or_else(|| SystemError::NoSuchActor(address.clone()))?;
        Ok(handle.bus.subscribe(key, listener)?)
    }

    /// Register an interceptor.
    pub fn register_interceptor(
        &self,
        interceptor: Arc<dyn Interceptor>,
        options: InterceptorOptions,
    ) -> InterceptorId {
        self.shared.interceptors.register(interceptor, options)
    }

    /// Remove an interceptor registration.
    pub fn unregister_interceptor(&self, id: InterceptorId) -> bool {
        self.shared.interceptors.unregister(id)
    }

    /// The interceptor registry.
    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.shared.interceptors
    }

    /// The directory.
    pub fn directory(&self) -> &Directory {
        &self.shared.directory
    }

    /// The timer actor.
    pub fn timer(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// Runtime metrics, when enabled.
    pub fn metrics(&self) -> Option<&Arc<RuntimeMetrics>> {
        self.shared.metrics.as_ref()
    }

    /// Start the periodic metrics export tick. Returns false when metrics
    /// are disabled.
    pub fn export_metrics_every(&self, interval: Duration, callback: ExportCallback) -> bool {
        match &self.shared.metrics {
            Some(metrics) => {
                self.tasks.lock().push(crate::telemetry::metrics::spawn_export_task(
                    Arc::clone(metrics),
                    interval,
                    callback,
                ));
                true
            }
            None => false,
        }
    }

    /// Address of the system-event actor; subscribe here for lifecycle
    /// events (`EMIT:actorSpawned`, `EMIT:*`, ...).
    pub fn system_events_address(&self) -> &Address {
        &self.shared.system_events_addr
    }

    /// Status of an actor, if known.
    pub fn actor_status(&self, address: &Address) -> Option<ActorStatus> {
        self.shared
            .cells
            .get(address)
            .map(|handle| *handle.status.read())
    }

    /// Mailbox statistics of an actor, if known.
    pub fn mailbox_stats(&self, address: &Address) -> Option<MailboxStatsSnapshot> {
        self.shared
            .cells
            .get(address)
            .map(|handle| handle.stats.snapshot(handle.capacity))
    }

    /// System counters.
    pub fn stats(&self) -> SystemStats {
        let mut actors = 0;
        let mut stopped_actors = 0;
        for entry in self.shared.cells.iter() {
            if entry.value().is_stopped() {
                stopped_actors += 1;
            } else {
                actors += 1;
            }
        }
        SystemStats {
            running: self.is_running(),
            actors,
            stopped_actors,
            pending_asks: self.shared.correlations.len(),
            scheduled_timers: self.shared.scheduler.len(),
            directory: self.shared.directory.stats(),
        }
    }

    fn live_actor_count(&self) -> usize {
        self.shared
            .cells
            .iter()
            .filter(|entry| !entry.value().is_stopped())
            .count()
    }

    async fn wait_until_stopped(&self, addresses: &[Address]) {
        let deadline = Instant::now() + self.shared.config.stop_timeout;
        loop {
            let all_stopped = addresses.iter().all(|address| {
                matches!(self.actor_status(address), Some(ActorStatus::Stopped) | None)
            });
            if all_stopped {
                return;
            }
            if Instant::now() >= deadline {
                warn!("actors did not stop within the deadline; continuing shutdown");
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
