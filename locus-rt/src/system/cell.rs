//! The per-actor cell: receive loop, plan application, supervision.
//!
//! One cell runs per actor on its own tokio task. The loop dequeues one
//! envelope at a time and runs the handler to completion before the next
//! dequeue, so state mutation needs no locking and per-actor serialisation
//! holds by construction.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::shared::{GuardianReport, StopReason, SystemShared};
use crate::actor::{
    interpret, ActorStatus, Behavior, BehaviorFactory, HandlerError, Lifecycle, MessageInput,
    SideEffect, StartInput,
};
use crate::events::EventBus;
use crate::interceptor::MessageContext;
use crate::mailbox::Mailbox;
use crate::message::{Envelope, MessagePlan};
use crate::supervisor::{Directive, RestartBackoff, SupervisionPolicy};
use crate::system::events::SystemEventKind;
use crate::util::{Address, CorrelationId};

/// Reply routing entry for an ask this actor issued from a plan.
struct PendingReply {
    key: String,
    deadline: Instant,
}

pub(crate) struct ActorCell {
    address: Address,
    factory: BehaviorFactory,
    behavior: Box<dyn Behavior>,
    context: Value,
    lifecycle: Lifecycle,
    mailbox: Mailbox,
    bus: EventBus,
    policy: SupervisionPolicy,
    restarts: RestartBackoff,
    pending_replies: HashMap<CorrelationId, PendingReply>,
    stop_rx: mpsc::UnboundedReceiver<StopReason>,
    status: Arc<RwLock<ActorStatus>>,
    shared: Arc<SystemShared>,
}

impl ActorCell {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: Address,
        factory: BehaviorFactory,
        behavior: Box<dyn Behavior>,
        context: Value,
        mailbox: Mailbox,
        bus: EventBus,
        policy: SupervisionPolicy,
        stop_rx: mpsc::UnboundedReceiver<StopReason>,
        status: Arc<RwLock<ActorStatus>>,
        shared: Arc<SystemShared>,
    ) -> Self {
        let restarts = policy.restart_tracker();
        Self {
            address,
            factory,
            behavior,
            context,
            lifecycle: Lifecycle::new(),
            mailbox,
            bus,
            policy,
            restarts,
            pending_replies: HashMap::new(),
            stop_rx,
            status,
            shared,
        }
    }

    /// The actor's receive loop. Runs until the actor stops.
    pub(crate) async fn run(mut self) {
        if !self.start_with_supervision().await {
            return;
        }

        loop {
            tokio::select! {
                biased;
                reason = self.stop_rx.recv() => {
                    let reason = reason.unwrap_or(StopReason::External);
                    self.shutdown(reason).await;
                    return;
                }
                received = self.mailbox.recv() => match received {
                    Some(envelope) => {
                        if !self.handle_envelope(envelope).await {
                            return;
                        }
                    }
                    None => {
                        self.shutdown(StopReason::External).await;
                        return;
                    }
                }
            }
        }
    }

    fn set_status(&mut self, status: ActorStatus) {
        if self.lifecycle.transition_to(status) {
            *self.status.write() = status;
        }
    }

    async fn start_with_supervision(&mut self) -> bool {
        match self.start_once().await {
            Ok(()) => {
                self.set_status(ActorStatus::Running);
                true
            }
            Err(error) => {
                warn!(actor = %self.address, %error, "on_start failed");
                match self.policy.decide(&error, &self.address) {
                    Directive::Resume => {
                        self.set_status(ActorStatus::Running);
                        true
                    }
                    Directive::Stop => {
                        self.shutdown(StopReason::Supervision).await;
                        false
                    }
                    Directive::Escalate => self.escalate(error.to_string()).await,
                    Directive::Restart => self.try_restart().await,
                }
            }
        }
    }

    async fn start_once(&mut self) -> Result<(), HandlerError> {
        let plan = {
            let input = StartInput {
                context: &self.context,
                self_addr: &self.address,
            };
            self.behavior.on_start(input).await?
        };
        self.apply_plan(plan, None).await
    }

    /// Handle one dequeued envelope. Returns whether the loop continues.
    async fn handle_envelope(&mut self, envelope: Envelope) -> bool {
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_queue_depth(self.mailbox.len() as u64);
        }

        let mut ctx = MessageContext::for_envelope(&envelope);
        let Some(envelope) =
            self.shared
                .interceptors
                .before_receive(envelope, &self.address, &mut ctx)
        else {
            return true; // filtered
        };

        self.expire_pending_replies();

        // An envelope answering an ask this actor issued routes to the
        // stored reply handler instead of on_message.
        let reply_key = envelope
            .correlation_id()
            .and_then(|id| self.pending_replies.remove(&id))
            .map(|pending| pending.key);

        let result = match reply_key {
            Some(key) => {
                let input = MessageInput {
                    msg: &envelope,
                    context: &self.context,
                    self_addr: &self.address,
                };
                self.behavior.on_reply(&key, input).await
            }
            None => {
                let input = MessageInput {
                    msg: &envelope,
                    context: &self.context,
                    self_addr: &self.address,
                };
                self.behavior.on_message(input).await
            }
        };

        match result {
            Ok(plan) => match self.apply_plan(plan, Some(&envelope)).await {
                Ok(()) => {
                    self.shared
                        .interceptors
                        .after_process(&envelope, &self.address, &mut ctx);
                    true
                }
                Err(error) => self.handle_failure(error, &envelope, &mut ctx).await,
            },
            Err(error) => self.handle_failure(error, &envelope, &mut ctx).await,
        }
    }

    /// Apply a plan's side-effects in canonical order.
    async fn apply_plan(
        &mut self,
        plan: MessagePlan,
        request: Option<&Envelope>,
    ) -> Result<(), HandlerError> {
        let effects = interpret(plan, request)?;

        for effect in effects {
            match effect {
                SideEffect::ReplaceContext(context) => {
                    self.context = context;
                }
                SideEffect::Send { to, msg } => {
                    let msg = if msg.sender().is_none() {
                        msg.with_sender(self.address.clone())
                    } else {
                        msg
                    };
                    if let Err(error) = self.shared.send_to(&to, msg).await {
                        warn!(from = %self.address, to = %to, %error, "plan send failed");
                    }
                }
                SideEffect::Respond { payload } => {
                    self.deliver_response(request, payload).await;
                }
                SideEffect::Emit(event) => {
                    if let Err(error) = self.bus.emit(&event) {
                        debug!(actor = %self.address, %error, "emit skipped");
                    }
                }
                SideEffect::Ask { to, msg, on_reply } => {
                    let correlation_id = CorrelationId::new();
                    self.pending_replies.insert(
                        correlation_id,
                        PendingReply {
                            key: on_reply,
                            deadline: Instant::now() + self.shared.config.ask.timeout,
                        },
                    );
                    let msg = msg
                        .with_correlation_id(correlation_id)
                        .with_sender(self.address.clone());
                    if let Err(error) = self.shared.send_to(&to, msg).await {
                        self.pending_replies.remove(&correlation_id);
                        warn!(from = %self.address, to = %to, %error, "plan ask failed");
                    }
                }
            }
        }
        Ok(())
    }

    async fn deliver_response(&mut self, request: Option<&Envelope>, payload: Value) {
        let Some(request) = request else { return };
        let reply = Envelope::response_to(request, payload);
        if reply.correlation_id().is_none() {
            return;
        }
        match request.sender() {
            Some(sender) => {
                let sender = sender.clone();
                if let Err(error) = self.shared.send_to(&sender, reply).await {
                    debug!(actor = %self.address, %error, "response undeliverable");
                }
            }
            None => {
                // No sender to route through; resolve the ask table directly.
                if let Some(correlation_id) = reply.correlation_id() {
                    self.shared.correlations.complete(correlation_id, reply);
                }
            }
        }
    }

    /// Drop reply routes whose deadline has passed; a reply arriving later
    /// falls through to on_message instead of a stale handler key.
    fn expire_pending_replies(&mut self) {
        let now = Instant::now();
        self.pending_replies.retain(|_, pending| pending.deadline > now);
    }

    async fn handle_failure(
        &mut self,
        error: HandlerError,
        envelope: &Envelope,
        ctx: &mut MessageContext,
    ) -> bool {
        warn!(actor = %self.address, %error, kind = envelope.kind(), "handler failed");
        self.shared
            .interceptors
            .on_error(&error, envelope, &self.address, ctx);

        match self.policy.decide(&error, &self.address) {
            Directive::Resume => true,
            Directive::Stop => {
                self.shutdown(StopReason::Supervision).await;
                false
            }
            Directive::Restart => self.try_restart().await,
            Directive::Escalate => self.escalate(error.to_string()).await,
        }
    }

    /// Restart with fresh behaviour and initial context, honouring the
    /// restart window and backoff. Returns whether the loop continues.
    async fn try_restart(&mut self) -> bool {
        loop {
            self.restarts.record_restart();
            if self.restarts.is_limit_exceeded() {
                let recent = self.restarts.restart_count();
                return self
                    .escalate(format!("restart limit exceeded ({recent} in window)"))
                    .await;
            }

            self.set_status(ActorStatus::Restarting);

            let delay = self.restarts.next_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            // Callers waiting on this incarnation will never get a reply.
            self.shared.correlations.fail_for_target(&self.address);
            self.pending_replies.clear();

            // Fresh bus: subscribers of the failed incarnation re-subscribe.
            self.bus.destroy();
            let bus = EventBus::new();
            if let Some(mut handle) = self.shared.cells.get_mut(&self.address) {
                handle.bus = bus.clone();
            }
            self.bus = bus;

            self.behavior = (self.factory)();
            self.context = self.behavior.initial_context();
            self.set_status(ActorStatus::Starting);

            self.shared.emit_system_event(
                SystemEventKind::ActorRestarted,
                json!({"address": self.address.path()}),
            );

            match self.start_once().await {
                Ok(()) => {
                    self.set_status(ActorStatus::Running);
                    return true;
                }
                Err(error) => {
                    warn!(actor = %self.address, %error, "on_start failed after restart");
                    match self.policy.decide(&error, &self.address) {
                        Directive::Resume => {
                            self.set_status(ActorStatus::Running);
                            return true;
                        }
                        Directive::Stop => {
                            self.shutdown(StopReason::Supervision).await;
                            return false;
                        }
                        Directive::Escalate => return self.escalate(error.to_string()).await,
                        Directive::Restart => continue,
                    }
                }
            }
        }
    }

    /// Forward the failure to the guardian and stop. Always returns false.
    async fn escalate(&mut self, error: String) -> bool {
        self.set_status(ActorStatus::Failed);
        self.shared.report_failure(GuardianReport {
            address: self.address.clone(),
            error,
        });
        self.shutdown(StopReason::Escalated).await;
        false
    }

    async fn shutdown(&mut self, reason: StopReason) {
        if self.lifecycle.status() != ActorStatus::Failed {
            self.set_status(ActorStatus::Stopping);
            self.shared.emit_system_event(
                SystemEventKind::ActorStopping,
                json!({"address": self.address.path()}),
            );
        }

        let discarded = self.mailbox.stop();
        if discarded > 0 {
            debug!(actor = %self.address, discarded, "mailbox drained on stop");
        }

        self.behavior.on_stop(&self.context).await;

        self.shared.correlations.fail_for_target(&self.address);
        self.shared.scheduler.cancel_for(&self.address);
        self.pending_replies.clear();
        self.bus.destroy();
        self.shared.directory.unregister(&self.address);

        self.set_status(ActorStatus::Stopped);
        self.shared.emit_system_event(
            SystemEventKind::ActorStopped,
            json!({"address": self.address.path(), "reason": reason.as_str()}),
        );
    }
}
