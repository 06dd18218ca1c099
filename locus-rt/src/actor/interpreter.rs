//! Lowering of message plans to ordered side-effects.
//!
//! The interpreter turns a handler's [`MessagePlan`] into a flat list of
//! [`SideEffect`]s in the canonical application order: context replacement,
//! sends, response, emits, asks. Within each group the plan's textual order
//! is preserved, so interpretation is deterministic.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use crate::message::{DomainEvent, Envelope, MessagePlan, PlanError};
use crate::util::Address;

/// One primitive effect produced from a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Replace the actor's context atomically
    ReplaceContext(Value),

    /// Enqueue an envelope to another actor
    Send {
        /// Target address
        to: Address,
        /// Envelope to deliver
        msg: Envelope,
    },

    /// Reply to the correlated request being handled
    Respond {
        /// Reply payload
        payload: Value,
    },

    /// Fan a domain event out on the actor's bus
    Emit(DomainEvent),

    /// Register an ask and send its request envelope
    Ask {
        /// Target address
        to: Address,
        /// Request envelope
        msg: Envelope,
        /// Handler key routed to `Behavior::on_reply`
        on_reply: String,
    },
}

#[derive(Default)]
struct Buckets {
    context: Option<Value>,
    context_from_update: bool,
    sends: Vec<SideEffect>,
    response: Option<Value>,
    emits: Vec<SideEffect>,
    asks: Vec<SideEffect>,
}

fn collect(plan: MessagePlan, buckets: &mut Buckets) {
    match plan {
        MessagePlan::Noop => {}
        MessagePlan::Emit(event) => buckets.emits.push(SideEffect::Emit(event)),
        MessagePlan::EmitAll(events) => buckets
            .emits
            .extend(events.into_iter().map(SideEffect::Emit)),
        MessagePlan::Send { to, msg } => buckets.sends.push(SideEffect::Send { to, msg }),
        MessagePlan::Ask { to, msg, on_reply } => {
            buckets.asks.push(SideEffect::Ask { to, msg, on_reply });
        }
        MessagePlan::Update(update) => {
            if let Some(context) = update.context {
                buckets.context = Some(context);
                buckets.context_from_update = true;
            }
            buckets
                .emits
                .extend(update.emit.into_iter().map(SideEffect::Emit));
            if let Some(response) = update.response {
                buckets.response = Some(response);
            }
        }
        MessagePlan::Steps(steps) => {
            for step in steps {
                collect(step, buckets);
            }
        }
    }
}

/// Interpret a validated plan against the message being handled.
///
/// `request` is the envelope whose handling produced the plan, used for the
/// smart-default response: when it carries a correlation id and the plan
/// replaced the context through an update without an explicit response, the
/// new context becomes the reply payload. An explicit response always wins.
///
/// # Errors
///
/// Propagates [`PlanError`] from shape validation; the caller treats that
/// as a handler failure.
pub fn interpret(plan: MessagePlan, request: Option<&Envelope>) -> Result<Vec<SideEffect>, PlanError> {
    plan.validate()?;

    let mut buckets = Buckets::default();
    collect(plan, &mut buckets);

    let correlated = request.is_some_and(|env| env.correlation_id().is_some());
    let response = match (buckets.response, correlated) {
        (Some(payload), true) => Some(payload),
        (None, true) if buckets.context_from_update => buckets.context.clone(),
        _ => None,
    };

    let mut effects = Vec::new();
    if let Some(context) = buckets.context {
        effects.push(SideEffect::ReplaceContext(context));
    }
    effects.extend(buckets.sends);
    if let Some(payload) = response {
        effects.push(SideEffect::Respond { payload });
    }
    effects.extend(buckets.emits);
    effects.extend(buckets.asks);
    Ok(effects)
}
