//! Declarative message plans returned by behaviour handlers.
//!
//! A handler never performs side-effects directly: it returns a
//! [`MessagePlan`] describing context replacement, emits, sends, asks and
//! responses, which the runtime interprets in a fixed order after the
//! handler completes.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::envelope::{DomainEvent, Envelope};
use crate::util::Address;

/// Errors produced by plan shape validation.
///
/// Invalid plans are treated as handler failures and routed to supervision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// A `Steps` plan contained another `Steps` plan
    #[error("nested step lists are not allowed in a message plan")]
    NestedSteps,
}

/// Explicit-context handler result: a new context plus optional emits and
/// an optional explicit response.
///
/// When the handled message carried a correlation id and the update supplies
/// a new context without an explicit response, the runtime replies with the
/// new context ("smart default"); an explicit `response` always wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextUpdate {
    /// Replacement for the actor's context, applied atomically
    pub context: Option<Value>,

    /// Domain events to emit after the context is replaced
    pub emit: Vec<DomainEvent>,

    /// Explicit reply payload for a correlated request
    pub response: Option<Value>,
}

impl ContextUpdate {
    /// Create an empty update (no context change, no emits, no response).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the replacement context.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Builder method: append an emitted event.
    pub fn with_emit(mut self, event: DomainEvent) -> Self {
        self.emit.push(event);
        self
    }

    /// Builder method: set the explicit response payload.
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

/// The declarative return value of a behaviour handler.
///
/// # Example
/// ```rust
/// use locus_rt::message::{ContextUpdate, DomainEvent, MessagePlan};
/// use serde_json::json;
///
/// // No effect:
/// let noop = MessagePlan::Noop;
///
/// // Emit an event and replace the context:
/// let plan = MessagePlan::Update(
///     ContextUpdate::new()
///         .with_context(json!({"count": 1}))
///         .with_emit(DomainEvent::new("COUNTED")),
/// );
/// assert!(plan.validate().is_ok());
/// assert!(noop.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePlan {
    /// No effect
    Noop,

    /// Emit a single domain event to the actor's subscribers
    Emit(DomainEvent),

    /// Emit several domain events, in order
    EmitAll(Vec<DomainEvent>),

    /// Enqueue an envelope to another actor (fire-and-forget)
    Send {
        /// Target address
        to: Address,
        /// Envelope to deliver
        msg: Envelope,
    },

    /// Issue a correlated request; the reply routes to the named handler key
    Ask {
        /// Target address
        to: Address,
        /// Request envelope
        msg: Envelope,
        /// Handler key passed to `Behavior::on_reply` when the reply arrives
        on_reply: String,
    },

    /// Replace the context and optionally emit or respond
    Update(ContextUpdate),

    /// A flat list of plan steps, interpreted in textual order
    Steps(Vec<MessagePlan>),
}

impl MessagePlan {
    /// Convenience constructor for a send step.
    pub fn send(to: Address, msg: Envelope) -> Self {
        Self::Send { to, msg }
    }

    /// Convenience constructor for an ask step.
    pub fn ask(to: Address, msg: Envelope, on_reply: impl Into<String>) -> Self {
        Self::Ask {
            to,
            msg,
            on_reply: on_reply.into(),
        }
    }

    /// Convenience constructor for a context replacement.
    pub fn context(context: Value) -> Self {
        Self::Update(ContextUpdate::new().with_context(context))
    }

    /// Validate the plan shape before interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NestedSteps`] when a `Steps` plan contains
    /// another `Steps` plan; step lists must be flat.
    pub fn validate(&self) -> Result<(), PlanError> {
        if let Self::Steps(steps) = self {
            for step in steps {
                if matches!(step, Self::Steps(_)) {
                    return Err(PlanError::NestedSteps);
                }
            }
        }
        Ok(())
    }

    /// Whether the plan has no observable effect.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Noop => true,
            Self::EmitAll(events) => events.is_empty(),
            Self::Steps(steps) => steps.iter().all(Self::is_noop),
            Self::Update(update) => {
                update.context.is_none() && update.emit.is_empty() && update.response.is_none()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr() -> Address {
        Address::new("local", "worker", "w-1").unwrap()
    }

    #[test]
    fn test_noop_is_valid() {
        assert!(MessagePlan::Noop.validate().is_ok());
        assert!(MessagePlan::Noop.is_noop());
    }

    #[test]
    fn test_flat_steps_are_valid() {
        let plan = MessagePlan::Steps(vec![
            MessagePlan::Emit(DomainEvent::new("A")),
            MessagePlan::send(addr(), Envelope::new("PING")),
        ]);

        assert!(plan.validate().is_ok());
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_nested_steps_rejected() {
        let plan = MessagePlan::Steps(vec![MessagePlan::Steps(vec![MessagePlan::Noop])]);

        assert_eq!(plan.validate(), Err(PlanError::NestedSteps));
    }

    #[test]
    fn test_context_constructor() {
        let plan = MessagePlan::context(json!({"count": 3}));

        match plan {
            MessagePlan::Update(update) => {
                assert_eq!(update.context, Some(json!({"count": 3})));
                assert!(update.emit.is_empty());
                assert!(update.response.is_none());
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_update_is_noop() {
        assert!(MessagePlan::Update(ContextUpdate::new()).is_noop());
    }

    #[test]
    fn test_update_builder() {
        let update = ContextUpdate::new()
            .with_context(json!({"n": 1}))
            .with_emit(DomainEvent::new("CHANGED"))
            .with_response(json!("ok"));

        assert_eq!(update.context, Some(json!({"n": 1})));
        assert_eq!(update.emit.len(), 1);
        assert_eq!(update.response, Some(json!("ok")));
    }

    #[test]
    fn test_ask_constructor() {
        let plan = MessagePlan::ask(addr(), Envelope::new("QUERY"), "on_result");

        match plan {
            MessagePlan::Ask { on_reply, .. } => assert_eq!(on_reply, "on_result"),
            other => panic!("expected Ask, got {other:?}"),
        }
    }
}
