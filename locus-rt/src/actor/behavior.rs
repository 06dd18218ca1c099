// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::mailbox::MailboxConfig;
use crate::message::{Envelope, MessagePlan, PlanError};
use crate::supervisor::SupervisionPolicy;
use crate::util::Address;

/// Failure raised inside a behaviour handler.
///
/// Handler failures are internal: they route to supervision, never to the
/// message sender (an asking sender observes a derived error through its
/// ask, not this one).
#[derive(Debug, Clone, thiserror::Error)]
#[error("handler failure: {message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<PlanError> for HandlerError {
    fn from(error: PlanError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Borrowed view passed to `on_message` and `on_reply`.
pub struct MessageInput<'a> {
    /// The envelope being handled
    pub msg: &'a Envelope,

    /// The actor's current context (read-only; replace it via the plan)
    pub context: &'a Value,

    /// The actor's own address
    pub self_addr: &'a Address,
}

/// Borrowed view passed to `on_start`.
pub struct StartInput<'a> {
    /// The actor's initial context
    pub context: &'a Value,

    /// The actor's own address
    pub self_addr: &'a Address,
}

/// The contract every actor implements.
///
/// A behaviour holds no runtime-visible state: the JSON context lives in
/// the hosting cell, is passed in read-only, and is replaced atomically
/// through the returned plan. Restart recreates the behaviour from its
/// factory and resets the context to `initial_context()`.
///
/// Three shapes fit this one contract:
/// - *stateless routing*: `on_message` returns send/emit steps from `msg`
///   alone and never touches the context;
/// - *explicit-context*: `on_message` returns an update carrying the next
///   context (and optionally emits or a response);
/// - *machine-driven*: `on_message` feeds the message to an attached state
///   machine, stores its snapshot as the next context, and returns the
///   machine's emitted events as the emit list.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use locus_rt::actor::{Behavior, HandlerError, MessageInput};
/// use locus_rt::message::{ContextUpdate, MessagePlan};
/// use serde_json::{json, Value};
///
/// struct Counter;
///
/// #[async_trait]
/// impl Behavior for Counter {
///     fn initial_context(&self) -> Value {
///         json!({"count": 0})
///     }
///
///     async fn on_message(
///         &mut self,
///         input: MessageInput<'_>,
///     ) -> Result<MessagePlan, HandlerError> {
///         match input.msg.kind() {
///             "INCREMENT" => {
///                 let count = input.context["count"].as_i64().unwrap_or(0) + 1;
///                 Ok(MessagePlan::context(json!({"count": count})))
///             }
///             _ => Ok(MessagePlan::Noop),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior: Send + 'static {
    /// The context a fresh incarnation starts from.
    fn initial_context(&self) -> Value {
        Value::Null
    }

    /// Supervision policy for this actor; immutable after spawn.
    fn supervision(&self) -> SupervisionPolicy {
        SupervisionPolicy::default()
    }

    /// Mailbox configuration for this actor.
    fn mailbox(&self) -> MailboxConfig {
        MailboxConfig::default()
    }

    /// Runs once before the first message, after the actor is addressable.
    async fn on_start(&mut self, _input: StartInput<'_>) -> Result<MessagePlan, HandlerError> {
        Ok(MessagePlan::Noop)
    }

    /// Handles one envelope. Runs to completion before the next dequeue.
    async fn on_message(&mut self, input: MessageInput<'_>) -> Result<MessagePlan, HandlerError>;

    /// Handles the reply to an ask this actor issued via a plan `Ask` step.
    ///
    /// `key` is the `on_reply` key given in the ask instruction.
    async fn on_reply(
        &mut self,
        _key: &str,
        _input: MessageInput<'_>,
    ) -> Result<MessagePlan, HandlerError> {
        Ok(MessagePlan::Noop)
    }

    /// Runs as the actor stops, after the last handled message.
    async fn on_stop(&mut self, _context: &Value) {}
}

/// Factory recreating a behaviour for spawn and supervised restart.
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn Behavior> + Send + Sync>;

/// Wrap a concrete factory closure into a [`BehaviorFactory`].
pub fn factory_of<B, F>(factory: F) -> BehaviorFactory
where
    B: Behavior,
    F: Fn() -> B + Send + Sync + 'static,
{
    Arc::new(move || Box::new(factory()))
}
