//! Convenience re-exports for the common public surface.
//!
//! ```rust
//! use locus_rt::prelude::*;
//! ```

pub use crate::actor::{Behavior, HandlerError, MessageInput, StartInput};
pub use crate::ask::AskOptions;
pub use crate::events::{EventListener, Subscription, EMIT_WILDCARD};
pub use crate::interceptor::{
    Intercept, Interceptor, InterceptorError, InterceptorOptions, InterceptorScope, MessageContext,
};
pub use crate::mailbox::{MailboxConfig, Overflow};
pub use crate::message::{ContextUpdate, DomainEvent, Envelope, MessagePlan};
pub use crate::supervisor::{BackoffPolicy, Directive, SupervisionPolicy};
pub use crate::system::{
    ActorSystem, AskError, SendError, SpawnError, SpawnOptions, StoppedSendPolicy, SystemConfig,
    SystemError, SystemEventKind,
};
pub use crate::util::{Address, CorrelationId};
