//! # locus-rt - Location-Transparent Actor Runtime
//!
//! Erlang/OTP-flavoured actor runtime for JSON-transparent messaging:
//! isolated actors communicating exclusively by asynchronous envelopes,
//! supervised by a guardian, and addressable by `actor://` URIs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use locus_rt::prelude::*;
//! use serde_json::json;
//!
//! // 1. Define a behaviour
//! struct Counter;
//!
//! #[async_trait::async_trait]
//! impl Behavior for Counter {
//!     fn initial_context(&self) -> serde_json::Value {
//!         json!({"count": 0})
//!     }
//!
//!     async fn on_message(
//!         &mut self,
//!         input: MessageInput<'_>,
//!     ) -> Result<MessagePlan, HandlerError> {
//!         match input.msg.kind() {
//!             "INCREMENT" => {
//!                 let count = input.context["count"].as_i64().unwrap_or(0) + 1;
//!                 Ok(MessagePlan::context(json!({"count": count})))
//!             }
//!             _ => Ok(MessagePlan::Noop),
//!         }
//!     }
//! }
//!
//! // 2. Run it
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::create(SystemConfig::default())?;
//!     system.start().await?;
//!
//!     let counter = system
//!         .spawn(|| Counter, SpawnOptions::new().with_kind("counter"))
//!         .await?;
//!
//!     system.send(&counter, Envelope::new("INCREMENT")).await?;
//!
//!     let reply = system
//!         .ask_default(&counter, Envelope::new("INCREMENT"))
//!         .await?;
//!     println!("counter now: {:?}", reply.field("payload"));
//!
//!     system.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Core Concepts
//!
//! - **Envelope**: a flat JSON object with a `type` discriminator and
//!   `_`-prefixed meta fields; validated at every boundary.
//! - **Behaviour**: one [`actor::Behavior`] implementation per actor; the
//!   handler reads its context and returns a declarative
//!   [`message::MessagePlan`] instead of performing side-effects.
//! - **Supervision**: failures route to the actor's
//!   [`supervisor::SupervisionPolicy`]; restarts are rate-limited and may
//!   back off; exceeding the window escalates to the guardian.
//! - **Location transparency**: actors are named by
//!   `actor://{node}/{type}/{id}` addresses resolved through the
//!   [`directory`], never by references.
//! - **Deterministic time**: delayed delivery goes through the
//!   [`timer`] actor, which runs on a virtual clock in test mode.
//!
//! # Module Organization
//!
//! ## Core
//! - [`message`] - envelopes, validation, message plans
//! - [`actor`] - behaviour contract, lifecycle, plan interpretation
//! - [`mailbox`] - bounded FIFO queues with overflow policies
//! - [`system`] - the actor system, guardian, configuration, errors
//!
//! ## Coordination
//! - [`ask`] - request/response correlation
//! - [`supervisor`] - directives, policies, restart backoff
//! - [`timer`] - virtualisable scheduled delivery
//! - [`directory`] - address resolution with a TTL/LRU cache
//!
//! ## Observation
//! - [`events`] - per-actor event bus
//! - [`interceptor`] - send/receive hook pipeline
//! - [`telemetry`] - metrics and logging interceptors

pub mod actor;
pub mod ask;
pub mod directory;
pub mod events;
pub mod interceptor;
pub mod mailbox;
pub mod message;
pub mod prelude;
pub mod supervisor;
pub mod system;
pub mod telemetry;
pub mod timer;
pub mod util;

// Re-export commonly used types
pub use actor::{Behavior, HandlerError, MessageInput, SideEffect, StartInput};
pub use ask::AskOptions;
pub use directory::{Directory, DirectoryConfig, Location};
pub use events::{EventBus, Subscription, EMIT_WILDCARD};
pub use interceptor::{Intercept, Interceptor, InterceptorOptions, InterceptorScope, MessageContext};
pub use mailbox::{MailboxConfig, Overflow};
pub use message::{ContextUpdate, DomainEvent, Envelope, MessagePlan};
pub use supervisor::{BackoffPolicy, Directive, SupervisionPolicy};
pub use system::{
    ActorSystem, AskError, SendError, SpawnError, SpawnOptions, SystemConfig, SystemError,
    SystemEventKind,
};
pub use timer::Scheduler;
pub use util::{Address, CorrelationId};
