//! Behaviour contract, actor lifecycle, and plan interpretation.
//!
//! An actor is one [`Behavior`] implementation plus a JSON context owned by
//! the runtime. Handlers never mutate anything directly: they read the
//! context and return a [`crate::message::MessagePlan`], which the
//! interpreter lowers to ordered side-effects between dispatches. The
//! receive loop itself lives in [`crate::system`], where it has the routing
//! machinery in reach.
//!
//! # Components
//!
//! - [`Behavior`] - the handler seam all actors implement
//! - [`MessageInput`] / [`StartInput`] - borrowed views passed to handlers
//! - [`ActorStatus`] / [`Lifecycle`] - status machine and restart tracking
//! - [`interpreter`] - plan → side-effect lowering

pub mod behavior;
pub mod interpreter;
pub mod lifecycle;

pub use behavior::{factory_of, Behavior, BehaviorFactory, HandlerError, MessageInput, StartInput};
pub use interpreter::{interpret, SideEffect};
pub use lifecycle::{ActorStatus, Lifecycle};
