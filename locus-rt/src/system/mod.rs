//! Actor system: guardian, lifecycle, spawn/stop, send/ask.
//!
//! [`ActorSystem`] is the single entry point: it owns the cell registry,
//! the directory, the timer actor, the interceptor registry and the
//! system-event actor. Every spawned actor is a child of the guardian,
//! which terminally handles escalated failures.

pub mod actor_system;
mod cell;
pub mod config;
pub mod errors;
pub mod events;
mod shared;

pub use actor_system::{ActorSystem, SpawnOptions, SystemStats};
pub use config::{
    StoppedSendPolicy, SystemConfig, SystemConfigBuilder, DEFAULT_NODE_ADDRESS,
    DEFAULT_STOP_TIMEOUT,
};
pub use errors::{AskError, SendError, SpawnError, SystemError};
pub use events::{SystemEvent, SystemEventKind};
