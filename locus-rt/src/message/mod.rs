//! JSON-transparent message system.
//!
//! Provides the envelope and domain-event types carried by the runtime,
//! boundary validation for transport, and the declarative message plan
//! returned by behaviour handlers.

pub mod envelope;
pub mod plan;
pub mod validate;

pub use envelope::{
    DomainEvent, Envelope, ACTOR_FAILED_TYPE, EMIT_SYSTEM_EVENT_TYPE, RESPONSE_TYPE,
};
pub use plan::{ContextUpdate, MessagePlan, PlanError};
pub use validate::{envelope_from_value, validate_for_transport, Violation};
