//! Utility types and helpers for the actor runtime

pub mod address;
pub mod ids;
pub mod serde_helpers;

pub use address::{Address, AddressParseError};
pub use ids::{CorrelationId, TimerId};
pub use serde_helpers::duration_serde;
