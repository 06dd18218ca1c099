//! Boundary validation for envelopes.
//!
//! Validation runs at `send` ingress and again when an envelope is
//! materialised from a transport. Invalid envelopes are reported to the
//! caller and never enqueued.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::envelope::Envelope;

/// Maximum nesting depth accepted in a payload value.
///
/// Guards the boundary against pathological nesting from untrusted
/// transports; well-formed application payloads stay far below this.
pub const MAX_PAYLOAD_DEPTH: usize = 64;

/// A single validation failure found in an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// The `type` discriminator was missing or empty
    #[error("envelope type must be a non-empty string")]
    EmptyType,

    /// A payload field used the reserved `_` prefix
    #[error("payload field '{key}' uses the reserved '_' prefix")]
    ReservedKey { key: String },

    /// A payload value nested deeper than [`MAX_PAYLOAD_DEPTH`]
    #[error("payload field '{key}' exceeds maximum nesting depth")]
    TooDeep { key: String },

    /// The transport value was not a JSON object
    #[error("envelope must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

fn depth_of(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth_of).max().unwrap_or(0),
        _ => 1,
    }
}

/// Validate an envelope for transport.
///
/// Rules: `type` is a non-empty string, no payload field uses the reserved
/// `_` prefix, and no payload value nests beyond [`MAX_PAYLOAD_DEPTH`].
/// Payload values are `serde_json::Value`, so JSON-transparency (no
/// closures, dates, or cyclic graphs) holds by construction; these checks
/// cover what the type system cannot.
///
/// # Errors
///
/// Returns every violation found, not just the first.
pub fn validate_for_transport(envelope: &Envelope) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    if envelope.kind().is_empty() {
        violations.push(Violation::EmptyType);
    }

    for (key, value) in envelope.payload() {
        if key.starts_with('_') {
            violations.push(Violation::ReservedKey { key: key.clone() });
        }
        if depth_of(value) > MAX_PAYLOAD_DEPTH {
            violations.push(Violation::TooDeep { key: key.clone() });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Materialise an envelope from a transport-level JSON value.
///
/// Applies the same validation as [`validate_for_transport`] after
/// deserialisation, so transports cannot smuggle malformed envelopes past
/// the boundary.
///
/// # Errors
///
/// Returns the violations found; a value that is not an object or lacks a
/// string `type` maps to the corresponding violation.
pub fn envelope_from_value(value: Value) -> Result<Envelope, Vec<Violation>> {
    let found = match &value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    if found != "object" {
        return Err(vec![Violation::NotAnObject { found }]);
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|_| vec![Violation::EmptyType])?;

    validate_for_transport(&envelope)?;
    Ok(envelope)
}
