// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use crate::util::{Address, CorrelationId};

/// Reserved envelope type for correlated replies.
pub const RESPONSE_TYPE: &str = "RESPONSE";

/// Reserved envelope type for supervision escalation.
pub const ACTOR_FAILED_TYPE: &str = "ACTOR_FAILED";

/// Reserved envelope type for system lifecycle events.
pub const EMIT_SYSTEM_EVENT_TYPE: &str = "EMIT_SYSTEM_EVENT";

/// JSON-transparent message carried by the runtime.
///
/// An envelope is a flat JSON object with a required string discriminator
/// `type`, the reserved `_`-prefixed envelope fields, and arbitrary
/// JSON-valued payload fields. The struct serializes to exactly that wire
/// form: meta fields under their `_` names and the payload flattened in.
///
/// # Example
/// ```rust
/// use locus_rt::message::Envelope;
/// use serde_json::json;
///
/// let env = Envelope::new("ORDER_PLACED")
///     .with_field("orderId", json!("o-42"))
///     .with_field("amount", json!(12.5))
///     .stamped();
///
/// assert_eq!(env.kind(), "ORDER_PLACED");
/// assert_eq!(env.field("orderId"), Some(&json!("o-42")));
///
/// let wire = serde_json::to_value(&env).unwrap();
/// assert_eq!(wire["type"], "ORDER_PLACED");
/// assert_eq!(wire["orderId"], "o-42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type discriminator
    #[serde(rename = "type")]
    kind: String,

    /// Creation timestamp in epoch milliseconds
    #[serde(rename = "_timestamp", skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,

    /// Protocol version tag
    #[serde(rename = "_version", skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    /// Address of the sending actor, for reply routing
    #[serde(rename = "_sender", skip_serializing_if = "Option::is_none")]
    sender: Option<Address>,

    /// Correlation id for request/response exchanges
    #[serde(rename = "_correlationId", skip_serializing_if = "Option::is_none")]
    correlation_id: Option<CorrelationId>,

    /// JSON payload fields (flattened into the wire object)
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Envelope {
    /// Create a new envelope with the given type and an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: None,
            version: None,
            sender: None,
            correlation_id: None,
            payload: Map::new(),
        }
    }

    /// Build a `RESPONSE` envelope answering a correlated request.
    ///
    /// Carries the request's correlation id; the reply payload lands under
    /// the `payload` field. Returns a plain envelope without correlation if
    /// the request carried none (callers treat that as fire-and-forget).
    pub fn response_to(request: &Envelope, payload: Value) -> Self {
        let mut reply = Self::new(RESPONSE_TYPE).with_field("payload", payload);
        reply.correlation_id = request.correlation_id;
        reply.stamped()
    }

    /// Builder method: set the sender address.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builder method: set the correlation id.
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Builder method: set the version tag.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Builder method: add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Builder method: stamp the current time as `_timestamp`.
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now().timestamp_millis());
        self
    }

    /// Message type discriminator.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Creation timestamp in epoch milliseconds, if stamped.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Protocol version tag, if present.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Address of the sending actor, if stamped.
    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Correlation id, if this envelope is part of an ask exchange.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Payload fields (everything that is not a `_`-prefixed meta field).
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Look up a single payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Whether this envelope is a correlated reply.
    pub fn is_reply(&self) -> bool {
        self.kind == RESPONSE_TYPE && self.correlation_id.is_some()
    }

    pub(crate) fn set_sender(&mut self, sender: Address) {
        self.sender = Some(sender);
    }

    pub(crate) fn set_correlation_id(&mut self, id: CorrelationId) {
        self.correlation_id = Some(id);
    }
}

/// Emitted event intended for fan-out subscribers, never for a mailbox.
///
/// A domain event is the same flat JSON shape as an envelope payload: a
/// `type` discriminator plus JSON fields.
///
/// # Example
/// ```rust
/// use locus_rt::message::DomainEvent;
/// use serde_json::json;
///
/// let event = DomainEvent::new("TEMPERATURE_CHANGED").with_field("celsius", json!(21.5));
/// assert_eq!(event.kind(), "TEMPERATURE_CHANGED");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event type discriminator
    #[serde(rename = "type")]
    kind: String,

    /// JSON payload fields
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl DomainEvent {
    /// Create a new domain event with the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Builder method: add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Event type discriminator.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Payload fields.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Look up a single payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
