// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use crate::message::Envelope;
use crate::util::CorrelationId;

/// Per-exchange context flowing send → receive → after-process/on-error.
///
/// Carries an optional trace id, the exchange's correlation id, and a
/// mutable metadata map interceptors use to hand values to later hooks
/// (for example a start-time recorded in `before_receive` and read in
/// `after_process`).
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    trace_id: Option<String>,
    correlation_id: Option<CorrelationId>,
    metadata: Map<String, Value>,
}

impl MessageContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from an envelope's correlation id.
    pub fn for_envelope(envelope: &Envelope) -> Self {
        Self {
            trace_id: None,
            correlation_id: envelope.correlation_id(),
            metadata: Map::new(),
        }
    }

    /// Builder method: set the trace id.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Trace id, if set.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Correlation id of the exchange, if any.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Store a metadata value under the given key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Read a metadata value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Remove and return a metadata value.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    /// The whole metadata map.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_context() {
        let ctx = MessageContext::new();
        assert!(ctx.trace_id().is_none());
        assert!(ctx.correlation_id().is_none());
        assert!(ctx.metadata().is_empty());
    }

    #[test]
    fn test_for_envelope_picks_up_correlation() {
        let id = CorrelationId::new();
        let env = Envelope::new("QUERY").with_correlation_id(id);

        let ctx = MessageContext::for_envelope(&env);
        assert_eq!(ctx.correlation_id(), Some(id));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut ctx = MessageContext::new().with_trace_id("t-1");
        ctx.set("start_us", json!(42));

        assert_eq!(ctx.trace_id(), Some("t-1"));
        assert_eq!(ctx.get("start_us"), Some(&json!(42)));
        assert_eq!(ctx.take("start_us"), Some(json!(42)));
        assert!(ctx.get("start_us").is_none());
    }
}
