//! Observable system lifecycle events.
//!
//! Lifecycle events travel as `EMIT_SYSTEM_EVENT` envelopes addressed to
//! the system-event actor, which fans them out on its bus under the event
//! kind (`started`, `actorSpawned`, ...). When that actor is absent the
//! emit is a silent no-op.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// Layer 3: Internal module imports
use crate::message::{DomainEvent, Envelope, EMIT_SYSTEM_EVENT_TYPE};

/// Reserved field: event kind.
pub const FIELD_EVENT_TYPE: &str = "systemEventType";

/// Reserved field: emission timestamp (epoch millis).
pub const FIELD_TIMESTAMP: &str = "systemTimestamp";

/// Reserved field: event payload.
pub const FIELD_DATA: &str = "systemData";

/// Kinds of observable lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SystemEventKind {
    /// The system started
    Started,
    /// The system began stopping
    Stopping,
    /// The system finished stopping
    Stopped,
    /// An actor was spawned
    ActorSpawned,
    /// An actor began stopping
    ActorStopping,
    /// An actor finished stopping
    ActorStopped,
    /// An actor was restarted by supervision
    ActorRestarted,
    /// An actor failed terminally
    ActorFailed,
}

impl SystemEventKind {
    /// Wire name of the kind (camelCase).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ActorSpawned => "actorSpawned",
            Self::ActorStopping => "actorStopping",
            Self::ActorStopped => "actorStopped",
            Self::ActorRestarted => "actorRestarted",
            Self::ActorFailed => "actorFailed",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "actorSpawned" => Some(Self::ActorSpawned),
            "actorStopping" => Some(Self::ActorStopping),
            "actorStopped" => Some(Self::ActorStopped),
            "actorRestarted" => Some(Self::ActorRestarted),
            "actorFailed" => Some(Self::ActorFailed),
            _ => None,
        }
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One lifecycle event with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEvent {
    /// Event kind
    pub kind: SystemEventKind,

    /// Emission time
    pub timestamp: DateTime<Utc>,

    /// Payload (`{address?, reason?, ...}`)
    pub data: Value,
}

impl SystemEvent {
    /// Create an event stamped now.
    pub fn new(kind: SystemEventKind, data: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Wrap the event into its `EMIT_SYSTEM_EVENT` envelope.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(EMIT_SYSTEM_EVENT_TYPE)
            .with_field(FIELD_EVENT_TYPE, json!(self.kind.as_str()))
            .with_field(FIELD_TIMESTAMP, json!(self.timestamp.timestamp_millis()))
            .with_field(FIELD_DATA, self.data.clone())
            .stamped()
    }

    /// Extract an event from an `EMIT_SYSTEM_EVENT` envelope.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.kind() != EMIT_SYSTEM_EVENT_TYPE {
            return None;
        }
        let kind = envelope
            .field(FIELD_EVENT_TYPE)
            .and_then(Value::as_str)
            .and_then(SystemEventKind::parse)?;
        let millis = envelope
            .field(FIELD_TIMESTAMP)
            .and_then(Value::as_i64)
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
        let data = envelope.field(FIELD_DATA).cloned().unwrap_or(Value::Null);

        Some(Self {
            kind,
            timestamp,
            data,
        })
    }

    /// The bus-facing form: a domain event keyed by the event kind.
    pub fn to_domain_event(&self) -> DomainEvent {
        DomainEvent::new(self.kind.as_str())
            .with_field("timestamp", json!(self.timestamp.timestamp_millis()))
            .with_field("data", self.data.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(SystemEventKind::Started.as_str(), "started");
        assert_eq!(SystemEventKind::ActorSpawned.as_str(), "actorSpawned");
        assert_eq!(SystemEventKind::ActorFailed.as_str(), "actorFailed");
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [
            SystemEventKind::Started,
            SystemEventKind::Stopping,
            SystemEventKind::Stopped,
            SystemEventKind::ActorSpawned,
            SystemEventKind::ActorStopping,
            SystemEventKind::ActorStopped,
            SystemEventKind::ActorRestarted,
            SystemEventKind::ActorFailed,
        ] {
            assert_eq!(SystemEventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SystemEventKind::parse("unknown"), None);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let event = SystemEvent::new(
            SystemEventKind::ActorStopped,
            json!({"address": "actor://local/worker/w-1", "reason": "supervision-stop"}),
        );

        let envelope = event.to_envelope();
        assert_eq!(envelope.kind(), EMIT_SYSTEM_EVENT_TYPE);

        let back = SystemEvent::from_envelope(&envelope).unwrap();
        assert_eq!(back.kind, event.kind);
        assert_eq!(back.data, event.data);
    }

    #[test]
    fn test_from_envelope_rejects_other_types() {
        assert!(SystemEvent::from_envelope(&Envelope::new("PING")).is_none());
    }

    #[test]
    fn test_from_envelope_rejects_unknown_kind() {
        let envelope =
            Envelope::new(EMIT_SYSTEM_EVENT_TYPE).with_field(FIELD_EVENT_TYPE, json!("bogus"));
        assert!(SystemEvent::from_envelope(&envelope).is_none());
    }

    #[test]
    fn test_domain_event_form() {
        let event = SystemEvent::new(SystemEventKind::ActorRestarted, json!({"address": "a"}));
        let domain = event.to_domain_event();

        assert_eq!(domain.kind(), "actorRestarted");
        assert_eq!(domain.field("data"), Some(&json!({"address": "a"})));
    }
}
