// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier correlating a request with its reply.
///
/// # Uniqueness
/// Uses UUID v4 (128 bits of randomness) so ids never collide across
/// concurrent asks, even between nodes.
///
/// # Example
/// ```rust
/// use locus_rt::util::CorrelationId;
///
/// let id1 = CorrelationId::new();
/// let id2 = CorrelationId::new();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a correlation id from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a correlation id from its string form.
    ///
    /// Returns `None` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a scheduled timer entry.
///
/// Callers may supply their own string id when scheduling; this type covers
/// the generated case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(Uuid);

impl TimerId {
    /// Generate a new random timer id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_uniqueness() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_correlation_id_parse_roundtrip() {
        let id = CorrelationId::new();
        let parsed = CorrelationId::parse(&id.to_string());

        assert_eq!(parsed, Some(id));
    }

    #[test]
    fn test_correlation_id_parse_invalid() {
        assert_eq!(CorrelationId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_correlation_id_default() {
        let id = CorrelationId::default();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_timer_id_uniqueness() {
        let id1 = TimerId::new();
        let id2 = TimerId::new();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_timer_id_display() {
        let id = TimerId::new();
        let display = format!("{id}");

        assert!(display.contains('-')); // UUID format
    }
}
