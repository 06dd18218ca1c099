// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::str::FromStr;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// URI scheme prefix for actor paths.
pub const ACTOR_SCHEME: &str = "actor://";

/// Location-independent identifier of an actor.
///
/// An address names an actor by `node`, `kind` (the actor type segment) and
/// `id`, rendered as the URI `actor://{node}/{kind}/{id}`. Addresses are
/// immutable and survive restarts: a restarted actor keeps its address even
/// though its state is reset.
///
/// # Grammar
///
/// All three segments must be non-empty and URL-safe (alphanumeric plus
/// `-`, `_`, `.`, `~`). Segments never contain `/`.
///
/// # Example
/// ```rust
/// use locus_rt::util::Address;
///
/// let addr = Address::new("local", "worker", "w-1").unwrap();
/// assert_eq!(addr.path(), "actor://local/worker/w-1");
///
/// let parsed: Address = "actor://local/worker/w-1".parse().unwrap();
/// assert_eq!(parsed, addr);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    node: String,
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

/// Errors from parsing or constructing an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// Path did not begin with the `actor://` scheme
    #[error("Address must start with '{ACTOR_SCHEME}': {0}")]
    MissingScheme(String),

    /// Path did not contain exactly node/kind/id segments
    #[error("Address must have node/type/id segments: {0}")]
    MalformedPath(String),

    /// A segment was empty or contained unsafe characters
    #[error("Address segment '{segment}' is not URL-safe: {value}")]
    UnsafeSegment {
        segment: &'static str,
        value: String,
    },
}

fn is_url_safe(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

impl Address {
    /// Create a new address, validating every segment.
    ///
    /// # Errors
    ///
    /// Returns [`AddressParseError::UnsafeSegment`] if any segment is empty
    /// or contains characters outside the URL-safe set.
    pub fn new(
        node: impl Into<String>,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, AddressParseError> {
        let node = node.into();
        let kind = kind.into();
        let id = id.into();

        for (segment, value) in [("node", &node), ("type", &kind), ("id", &id)] {
            if !is_url_safe(value) {
                return Err(AddressParseError::UnsafeSegment {
                    segment,
                    value: value.clone(),
                });
            }
        }

        Ok(Self { node, kind, id })
    }

    /// Create an address with a freshly generated UUID id.
    ///
    /// Used when `spawn` is called without an explicit id.
    pub fn anonymous(node: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            kind: kind.into(),
            id: Uuid::new_v4().to_string(),
        }
    }

    /// The node segment of the address.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The actor type segment of the address.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id segment of the address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Render the full `actor://` URI path.
    pub fn path(&self) -> String {
        format!("{ACTOR_SCHEME}{}/{}/{}", self.node, self.kind, self.id)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(ACTOR_SCHEME)
            .ok_or_else(|| AddressParseError::MissingScheme(s.to_string()))?;

        let mut segments = rest.split('/');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(node), Some(kind), Some(id), None) => Self::new(node, kind, id),
            _ => Err(AddressParseError::MalformedPath(s.to_string())),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_new() {
        let addr = Address::new("local", "worker", "w-1").unwrap();

        assert_eq!(addr.node(), "local");
        assert_eq!(addr.kind(), "worker");
        assert_eq!(addr.id(), "w-1");
    }

    #[test]
    fn test_address_path() {
        let addr = Address::new("node-a", "cache", "c.7").unwrap();
        assert_eq!(addr.path(), "actor://node-a/cache/c.7");
    }

    #[test]
    fn test_address_parse_roundtrip() {
        let addr = Address::new("local", "worker", "w-1").unwrap();
        let parsed: Address = addr.path().parse().unwrap();

        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_address_parse_missing_scheme() {
        let result: Result<Address, _> = "local/worker/w-1".parse();
        assert!(matches!(result, Err(AddressParseError::MissingScheme(_))));
    }

    #[test]
    fn test_address_parse_too_few_segments() {
        let result: Result<Address, _> = "actor://local/worker".parse();
        assert!(matches!(result, Err(AddressParseError::MalformedPath(_))));
    }

    #[test]
    fn test_address_parse_too_many_segments() {
        let result: Result<Address, _> = "actor://local/worker/w-1/extra".parse();
        assert!(matches!(result, Err(AddressParseError::MalformedPath(_))));
    }

    #[test]
    fn test_address_rejects_empty_segment() {
        let result = Address::new("local", "", "w-1");
        assert!(matches!(
            result,
            Err(AddressParseError::UnsafeSegment { segment: "type", .. })
        ));
    }

    #[test]
    fn test_address_rejects_unsafe_characters() {
        let result = Address::new("local", "worker", "w 1");
        assert!(matches!(
            result,
            Err(AddressParseError::UnsafeSegment { segment: "id", .. })
        ));
    }

    #[test]
    fn test_anonymous_address_unique() {
        let a = Address::anonymous("local", "worker");
        let b = Address::anonymous("local", "worker");

        assert_ne!(a, b);
        assert_eq!(a.node(), b.node());
        assert_eq!(a.kind(), b.kind());
    }

    #[test]
    fn test_address_serde_roundtrip() {
        let addr = Address::new("local", "worker", "w-1").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();

        assert_eq!(back, addr);
    }
}
