//! Strongly-typed identifiers.
//!
//! Identifiers wrap a ULID so they sort by creation time, which keeps
//! persisted transcripts and grounding documents in insertion order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when an identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Name of the identifier type.
    pub id_type: &'static str,
    /// Why parsing failed.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a fresh identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Wraps an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Identifies one chat session (one transcript).
    SessionId,
    "sess"
);

define_id!(
    /// Identifies one persisted transcript message.
    MessageId,
    "msg"
);

define_id!(
    /// Identifies a grounding document in the document store.
    DocumentId,
    "doc"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_has_prefix() {
        assert!(SessionId::new().to_string().starts_with("sess_"));
    }

    #[test]
    fn parse_accepts_prefixed_and_raw_forms() {
        let id = DocumentId::new();
        let prefixed: DocumentId = id.to_string().parse().expect("prefixed");
        let raw: DocumentId = id.as_ulid().to_string().parse().expect("raw");
        assert_eq!(id, prefixed);
        assert_eq!(id, raw);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "msg_not-a-ulid".parse::<MessageId>().unwrap_err();
        assert_eq!(err.id_type, "MessageId");
    }

    #[test]
    fn ids_order_by_creation() {
        let first = MessageId::from_ulid(Ulid::from_parts(1, 0));
        let second = MessageId::from_ulid(Ulid::from_parts(2, 0));
        assert!(first < second);
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
    }
}
