//! Newtype domain identifiers.
//!
//! Every resource that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`CharacterId`] with a [`RegexScriptId`] even though both are strings on
//! the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (host-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: host-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies one entry inside a worldbook (the host's `uid`).
    WorldbookEntryId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single outgoing request.
///
/// Generated fresh for every request and recorded on its tracing span so all
/// events emitted while serving one call can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (host names and file names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a character card.
    ///
    /// The host keys characters by their avatar file name (e.g. `"Seraphina.png"`);
    /// cards without an avatar fall back to the character name.
    CharacterId
}

string_id! {
    /// Names a worldbook (lorebook) file on the host.
    WorldbookName
}

string_id! {
    /// Names a generation preset.
    PresetName
}

string_id! {
    /// Names the API family a preset belongs to (e.g. `"openai"`, `"kobold"`).
    ApiName
}

string_id! {
    /// Identifies a regex script. Scripts without an explicit id are keyed by
    /// their script name.
    RegexScriptId
}

string_id! {
    /// Identifies a backup snapshot produced by the backend.
    BackupId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_rejects_empty() {
        assert!(CharacterId::new("").is_none());
        assert_eq!(
            CharacterId::new("alice.png").map(|id| id.to_string()),
            Some("alice.png".to_string())
        );
    }

    #[test]
    fn test_ids_serialize_as_bare_values() {
        let name = WorldbookName::new("Eldoria").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Eldoria\"");

        let entry = WorldbookEntryId::new(7);
        assert_eq!(serde_json::to_string(&entry).unwrap(), "7");
        let back: WorldbookEntryId = serde_json::from_str("7").unwrap();
        assert_eq!(back.as_u64(), 7);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new_random(), RequestId::new_random());
    }
}
