//! Entry identity derivation.
//!
//! An entry's identity decides whether it was already delivered. It must be
//! the same string for the same physical entry across fetches and restarts,
//! so no hashing or normalisation is applied.

use std::fmt;

use crate::feed::Entry;

/// Stable identifier of a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryIdentity(String);

impl EntryIdentity {
    /// Wrap a raw identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntryIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Derive the identity of an entry: guid, else link, else title.
///
/// An entry with none of the three gets the empty identity rather than
/// being dropped.
pub fn identity(entry: &Entry) -> EntryIdentity {
    let id = if !entry.guid.is_empty() {
        &entry.guid
    } else if !entry.link.is_empty() {
        &entry.link
    } else {
        &entry.title
    };
    EntryIdentity::new(id.as_str())
}
