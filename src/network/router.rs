use std::{borrow::Borrow, fmt::Display};

use serde::{Deserialize, Serialize};

/// Identity of a router in a topology.
///
/// IDs are compared lexicographically; every engine walks routers and neighbors
/// in that order so that a given topology always produces the same rounds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouterId(String);

impl RouterId {
    /// Builds an ID from user input, trimming surrounding whitespace.
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(RouterId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RouterId {
    fn from(value: &str) -> Self {
        RouterId(value.to_string())
    }
}

impl From<String> for RouterId {
    fn from(value: String) -> Self {
        RouterId(value)
    }
}

impl Borrow<str> for RouterId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RouterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RouterId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RouterId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Display for RouterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implementing Serialize and Deserialize manually because they're used as map keys
// in table snapshots and must stay plain, non-blank strings.

impl Serialize for RouterId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RouterId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        RouterId::parse(&s).ok_or_else(|| serde::de::Error::custom("router ID must not be blank"))
    }
}
