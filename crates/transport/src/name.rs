//! Hierarchical, slash-delimited names.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hierarchical, slash-delimited identifier used both to address requests
/// and to route responses.
///
/// Non-empty names are normalized to carry a leading slash. The empty name is
/// the "not set" value and never gains a slash, so records with unset name
/// fields serialize as empty strings. Names are append-only: once built they
/// are never mutated, only extended via [`child`](Self::child) or
/// [`join`](Self::join).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(String);

impl Name {
    /// Create a name, prepending a slash to non-empty input that lacks one.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() || name.starts_with('/') {
            Self(name)
        } else {
            Self(format!("/{name}"))
        }
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unset (empty) name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one component, e.g. a command tag or a sequence number.
    #[must_use]
    pub fn child(&self, component: impl fmt::Display) -> Self {
        Self(format!("{}/{component}", self.0))
    }

    /// Append every component of `suffix`.
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        Self(format!("{}{}", self.0, suffix.0))
    }

    /// Iterate over the name's components, skipping empty ones.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|component| !component.is_empty())
    }

    /// Whether `prefix` is a component-wise prefix of this name.
    ///
    /// `/a/bc` is not under `/a/b`; prefixes match only on component
    /// boundaries. Every name is under the empty prefix.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0 == prefix.0
            || self
                .0
                .strip_prefix(prefix.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Strip a component-wise `prefix`, returning the remainder.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        if prefix.0.is_empty() {
            return Some(self.clone());
        }
        if self.0 == prefix.0 {
            return Some(Self::default());
        }
        self.0
            .strip_prefix(prefix.0.as_str())
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| Self(rest.to_owned()))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}
