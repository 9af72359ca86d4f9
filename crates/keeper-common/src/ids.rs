//! Typed ID wrappers for type safety across stream-keeper.
//!
//! [`StreamKey`] names one broadcast destination and [`RunId`] names one
//! supervised cohort, so the two can never be mixed up with plain strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Number of leading characters kept by [`StreamKey::redacted`].
const REDACTED_PREFIX_LEN: usize = 4;

/// Opaque token naming one broadcast destination.
///
/// The content is never interpreted; the only rule is that it is not blank.
/// Duplicate keys are legal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamKey(String);

impl StreamKey {
    /// Wrap a raw key, rejecting empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::invalid_input("stream key must not be empty"));
        }
        Ok(Self(raw))
    }

    /// The key exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A log-safe rendering that keeps only the first few characters.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_LEN).collect();
        if prefix.len() == self.0.len() {
            prefix
        } else {
            format!("{prefix}…")
        }
    }

    /// Replace every occurrence of this key in `text` with [`Self::redacted`].
    ///
    /// Encoder output quotes the full destination URL, key included.
    pub fn redact_in(&self, text: &str) -> String {
        text.replace(self.0.as_str(), &self.redacted())
    }
}

impl TryFrom<String> for StreamKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StreamKey> for String {
    fn from(key: StreamKey) -> Self {
        key.0
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RunId> for Uuid {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
