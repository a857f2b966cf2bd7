//! Sigil-prefixed identifiers: `@...ed25519` identities, `%...sha256` message
//! ids, and `&...sha256` blob ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An author's public identity, rendered as `"@" + base64(pubkey) + ".ed25519"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps an already-formatted identity string, without validating it.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The sigil-prefixed string form, e.g. `@Abc...=.ed25519`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base64 body between the `@` sigil and the `.ed25519` suffix.
    pub fn base64_body(&self) -> Option<&str> {
        self.0
            .strip_prefix('@')
            .and_then(|s| s.strip_suffix(".ed25519"))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A log message id, `"%" + base64(sha256(canonical-json)) + ".sha256"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps an already-formatted message id string.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The sigil-prefixed string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first six base64 characters following the `%` sigil, used by the
    /// hash-table index (`_hthash`) and by tangle iteration's tie-break key.
    pub fn hth_prefix(&self) -> Option<&str> {
        let body = self.0.strip_prefix('%')?;
        body.get(0..6)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A blob id, `"&" + base64(sha256(bytes)) + ".sha256"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Wraps an already-formatted blob id string.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The sigil-prefixed string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hth_prefix_takes_six_chars_after_sigil() {
        let id = MessageId::from_raw("%xRDqws/TrQmOd4aEwZ32jdLhP873ZKjIgHlggPR0eoo=.sha256");
        assert_eq!(id.hth_prefix(), Some("xRDqws"));
    }

    #[test]
    fn identity_body_strips_sigil_and_suffix() {
        let id = Identity::from_raw("@I/4cyN/jPBbDsikbHzAEvmaYlaJK33lW3UhWjNXjyrU=.ed25519");
        assert_eq!(
            id.base64_body(),
            Some("I/4cyN/jPBbDsikbHzAEvmaYlaJK33lW3UhWjNXjyrU=")
        );
    }
}
