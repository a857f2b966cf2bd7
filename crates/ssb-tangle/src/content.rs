//! The `content.type == "tangle"` message shapes: the tangle root and its
//! subsequent entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ssb_types::{Identity, MessageId};

pub const TANGLE_TYPE: &str = "tangle";

/// A `[author, message-id]` reference, as used for `base`, `drvref`, and
/// entries in `previous`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TangleRef(pub Identity, pub MessageId);

impl TangleRef {
    pub fn author(&self) -> &Identity {
        &self.0
    }

    pub fn id(&self) -> &MessageId {
        &self.1
    }
}

/// The root message of a tangle: no `base`, carries `use`/`salt` and
/// optionally a `drvref` pointing at another tangle's root (used by LFS
/// directory tangles to point back at the drive's root).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TangleRootContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub salt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drvref: Option<TangleRef>,
}

impl TangleRootContent {
    pub fn new(use_: impl Into<String>, salt: impl Into<String>, drvref: Option<TangleRef>) -> Self {
        Self {
            kind: TANGLE_TYPE.to_string(),
            use_: use_.into(),
            salt: salt.into(),
            drvref,
        }
    }
}

/// A non-root tangle entry: points at the tangle's `base`, up to three
/// `previous` tips, carries its `height`, and wraps the application payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TangleEntryContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub base: TangleRef,
    pub previous: Vec<TangleRef>,
    pub height: u64,
    pub content: Value,
}

impl TangleEntryContent {
    pub fn new(base: TangleRef, previous: Vec<TangleRef>, height: u64, content: Value) -> Self {
        Self {
            kind: TANGLE_TYPE.to_string(),
            base,
            previous,
            height,
            content,
        }
    }
}

/// `true` if `content.type == "tangle"`.
pub fn is_tangle_content(content: &Value) -> bool {
    content.get("type").and_then(Value::as_str) == Some(TANGLE_TYPE)
}

/// `true` if `content` looks like a tangle root (has no `base` field).
pub fn is_root_content(content: &Value) -> bool {
    is_tangle_content(content) && content.get("base").is_none()
}
