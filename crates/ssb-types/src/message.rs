use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{Identity, MessageId};

/// A signed log entry, field order matching the canonical signing format
/// exactly: `previous, author, sequence, timestamp, hash, content, signature`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedMessage {
    pub previous: Option<MessageId>,
    pub author: Identity,
    pub sequence: u64,
    pub timestamp: i64,
    pub hash: String,
    pub content: Value,
    pub signature: String,
}

impl SignedMessage {
    /// `true` if this is the first message of its author's feed.
    pub fn is_genesis(&self) -> bool {
        self.previous.is_none() && self.sequence == 1
    }
}

/// The on-disk log envelope wrapping a [`SignedMessage`] with its id and the
/// local receive timestamp (distinct from `SignedMessage::timestamp`, which
/// is author-supplied).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEnvelope {
    pub key: MessageId,
    pub value: SignedMessage,
    pub timestamp: i64,
}
