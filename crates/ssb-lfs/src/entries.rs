//! Directory-entry payloads: the application content wrapped inside a
//! tangle entry's `content` field.

use serde::{Deserialize, Serialize};

use ssb_store::BlobId;
use ssb_tangle::TangleRef;
use ssb_types::MessageId;

/// One directory-entry payload. Internally tagged on `type`, matching the
/// wire shapes in the data model exactly (`bindF`, `bindD`, `unbind`,
/// `blocked`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DirEntry {
    #[serde(rename = "bindF")]
    BindF {
        name: String,
        size: u64,
        blobkey: BlobId,
    },
    #[serde(rename = "bindD")]
    BindD { name: String, dirref: TangleRef },
    #[serde(rename = "unbind")]
    Unbind { key: MessageId },
    #[serde(rename = "blocked")]
    Blocked {},
}

impl DirEntry {
    /// The entry's name, for `bindF`/`bindD`; `None` for tombstones and the
    /// drive-closing marker.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::BindF { name, .. } | Self::BindD { name, .. } => Some(name),
            Self::Unbind { .. } | Self::Blocked {} => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::BindD { .. })
    }
}
