//! Directory-listing algorithm shared by `items()` and `rmdir`'s
//! non-empty check: two passes over a tangle's members, first collecting
//! tombstoned keys, then yielding every live, non-tombstone entry.

use std::collections::HashSet;

use ssb_tangle::{Tangle, TangleRef};
use ssb_types::MessageId;

use crate::entries::DirEntry;

/// One live directory entry, enriched with the reference and receive
/// timestamp of the log message that created it.
#[derive(Clone, Debug)]
pub struct ListedEntry {
    pub this: TangleRef,
    pub timestamp: i64,
    pub entry: DirEntry,
}

/// Every live (non-tombstoned, non-`unbind`) entry in `tangle`.
///
/// Testable property: no returned entry's id appears as the `key` of any
/// `unbind` entry in the same tangle.
pub fn items(tangle: &Tangle) -> Vec<ListedEntry> {
    let tombstoned = tombstoned_keys(tangle);

    let mut out = Vec::new();
    for (id, member) in tangle.members() {
        if tombstoned.contains(id) {
            continue;
        }
        let Ok(entry) = serde_json::from_value::<DirEntry>(member.content.clone()) else {
            continue;
        };
        if matches!(entry, DirEntry::Unbind { .. }) {
            continue;
        }
        out.push(ListedEntry {
            this: member.reference.clone(),
            timestamp: member.timestamp,
            entry,
        });
    }
    out
}

/// First pass: every `unbind.key` value appearing anywhere in `tangle`.
pub fn tombstoned_keys(tangle: &Tangle) -> HashSet<MessageId> {
    let mut out = HashSet::new();
    for member in tangle.members().values() {
        if let Ok(DirEntry::Unbind { key }) = serde_json::from_value::<DirEntry>(member.content.clone()) {
            out.insert(key);
        }
    }
    out
}

/// Finds the live entry whose log-message id is `bind_key`, if any.
pub fn find_by_key(tangle: &Tangle, bind_key: &MessageId) -> Option<ListedEntry> {
    items(tangle).into_iter().find(|e| e.this.id() == bind_key)
}

/// Finds the live `bindD`/`bindF` entry named `name`, if any.
pub fn find_by_name(tangle: &Tangle, name: &str) -> Option<ListedEntry> {
    items(tangle)
        .into_iter()
        .find(|e| e.entry.name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssb_crypto::identity::KeyPair;
    use ssb_store::LogStore;
    use ssb_tangle::Tangle;
    use tempfile::tempdir;

    fn store() -> LogStore {
        let dir = tempdir().unwrap();
        LogStore::open(dir.path(), Some(KeyPair::generate()), false).unwrap()
    }

    #[test]
    fn unbound_entries_are_excluded() {
        let mut s = store();
        let mut tangle = Tangle::create_root(&mut s, "ssb_lfs:v1:dir", None).unwrap();
        let bind = tangle
            .append(
                &mut s,
                serde_json::to_value(DirEntry::BindF {
                    name: "f".into(),
                    size: 5,
                    blobkey: ssb_store::BlobId::from_raw("&abc.sha256"),
                })
                .unwrap(),
                None,
            )
            .unwrap();
        assert_eq!(items(&tangle).len(), 1);

        tangle
            .append(
                &mut s,
                serde_json::to_value(DirEntry::Unbind { key: bind.clone() }).unwrap(),
                None,
            )
            .unwrap();
        assert!(items(&tangle).is_empty());
        assert!(tombstoned_keys(&tangle).contains(&bind));
    }
}
