//! Drive discovery (enumerating root tangles visible in the log) and the
//! drive UUID derivation.

use uuid::Uuid;

use ssb_store::store::LogStore;
use ssb_tangle::content::{is_root_content, is_tangle_content};
use ssb_tangle::{TangleEntryContent, TangleRef, TangleRootContent};
use ssb_types::{Identity, MessageId};

use crate::entries::DirEntry;
use crate::error::Result;

pub const ROOT_USE: &str = "ssb_lfs:v1:root";
pub const DIR_USE: &str = "ssb_lfs:v1:dir";

/// Fixed namespace UUID every drive UUID is derived under (`uuidv5`).
const DRIVE_UUID_NAMESPACE: &str = "55bf2f4d-9915-4d86-a76f-7b7d6888c107";

/// Enumerates every surviving LFS root tangle in the log, newest first.
/// "Surviving" means no `{blocked}` entry authored by `local_identity`
/// points at it. The first element, if any, is "the most recent drive".
pub fn discover_drives(store: &mut LogStore, local_identity: &Identity) -> Result<Vec<TangleRef>> {
    let ids = store.iter()?;

    let mut blocked_roots = std::collections::HashSet::new();
    for id in &ids {
        let Some(msg) = store.read(id)? else { continue };
        if msg.author != *local_identity || !is_tangle_content(&msg.content) || is_root_content(&msg.content) {
            continue;
        }
        let Ok(entry) = serde_json::from_value::<TangleEntryContent>(msg.content.clone()) else {
            continue;
        };
        if matches!(
            serde_json::from_value::<DirEntry>(entry.content.clone()),
            Ok(DirEntry::Blocked {})
        ) {
            blocked_roots.insert(entry.base.id().clone());
        }
    }

    let mut out = Vec::new();
    for id in &ids {
        let Some(msg) = store.read(id)? else { continue };
        if !is_root_content(&msg.content) {
            continue;
        }
        let Ok(root) = serde_json::from_value::<TangleRootContent>(msg.content.clone()) else {
            continue;
        };
        if root.use_ != ROOT_USE || blocked_roots.contains(id) {
            continue;
        }
        out.push(TangleRef(msg.author.clone(), id.clone()));
    }
    Ok(out)
}

/// Derives a drive's UUID from its root tangle's salt and message id:
/// `uuidv5(NS, salt-hex-string || root-message-id-string)`. The salt is
/// concatenated as the hex *string* it's stored as, not decoded to bytes.
pub fn drive_uuid(salt_hex: &str, root_id: &MessageId) -> Result<Uuid> {
    let namespace = Uuid::parse_str(DRIVE_UUID_NAMESPACE).expect("fixed namespace UUID is well-formed");
    let mut preimage = salt_hex.as_bytes().to_vec();
    preimage.extend_from_slice(root_id.as_str().as_bytes());
    Ok(Uuid::new_v5(&namespace, &preimage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_deterministic_for_same_inputs() {
        let id = MessageId::from_raw("%abc.sha256");
        let a = drive_uuid("00112233445566778899aabbccddeeff0011223", &id).unwrap();
        let b = drive_uuid("00112233445566778899aabbccddeeff0011223", &id).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uuid_differs_for_different_salts() {
        let id = MessageId::from_raw("%abc.sha256");
        let a = drive_uuid("aa", &id).unwrap();
        let b = drive_uuid("bb", &id).unwrap();
        assert_ne!(a, b);
    }
}
