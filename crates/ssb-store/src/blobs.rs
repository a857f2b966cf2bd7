//! Content-addressed blob store: files under `<root>/blobs/sha256/<xx>/<rest>`.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ssb_crypto::hash::sha256;
use ssb_types::BlobId;

use crate::error::{Result, StoreError};

/// A content-addressed store of immutable byte blobs, keyed by SHA-256.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Opens (creating if absent) a blob store rooted at `<root>/blobs`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into().join("blobs").join("sha256");
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, id: &BlobId) -> Result<PathBuf> {
        let body = id
            .as_str()
            .strip_prefix('&')
            .and_then(|s| s.strip_suffix(".sha256"))
            .ok_or_else(|| StoreError::MalformedRecord(format!("bad blob id: {id}")))?;
        let hex = hex_of_base64(body)?;
        Ok(self.root.join(&hex[0..2]).join(&hex[2..]))
    }

    /// `true` if the blob is present locally.
    pub fn has(&self, id: &BlobId) -> Result<bool> {
        Ok(self.path_for(id)?.exists())
    }

    /// Reads a blob's bytes, failing with [`StoreError::NotFound`] if absent.
    pub fn read(&self, id: &BlobId) -> Result<Vec<u8>> {
        let path = self.path_for(id)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(e)
            }
        })
    }

    /// Writes `bytes`, returning its blob id. Idempotent: if the blob
    /// already exists, the existing file is left untouched.
    pub fn write(&self, bytes: &[u8]) -> Result<BlobId> {
        let digest = sha256(bytes);
        let id = BlobId::from_raw(format!("&{}.sha256", STANDARD.encode(digest)));
        let path = self.path_for(&id)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
            tracing::debug!(target: "ssb_store", blob = %id, bytes = bytes.len(), "wrote blob");
        }
        Ok(id)
    }
}

fn hex_of_base64(body: &str) -> Result<String> {
    let raw = STANDARD
        .decode(body)
        .map_err(|e| StoreError::MalformedRecord(e.to_string()))?;
    Ok(hex::encode(raw))
}

/// Path helper shared with the CLI layer for display purposes.
pub fn blob_path(root: &Path, id: &BlobId) -> Result<PathBuf> {
    BlobStore::open(root)?.path_for(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let id = store.write(b"hello blob").unwrap();
        assert!(store.has(&id).unwrap());
        assert_eq!(store.read(&id).unwrap(), b"hello blob");
    }

    #[test]
    fn write_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let id1 = store.write(b"same bytes").unwrap();
        let id2 = store.write(b"same bytes").unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn missing_blob_is_not_found() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let fake = BlobId::from_raw("&0000000000000000000000000000000000000000=.sha256");
        assert!(!store.has(&fake).unwrap());
        assert!(matches!(store.read(&fake), Err(StoreError::NotFound(_))));
    }
}
