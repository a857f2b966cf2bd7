//! The framed append-only log file (`log.offset`).
//!
//! Each record is `4-byte BE length | payload | 4-byte BE length` (the
//! trailing length lets [`iter_ids_reverse`] walk the file backwards without
//! an index). `payload` is the canonical JSON of a [`ssb_types::LogEnvelope`]
//! (`{"key": ..., "value": ..., "timestamp": ...}`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ssb_types::{LogEnvelope, MessageId};

use crate::error::{Result, StoreError};

/// The framed log file, opened for append (and random-access read).
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Opens `path`, creating an empty file unless `readonly`.
    pub fn open(path: impl Into<PathBuf>, readonly: bool) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(!readonly)
            .create(!readonly)
            .open(&path)
            .map_err(|e| {
                if readonly && e.kind() == std::io::ErrorKind::NotFound {
                    StoreError::NotFound(format!("log file does not exist: {}", path.display()))
                } else {
                    StoreError::Io(e)
                }
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Appends one framed record, returning the byte offset of `payload`'s
    /// first byte (what the indices store).
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        self.file.seek(SeekFrom::End(0))?;
        let len = payload.len() as u32;
        let len_bytes = len.to_be_bytes();
        self.file.write_all(&len_bytes)?;
        let payload_offset = self.file.stream_position()?;
        self.file.write_all(payload)?;
        self.file.write_all(&len_bytes)?;
        self.file.flush()?;
        Ok(payload_offset)
    }

    /// Reads the payload bytes starting at `payload_offset` (as returned by
    /// [`append`](Self::append) or recorded in an index).
    pub fn read_payload_at(&mut self, payload_offset: u64) -> Result<Vec<u8>> {
        if payload_offset < 4 {
            return Err(StoreError::MalformedRecord("offset before start of file".into()));
        }
        self.file.seek(SeekFrom::Start(payload_offset - 4))?;
        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Reads and parses the envelope at `payload_offset`.
    pub fn read_envelope_at(&mut self, payload_offset: u64) -> Result<LogEnvelope> {
        let bytes = self.read_payload_at(payload_offset)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::MalformedRecord(e.to_string()))
    }

    /// Reverse-scans the file from the end, yielding `(message-id,
    /// payload-offset)` for every well-formed record, newest first.
    ///
    /// Stops (without error) at the first record whose trailer or payload
    /// cannot be parsed, since that is indistinguishable from a partially
    /// written final record -- the forward-scan rebuild path is what
    /// recovers from real corruption.
    pub fn iter_ids_reverse(&mut self) -> Result<Vec<(MessageId, u64)>> {
        let mut out = Vec::new();
        let mut cursor = self.len()?;
        loop {
            if cursor < 8 {
                break;
            }
            let trailer_at = cursor - 4;
            self.file.seek(SeekFrom::Start(trailer_at))?;
            let mut len_buf = [0u8; 4];
            if self.file.read_exact(&mut len_buf).is_err() {
                break;
            }
            let len = u32::from_be_bytes(len_buf) as u64;
            let record_total = 8 + len;
            if record_total > cursor {
                break;
            }
            let payload_offset = cursor - 4 - len;
            let payload = match self.read_payload_at(payload_offset) {
                Ok(p) => p,
                Err(_) => break,
            };
            let key = match serde_json::from_slice::<LogEnvelope>(&payload) {
                Ok(env) => env.key,
                Err(_) => break,
            };
            out.push((key, payload_offset));
            cursor -= record_total;
        }
        Ok(out)
    }

    /// Forward scan of the entire file, yielding `(envelope, payload-offset)`
    /// in append order. Used to rebuild indices from scratch.
    pub fn iter_forward(&mut self) -> Result<Vec<(LogEnvelope, u64)>> {
        let mut out = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        let total_len = self.len()?;
        let mut cursor = 0u64;
        while cursor + 8 <= total_len {
            let mut len_buf = [0u8; 4];
            self.file.seek(SeekFrom::Start(cursor))?;
            if self.file.read_exact(&mut len_buf).is_err() {
                break;
            }
            let len = u32::from_be_bytes(len_buf) as u64;
            let payload_offset = cursor + 4;
            if payload_offset + len + 4 > total_len {
                break;
            }
            let payload = match self.read_payload_at(payload_offset) {
                Ok(p) => p,
                Err(_) => break,
            };
            match serde_json::from_slice::<LogEnvelope>(&payload) {
                Ok(env) => out.push((env, payload_offset)),
                Err(_) => break,
            }
            cursor = payload_offset + len + 4;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn envelope(key: &str, seq: u64) -> LogEnvelope {
        LogEnvelope {
            key: MessageId::from_raw(key.to_string()),
            value: serde_json::from_value(json!({
                "previous": null,
                "author": "@author.ed25519",
                "sequence": seq,
                "timestamp": 0,
                "hash": "sha256",
                "content": {"type": "test"},
                "signature": "sig.sig.ed25519",
            }))
            .unwrap(),
            timestamp: 1,
        }
    }

    #[test]
    fn append_then_read_payload_round_trips() {
        let dir = tempdir().unwrap();
        let mut log = LogFile::open(dir.path().join("log.offset"), false).unwrap();
        let env = envelope("%one.sha256", 1);
        let payload = serde_json::to_vec(&env).unwrap();
        let offset = log.append(&payload).unwrap();
        let read_back = log.read_payload_at(offset).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn reverse_scan_yields_newest_first() {
        let dir = tempdir().unwrap();
        let mut log = LogFile::open(dir.path().join("log.offset"), false).unwrap();
        for i in 1..=3u64 {
            let env = envelope(&format!("%m{i}.sha256"), i);
            let payload = serde_json::to_vec(&env).unwrap();
            log.append(&payload).unwrap();
        }
        let ids: Vec<String> = log
            .iter_ids_reverse()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["%m3.sha256", "%m2.sha256", "%m1.sha256"]);
    }

    #[test]
    fn forward_scan_matches_append_order() {
        let dir = tempdir().unwrap();
        let mut log = LogFile::open(dir.path().join("log.offset"), false).unwrap();
        for i in 1..=3u64 {
            let env = envelope(&format!("%m{i}.sha256"), i);
            let payload = serde_json::to_vec(&env).unwrap();
            log.append(&payload).unwrap();
        }
        let keys: Vec<String> = log
            .iter_forward()
            .unwrap()
            .into_iter()
            .map(|(env, _)| env.key.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["%m1.sha256", "%m2.sha256", "%m3.sha256"]);
    }

    #[test]
    fn truncated_trailing_record_stops_reverse_scan_without_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.offset");
        {
            let mut log = LogFile::open(&path, false).unwrap();
            let env = envelope("%m1.sha256", 1);
            let payload = serde_json::to_vec(&env).unwrap();
            log.append(&payload).unwrap();
        }
        // Append a truncated/garbage trailing record directly.
        {
            use std::io::Write as _;
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0, 0, 0, 50]).unwrap();
            f.write_all(b"not enough bytes").unwrap();
        }
        let mut log = LogFile::open(&path, true).unwrap();
        let ids = log.iter_ids_reverse().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].0.as_str(), "%m1.sha256");
    }
}
