//! The per-author "latest" map (`last.json`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ssb_types::{Identity, MessageId};

use crate::error::Result;

/// The highest known `(sequence, id, timestamp)` for one author's feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastEntry {
    pub sequence: u64,
    pub id: MessageId,
    pub ts: i64,
}

#[derive(Serialize, Deserialize)]
struct LastFile {
    version: u32,
    seq: u32,
    value: HashMap<Identity, LastEntry>,
}

/// In-memory view of `last.json`, tracking the log-forward-scan position
/// (`seq`) it was last synced to so a restart can resume incrementally.
#[derive(Default)]
pub struct LastMap {
    entries: HashMap<Identity, LastEntry>,
    seq: u32,
}

impl LastMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    /// `(id, sequence)` of the highest known message for `author`, or
    /// `(None, 0)` if nothing is known yet.
    pub fn latest(&self, author: &Identity) -> (Option<MessageId>, u64) {
        match self.entries.get(author) {
            Some(entry) => (Some(entry.id.clone()), entry.sequence),
            None => (None, 0),
        }
    }

    pub fn update(&mut self, author: Identity, entry: LastEntry) {
        self.entries.insert(author, entry);
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path)?;
        let parsed: LastFile = serde_json::from_str(&raw)?;
        Ok(Self {
            entries: parsed.value,
            seq: parsed.seq,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let doc = LastFile {
            version: 1,
            seq: self.seq,
            value: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unknown_author_has_no_latest() {
        let map = LastMap::new();
        assert_eq!(
            map.latest(&Identity::from_raw("@nobody.ed25519")),
            (None, 0)
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last.json");
        let mut map = LastMap::new();
        let author = Identity::from_raw("@a.ed25519");
        map.update(
            author.clone(),
            LastEntry {
                sequence: 3,
                id: MessageId::from_raw("%m3.sha256"),
                ts: 1000,
            },
        );
        map.set_seq(3);
        map.save(&path).unwrap();

        let loaded = LastMap::load(&path).unwrap();
        assert_eq!(loaded.seq(), 3);
        assert_eq!(
            loaded.latest(&author),
            (Some(MessageId::from_raw("%m3.sha256")), 3)
        );
    }
}
