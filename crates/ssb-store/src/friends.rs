//! Read-only access to `friends.json`, the follow graph.
//!
//! This crate only ever treats the file as a flat set of identities to
//! replicate from; the graph itself (who follows whom, and why) is owned by
//! the CLI front end and the tools that populate it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ssb_types::Identity;

use crate::error::Result;

#[derive(Serialize, Deserialize)]
struct FriendsFile {
    version: u32,
    seq: u32,
    value: HashMap<Identity, HashMap<Identity, bool>>,
}

/// Loads the flat set of identities `author` follows (`value[author]`'s
/// keys with a `true` value). Returns an empty set if the file is absent or
/// `author` has no entry.
pub fn load_follows(path: &Path, author: &Identity) -> Result<HashSet<Identity>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let raw = fs::read_to_string(path)?;
    let parsed: FriendsFile = serde_json::from_str(&raw)?;
    let set = parsed
        .value
        .get(author)
        .map(|followed| {
            followed
                .iter()
                .filter(|(_, &is_following)| is_following)
                .map(|(id, _)| id.clone())
                .collect()
        })
        .unwrap_or_default();
    Ok(set)
}
