//! The tangle: a sub-DAG of log messages sharing a common `base`.

use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::RngCore;
use serde_json::Value;

use ssb_store::store::LogStore;
use ssb_store::index::hthash;
use ssb_types::{Identity, MessageId};

use crate::content::{
    is_root_content, is_tangle_content, TangleEntryContent, TangleRef, TangleRootContent,
};
use crate::error::{Result, TangleError};

/// One non-root member of a tangle, as reconstructed from the log.
#[derive(Clone, Debug)]
pub struct TangleMember {
    pub reference: TangleRef,
    pub height: u64,
    pub previous: Vec<TangleRef>,
    pub content: Value,
    /// Local receive timestamp from the log envelope, used by LFS to
    /// enrich directory-listing entries.
    pub timestamp: i64,
}

/// An in-memory reconstruction of one tangle: its root, every member, and
/// the current tip set.
pub struct Tangle {
    base: TangleRef,
    use_: String,
    drvref: Option<TangleRef>,
    members: HashMap<MessageId, TangleMember>,
    tips: HashSet<MessageId>,
}

impl Tangle {
    /// Creates a brand-new tangle: writes its root message to `store` under
    /// the local identity and returns the (empty) resulting tangle.
    pub fn create_root(
        store: &mut LogStore,
        use_: impl Into<String>,
        drvref: Option<TangleRef>,
    ) -> Result<Self> {
        let mut salt_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);
        let use_ = use_.into();
        let root_content = TangleRootContent::new(use_.clone(), salt, drvref.clone());
        let id = store.write_local(serde_json::to_value(&root_content)?)?;
        let author = store
            .identity()
            .cloned()
            .ok_or_else(|| TangleError::NotATangleRoot("store has no local identity".into()))?;
        let base = TangleRef(author, id);
        Ok(Self {
            base,
            use_,
            drvref,
            members: HashMap::new(),
            tips: HashSet::new(),
        })
    }

    /// Reconstructs a tangle given its root reference, scanning the entire
    /// log for messages whose `content.base` matches.
    pub fn load(store: &mut LogStore, base: TangleRef) -> Result<Self> {
        let root_msg = store
            .read(base.id())?
            .ok_or_else(|| TangleError::NotATangleRoot(base.id().to_string()))?;
        if !is_root_content(&root_msg.content) {
            return Err(TangleError::NotATangleRoot(base.id().to_string()));
        }
        let root: TangleRootContent = serde_json::from_value(root_msg.content.clone())?;

        let mut members = HashMap::new();
        for id in store.iter()? {
            let Some(msg) = store.read(&id)? else { continue };
            if !is_tangle_content(&msg.content) || is_root_content(&msg.content) {
                continue;
            }
            let Ok(entry) = serde_json::from_value::<TangleEntryContent>(msg.content.clone()) else {
                continue;
            };
            if entry.base != base {
                continue;
            }
            let reference = TangleRef(msg.author.clone(), id.clone());
            members.insert(
                id,
                TangleMember {
                    reference,
                    height: entry.height,
                    previous: entry.previous,
                    content: entry.content,
                    timestamp: msg.timestamp,
                },
            );
        }

        let tips = compute_tips(&base, &members);

        Ok(Self {
            base,
            use_: root.use_,
            drvref: root.drvref,
            members,
            tips,
        })
    }

    pub fn base(&self) -> &TangleRef {
        &self.base
    }

    pub fn use_(&self) -> &str {
        &self.use_
    }

    pub fn drvref(&self) -> Option<&TangleRef> {
        self.drvref.as_ref()
    }

    pub fn members(&self) -> &HashMap<MessageId, TangleMember> {
        &self.members
    }

    pub fn member(&self, id: &MessageId) -> Option<&TangleMember> {
        self.members.get(id)
    }

    /// The current tip ids, i.e. members referenced by no other member's
    /// `previous`, or the root alone if the tangle has no members yet.
    pub fn tips(&self) -> &HashSet<MessageId> {
        &self.tips
    }

    fn height_of(&self, id: &MessageId) -> u64 {
        if id == self.base.id() {
            0
        } else {
            self.members.get(id).map(|m| m.height).unwrap_or(0)
        }
    }

    /// The tangle's current height: the max height among its tips.
    pub fn height(&self) -> u64 {
        self.tips.iter().map(|id| self.height_of(id)).max().unwrap_or(0)
    }

    /// Appends a new member under `author`'s feed in `store`.
    ///
    /// If `previous` is `None`, parents are up to the first three current
    /// tips and the new height is `self.height() + 1`; otherwise the new
    /// entry points only at the given parent and its height is
    /// `parent.height + 1`.
    pub fn append(
        &mut self,
        store: &mut LogStore,
        content: Value,
        previous: Option<TangleRef>,
    ) -> Result<MessageId> {
        let (parents, height) = match previous {
            Some(parent) => {
                if parent.id() != self.base.id() && !self.members.contains_key(parent.id()) {
                    return Err(TangleError::ForeignParent(parent.id().to_string()));
                }
                let h = self.height_of(parent.id()) + 1;
                (vec![parent], h)
            }
            None => {
                let mut tips: Vec<MessageId> = self.tips.iter().cloned().collect();
                tips.sort_by_key(|id| (std::cmp::Reverse(self.height_of(id)), hthash(id.as_str())));
                tips.truncate(3);
                let refs: Vec<TangleRef> = tips
                    .iter()
                    .map(|id| {
                        if id == self.base.id() {
                            self.base.clone()
                        } else {
                            self.members[id].reference.clone()
                        }
                    })
                    .collect();
                let h = self.height() + 1;
                (refs, h)
            }
        };

        let entry = TangleEntryContent::new(self.base.clone(), parents.clone(), height, content.clone());
        let id = store.write_local(serde_json::to_value(&entry)?)?;
        let author = store
            .identity()
            .cloned()
            .ok_or_else(|| TangleError::NotATangleRoot("store has no local identity".into()))?;
        // Re-read the just-written message for its timestamp rather than
        // taking the system clock again, so it matches exactly what a
        // `Tangle::load` reconstruction would see.
        let timestamp = store.read(&id)?.map(|m| m.timestamp).unwrap_or_default();

        for parent in &parents {
            self.tips.remove(parent.id());
        }
        let reference = TangleRef(author, id.clone());
        self.members.insert(
            id.clone(),
            TangleMember {
                reference,
                height,
                previous: parents,
                content,
                timestamp,
            },
        );
        self.tips.insert(id.clone());
        Ok(id)
    }

    /// Deterministic reverse-topological iteration (`SSB_TANGLE_ITER`):
    /// a max-heap frontier keyed by `(height, hthash(id))`, expanding each
    /// popped member's `previous` parents.
    pub fn iter_deterministic(&self) -> Vec<MessageId> {
        let mut visited: HashSet<MessageId> = HashSet::new();
        let mut heap: BinaryHeap<(u64, u32, MessageId)> = BinaryHeap::new();

        for tip in &self.tips {
            heap.push((self.height_of(tip), hthash(tip.as_str()), tip.clone()));
        }

        let mut out = Vec::new();
        while let Some((_, _, id)) = heap.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            out.push(id.clone());
            let parents: Vec<TangleRef> = if &id == self.base.id() {
                Vec::new()
            } else {
                self.members
                    .get(&id)
                    .map(|m| m.previous.clone())
                    .unwrap_or_default()
            };
            for parent in parents {
                if !visited.contains(parent.id()) {
                    heap.push((self.height_of(parent.id()), hthash(parent.id().as_str()), parent.id().clone()));
                }
            }
        }
        out
    }
}

fn compute_tips(base: &TangleRef, members: &HashMap<MessageId, TangleMember>) -> HashSet<MessageId> {
    let mut referenced: HashSet<MessageId> = HashSet::new();
    for member in members.values() {
        for parent in &member.previous {
            referenced.insert(parent.id().clone());
        }
    }
    let mut tips: HashSet<MessageId> = members
        .keys()
        .filter(|id| !referenced.contains(*id))
        .cloned()
        .collect();
    if !referenced.contains(base.id()) && tips.is_empty() {
        tips.insert(base.id().clone());
    }
    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssb_crypto::identity::KeyPair;
    use serde_json::json;
    use tempfile::tempdir;

    fn store(kp: KeyPair) -> LogStore {
        let dir = tempdir().unwrap();
        LogStore::open(dir.path(), Some(kp), false).unwrap()
    }

    #[test]
    fn fresh_tangle_has_root_as_tip() {
        let mut s = store(KeyPair::generate());
        let tangle = Tangle::create_root(&mut s, "test:v1", None).unwrap();
        assert_eq!(tangle.tips().len(), 1);
        assert!(tangle.tips().contains(tangle.base().id()));
        assert_eq!(tangle.height(), 0);
    }

    #[test]
    fn append_updates_tips_and_height() {
        let mut s = store(KeyPair::generate());
        let mut tangle = Tangle::create_root(&mut s, "test:v1", None).unwrap();
        let base = tangle.base().clone();

        let a = tangle.append(&mut s, json!({"type": "x", "n": 1}), None).unwrap();
        assert_eq!(tangle.height(), 1);
        assert!(tangle.tips().contains(&a));
        assert!(!tangle.tips().contains(base.id()));

        let b = tangle.append(&mut s, json!({"type": "x", "n": 2}), None).unwrap();
        assert_eq!(tangle.height(), 2);
        assert!(tangle.tips().contains(&b));
        assert!(!tangle.tips().contains(&a));
    }

    #[test]
    fn append_with_explicit_parent_forks() {
        let mut s = store(KeyPair::generate());
        let mut tangle = Tangle::create_root(&mut s, "test:v1", None).unwrap();
        let base = tangle.base().clone();

        let a = tangle.append(&mut s, json!({"type": "x"}), None).unwrap();
        let fork = tangle
            .append(&mut s, json!({"type": "y"}), Some(base.clone()))
            .unwrap();

        // Both `a` and `fork` point at the root; both are tips.
        assert!(tangle.tips().contains(&a));
        assert!(tangle.tips().contains(&fork));
        assert_eq!(tangle.member(&fork).unwrap().height, 1);
    }

    #[test]
    fn reload_from_store_reconstructs_same_tips() {
        let mut s = store(KeyPair::generate());
        let mut tangle = Tangle::create_root(&mut s, "test:v1", None).unwrap();
        let base = tangle.base().clone();
        tangle.append(&mut s, json!({"type": "x"}), None).unwrap();
        tangle.append(&mut s, json!({"type": "x"}), None).unwrap();

        let reloaded = Tangle::load(&mut s, base).unwrap();
        assert_eq!(reloaded.tips(), tangle.tips());
        assert_eq!(reloaded.height(), tangle.height());
    }

    #[test]
    fn deterministic_iteration_is_stable_across_loads() {
        let mut s = store(KeyPair::generate());
        let mut tangle = Tangle::create_root(&mut s, "test:v1", None).unwrap();
        let base = tangle.base().clone();
        for i in 0..5 {
            tangle.append(&mut s, json!({"type": "x", "i": i}), None).unwrap();
        }

        let order_a = tangle.iter_deterministic();
        let reloaded = Tangle::load(&mut s, base).unwrap();
        let order_b = reloaded.iter_deterministic();
        assert_eq!(order_a, order_b);
        // Reverse-topological: root must be last.
        assert_eq!(order_a.last(), Some(tangle.base().id()));
    }
}
