//! `Drive`: a logical filesystem instance built from a root tangle plus one
//! subordinate directory tangle per directory.

use serde_json::json;

use ssb_store::store::LogStore;
use ssb_store::BlobId;
use ssb_tangle::{Tangle, TangleRef};
use ssb_types::MessageId;

use crate::drive::{drive_uuid, DIR_USE, ROOT_USE};
use crate::entries::DirEntry;
use crate::error::{LfsError, Result};
use crate::listing::{find_by_key, find_by_name, items, ListedEntry};

/// A logical filesystem rooted at one LFS root tangle.
///
/// Mirrors chdir state with a stack of parent directory references and a
/// stack of path-name components; every operation re-derives the current
/// directory's tangle from the log on demand rather than caching it, since
/// LFS is a purely local, re-derivable view.
pub struct Drive {
    root: TangleRef,
    current: TangleRef,
    parent_stack: Vec<TangleRef>,
    name_stack: Vec<String>,
}

impl Drive {
    /// Creates a brand new, empty drive.
    pub fn create(store: &mut LogStore) -> Result<Self> {
        let root = Tangle::create_root(store, ROOT_USE, None)?;
        let base = root.base().clone();
        Ok(Self {
            root: base.clone(),
            current: base,
            parent_stack: Vec::new(),
            name_stack: Vec::new(),
        })
    }

    /// Opens an existing drive by its root reference, positioned at `/`.
    pub fn open(store: &mut LogStore, root: TangleRef) -> Result<Self> {
        let tangle = Tangle::load(store, root.clone())?;
        if tangle.use_() != ROOT_USE {
            return Err(LfsError::NotFound(format!("{} is not an LFS root", root.id())));
        }
        Ok(Self {
            root: root.clone(),
            current: root,
            parent_stack: Vec::new(),
            name_stack: Vec::new(),
        })
    }

    pub fn root(&self) -> &TangleRef {
        &self.root
    }

    /// The current working directory, `/`-joined from the name stack.
    pub fn pwd(&self) -> String {
        if self.name_stack.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.name_stack.join("/"))
        }
    }

    /// This drive's UUID, derived from its root tangle's salt and id.
    pub fn uuid(&self, store: &mut LogStore) -> Result<uuid::Uuid> {
        let root_msg = store
            .read(self.root.id())?
            .ok_or_else(|| LfsError::NotFound(self.root.id().to_string()))?;
        let root: ssb_tangle::TangleRootContent = serde_json::from_value(root_msg.content)?;
        Ok(drive_uuid(&root.salt, self.root.id())?)
    }

    fn current_tangle(&self, store: &mut LogStore) -> Result<Tangle> {
        Ok(Tangle::load(store, self.current.clone())?)
    }

    fn root_tangle(&self, store: &mut LogStore) -> Result<Tangle> {
        Ok(Tangle::load(store, self.root.clone())?)
    }

    /// Live entries of the current directory.
    pub fn items(&self, store: &mut LogStore) -> Result<Vec<ListedEntry>> {
        Ok(items(&self.current_tangle(store)?))
    }

    /// Normalizes and walks `path` one component at a time: `.` is a
    /// no-op, `..` pops to the parent, a leading `/` resets to the root,
    /// and any other component must name a live `bindD` in the directory
    /// reached so far.
    pub fn cd(&mut self, store: &mut LogStore, path: &str) -> Result<()> {
        let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if path.starts_with('/') {
            self.current = self.root.clone();
            self.parent_stack.clear();
            self.name_stack.clear();
        }
        if path.is_empty() {
            components.clear();
        }

        for component in components {
            match component {
                "." => {}
                ".." => {
                    if let Some(parent) = self.parent_stack.pop() {
                        self.current = parent;
                        self.name_stack.pop();
                    } else {
                        self.current = self.root.clone();
                    }
                }
                name => {
                    let tangle = self.current_tangle(store)?;
                    let entry = find_by_name(&tangle, name)
                        .ok_or_else(|| LfsError::NoSuchDirectory(name.to_string()))?;
                    let DirEntry::BindD { dirref, .. } = entry.entry else {
                        return Err(LfsError::NoSuchDirectory(name.to_string()));
                    };
                    self.parent_stack.push(self.current.clone());
                    self.name_stack.push(name.to_string());
                    self.current = dirref;
                }
            }
        }
        Ok(())
    }

    /// Creates a subdirectory named `name` in the current directory.
    pub fn mkdir(&mut self, store: &mut LogStore, name: &str) -> Result<MessageId> {
        let dir_tangle = Tangle::create_root(store, DIR_USE, Some(self.root.clone()))?;
        let dirref = dir_tangle.base().clone();

        let mut current = self.current_tangle(store)?;
        let bind = DirEntry::BindD {
            name: name.to_string(),
            dirref,
        };
        Ok(current.append(store, serde_json::to_value(bind)?, None)?)
    }

    /// Binds a file blob named `name` in the current directory.
    pub fn link_blob(
        &mut self,
        store: &mut LogStore,
        name: &str,
        size: u64,
        blobkey: BlobId,
    ) -> Result<MessageId> {
        let mut current = self.current_tangle(store)?;
        let bind = DirEntry::BindF {
            name: name.to_string(),
            size,
            blobkey,
        };
        Ok(current.append(store, serde_json::to_value(bind)?, None)?)
    }

    /// Tombstones the live `bindD` entry with message-id `bind_key`. Fails
    /// with [`LfsError::DirectoryNotEmpty`] if the referenced directory
    /// still has any live entry.
    pub fn rmdir(&mut self, store: &mut LogStore, bind_key: &MessageId) -> Result<MessageId> {
        let mut current = self.current_tangle(store)?;
        let entry = find_by_key(&current, bind_key)
            .ok_or_else(|| LfsError::NotFound(bind_key.to_string()))?;
        let DirEntry::BindD { dirref, .. } = entry.entry else {
            return Err(LfsError::NotFound(bind_key.to_string()));
        };
        let sub = Tangle::load(store, dirref)?;
        if !items(&sub).is_empty() {
            return Err(LfsError::DirectoryNotEmpty(bind_key.to_string()));
        }
        let unbind = DirEntry::Unbind {
            key: bind_key.clone(),
        };
        Ok(current.append(store, serde_json::to_value(unbind)?, None)?)
    }

    /// Tombstones the live `bindF` entry with message-id `bind_key`.
    pub fn unlink_blob(&mut self, store: &mut LogStore, bind_key: &MessageId) -> Result<MessageId> {
        let mut current = self.current_tangle(store)?;
        let entry = find_by_key(&current, bind_key)
            .ok_or_else(|| LfsError::NotFound(bind_key.to_string()))?;
        if !matches!(entry.entry, DirEntry::BindF { .. }) {
            return Err(LfsError::NotFound(bind_key.to_string()));
        }
        let unbind = DirEntry::Unbind {
            key: bind_key.clone(),
        };
        Ok(current.append(store, serde_json::to_value(unbind)?, None)?)
    }

    /// Closes the drive: appends `{blocked}` to the root tangle, which
    /// removes it from future [`crate::drive::discover_drives`] results.
    pub fn close(&self, store: &mut LogStore) -> Result<MessageId> {
        let mut root = self.root_tangle(store)?;
        Ok(root.append(store, json!({"type": "blocked"}), None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssb_crypto::identity::KeyPair;
    use tempfile::tempdir;

    fn store() -> LogStore {
        let dir = tempdir().unwrap();
        LogStore::open(dir.path(), Some(KeyPair::generate()), false).unwrap()
    }

    // Testable Scenario S5.
    #[test]
    fn lifecycle_mkdir_put_ls_rm_rmdir() {
        let mut s = store();
        let mut drive = Drive::create(&mut s).unwrap();

        drive.mkdir(&mut s, "a").unwrap();
        drive.cd(&mut s, "a").unwrap();
        drive.mkdir(&mut s, "b").unwrap();
        drive.cd(&mut s, "b").unwrap();
        assert_eq!(drive.pwd(), "/a/b");

        let blob = BlobId::from_raw("&deadbeef.sha256");
        let bind = drive.link_blob(&mut s, "f", 5, blob).unwrap();
        let listed = drive.items(&mut s).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(&listed[0].entry, DirEntry::BindF { name, size, .. } if name == "f" && *size == 5));

        drive.unlink_blob(&mut s, &bind).unwrap();
        assert!(drive.items(&mut s).unwrap().is_empty());

        drive.cd(&mut s, "..").unwrap();
        assert_eq!(drive.pwd(), "/a");
        let b_entry = find_by_name(&drive.current_tangle(&mut s).unwrap(), "b").unwrap();
        drive.rmdir(&mut s, b_entry.this.id()).unwrap();
        assert!(drive.items(&mut s).unwrap().is_empty());
    }

    #[test]
    fn rmdir_refuses_non_empty_directory() {
        let mut s = store();
        let mut drive = Drive::create(&mut s).unwrap();
        let bind = drive.mkdir(&mut s, "a").unwrap();
        drive.cd(&mut s, "a").unwrap();
        drive.link_blob(&mut s, "f", 1, BlobId::from_raw("&x.sha256")).unwrap();
        drive.cd(&mut s, "..").unwrap();
        assert!(matches!(
            drive.rmdir(&mut s, &bind),
            Err(LfsError::DirectoryNotEmpty(_))
        ));
    }

    #[test]
    fn cd_into_unknown_directory_fails() {
        let mut s = store();
        let mut drive = Drive::create(&mut s).unwrap();
        assert!(matches!(
            drive.cd(&mut s, "nope"),
            Err(LfsError::NoSuchDirectory(_))
        ));
    }

    #[test]
    fn close_removes_drive_from_discovery() {
        let mut s = store();
        let drive = Drive::create(&mut s).unwrap();
        let me = s.identity().unwrap().clone();
        assert_eq!(crate::drive::discover_drives(&mut s, &me).unwrap().len(), 1);
        drive.close(&mut s).unwrap();
        assert!(crate::drive::discover_drives(&mut s, &me).unwrap().is_empty());
    }
}
