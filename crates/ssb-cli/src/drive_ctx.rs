//! Opens the local store and resolves "the drive this invocation operates
//! on": an explicit UUID, or the most recently created one.

use ssb_crypto::identity::KeyPair;
use ssb_lfs::{discover_drives, Drive};
use ssb_store::{BlobStore, LogStore};

use crate::config::Config;
use crate::identity;

/// Opens the log store for read/write, creating the identity on first use.
pub fn open_store(cfg: &Config) -> anyhow::Result<LogStore> {
    let seed = identity::load_or_create_seed(&cfg.secret_path())?;
    Ok(LogStore::open(cfg.flume_dir(), Some(KeyPair::from_seed(&seed)), false)?)
}

/// Opens the content-addressed blob store for this user directory.
pub fn open_blobs(cfg: &Config) -> anyhow::Result<BlobStore> {
    Ok(BlobStore::open(cfg.user_dir())?)
}

/// Resolves a drive by UUID (as printed by `drive create`/`drive list`), or
/// the most recently created one if `uuid` is `None`.
pub fn resolve_drive(store: &mut LogStore, uuid: Option<&str>) -> anyhow::Result<Drive> {
    let local_identity = store
        .identity()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no local identity"))?;
    let roots = discover_drives(store, &local_identity)?;
    if roots.is_empty() {
        anyhow::bail!("no drives found; run `drive create` first");
    }

    match uuid {
        None => Ok(Drive::open(store, roots[0].clone())?),
        Some(wanted) => {
            for root in roots {
                let drive = Drive::open(store, root)?;
                if drive.uuid(store)?.to_string() == wanted {
                    return Ok(drive);
                }
            }
            anyhow::bail!("no drive with uuid {wanted}")
        }
    }
}

/// Resolves a drive, then navigates it to `path` (default `/`), the pattern
/// every directory-context subcommand starts from.
pub fn open_at(store: &mut LogStore, uuid: Option<&str>, path: &str) -> anyhow::Result<Drive> {
    let mut drive = resolve_drive(store, uuid)?;
    drive.cd(store, path)?;
    Ok(drive)
}
