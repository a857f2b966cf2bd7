//! Directory and file operations against one drive: `ls`, `cd`, `mkdir`,
//! `rmdir`, `rm`, `put`, `get`, `cat`, `stat`, `tree`, `pwd`.
//!
//! Every command is a single, stateless invocation: there is no shell
//! session to carry a "current directory" between commands, so each one
//! takes `--path` (default `/`) naming the directory it operates in.

use clap::Args;

use ssb_lfs::DirEntry;

use crate::config::Config;
use crate::drive_ctx;
use crate::glob;
use crate::human_size;
use crate::peer_addr::PeerAddr;

const TREE_DEPTH_CAP: usize = 75;

#[derive(Args, Debug)]
pub struct DriveSelect {
    /// Drive UUID; defaults to the most recently created drive.
    #[clap(long)]
    pub drive: Option<String>,
    /// Directory within the drive to operate in.
    #[clap(long, default_value = "/")]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    /// Only list entries whose name matches this glob.
    pub glob: Option<String>,
    #[clap(short = 'l')]
    pub long: bool,
    #[clap(short = 'h')]
    pub human: bool,
}

pub fn ls(cfg: &Config, args: LsArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    let mut entries = drive.items(&mut store)?;
    entries.sort_by(|a, b| a.entry.name().cmp(&b.entry.name()));

    for e in &entries {
        let Some(name) = e.entry.name() else { continue };
        if let Some(pattern) = &args.glob {
            if !glob::matches(pattern, name) {
                continue;
            }
        }
        if !args.long {
            println!("{name}");
            continue;
        }
        let kind = if e.entry.is_directory() { 'd' } else { '-' };
        let size = match &e.entry {
            DirEntry::BindF { size, .. } => {
                if args.human {
                    human_size::format(*size)
                } else {
                    size.to_string()
                }
            }
            _ => "-".to_string(),
        };
        println!("{kind} {size:>8} {name}");
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct CdArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
}

pub fn cd(cfg: &Config, args: CdArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    println!("{}", drive.pwd());
    Ok(())
}

#[derive(Args, Debug)]
pub struct PwdArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
}

pub fn pwd(cfg: &Config, args: PwdArgs) -> anyhow::Result<()> {
    cd(cfg, CdArgs { select: args.select })
}

#[derive(Args, Debug)]
pub struct MkdirArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    pub name: String,
}

pub fn mkdir(cfg: &Config, args: MkdirArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let mut drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    drive.mkdir(&mut store, &args.name)?;
    store.flush()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct RmdirArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    pub name: String,
}

pub fn rmdir(cfg: &Config, args: RmdirArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let mut drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    let entries = drive.items(&mut store)?;
    let target = entries
        .iter()
        .find(|e| e.entry.name() == Some(args.name.as_str()) && e.entry.is_directory())
        .ok_or_else(|| anyhow::anyhow!("no such directory: {}", args.name))?;
    drive.rmdir(&mut store, target.this.id())?;
    store.flush()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct RmArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    /// Glob matching the file name(s) to remove.
    pub glob: String,
}

pub fn rm(cfg: &Config, args: RmArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let mut drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    let entries = drive.items(&mut store)?;
    let mut removed = 0;
    for e in &entries {
        let Some(name) = e.entry.name() else { continue };
        if e.entry.is_directory() || !glob::matches(&args.glob, name) {
            continue;
        }
        drive.unlink_blob(&mut store, e.this.id())?;
        removed += 1;
    }
    if removed == 0 {
        anyhow::bail!("no such file: {}", args.glob);
    }
    store.flush()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct PutArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    /// Local file to upload.
    pub local: std::path::PathBuf,
    /// Name to bind it under; defaults to the local file's name.
    #[clap(long)]
    pub remote: Option<String>,
}

pub fn put(cfg: &Config, args: PutArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.local)?;
    let remote = args.remote.unwrap_or_else(|| {
        args.local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    });

    let mut store = drive_ctx::open_store(cfg)?;
    let blobs = drive_ctx::open_blobs(cfg)?;
    let blob_id = blobs.write(&bytes)?;

    let mut drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    drive.link_blob(&mut store, &remote, bytes.len() as u64, blob_id)?;
    store.flush()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    pub remote: String,
    /// Local path to write to; defaults to the remote name.
    #[clap(long)]
    pub local: Option<std::path::PathBuf>,
    /// Peer to fetch the blob from if it isn't present locally yet.
    #[clap(long)]
    pub peer: Option<PeerAddr>,
}

pub fn get(cfg: &Config, args: GetArgs) -> anyhow::Result<()> {
    let bytes = read_named_blob(cfg, &args.select, &args.remote, args.peer.as_ref())?;
    let local = args.local.unwrap_or_else(|| std::path::PathBuf::from(&args.remote));
    std::fs::write(&local, &bytes)?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct CatArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    pub remote: String,
    #[clap(long)]
    pub peer: Option<PeerAddr>,
}

pub fn cat(cfg: &Config, args: CatArgs) -> anyhow::Result<()> {
    let bytes = read_named_blob(cfg, &args.select, &args.remote, args.peer.as_ref())?;
    match String::from_utf8(bytes) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("{}", String::from_utf8_lossy(e.as_bytes())),
    }
    Ok(())
}

fn read_named_blob(
    cfg: &Config,
    select: &DriveSelect,
    remote: &str,
    peer: Option<&PeerAddr>,
) -> anyhow::Result<Vec<u8>> {
    let mut store = drive_ctx::open_store(cfg)?;
    let drive = drive_ctx::open_at(&mut store, select.drive.as_deref(), &select.path)?;
    let entries = drive.items(&mut store)?;
    let blob_id = entries
        .iter()
        .find_map(|e| match &e.entry {
            DirEntry::BindF { name, blobkey, .. } if name == remote => Some(blobkey.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow::anyhow!("no such file, or content not available (yet): {remote}"))?;

    let blobs = drive_ctx::open_blobs(cfg)?;
    if !blobs.has(&blob_id)? {
        match peer {
            Some(peer) => {
                crate::net::prefetch_one(cfg, peer, blob_id.clone())?;
            }
            None => anyhow::bail!("no such file, or content not available (yet): {remote}"),
        }
    }
    Ok(blobs.read(&blob_id)?)
}

#[derive(Args, Debug)]
pub struct StatArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    pub glob: Option<String>,
}

pub fn stat(cfg: &Config, args: StatArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    let entries = drive.items(&mut store)?;
    for e in &entries {
        let Some(name) = e.entry.name() else { continue };
        if let Some(pattern) = &args.glob {
            if !glob::matches(pattern, name) {
                continue;
            }
        }
        let record = serde_json::json!({
            "name": name,
            "creator": e.this.author().as_str(),
            "dentkey": e.this.id().as_str(),
            "timestamp": e.timestamp,
            "entry": &e.entry,
        });
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[clap(flatten)]
    pub select: DriveSelect,
    #[clap(short = 'h')]
    pub human: bool,
}

pub fn tree(cfg: &Config, args: TreeArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    let drive = drive_ctx::open_at(&mut store, args.select.drive.as_deref(), &args.select.path)?;
    println!(".");
    print_tree(&mut store, drive.root().clone(), "", args.human, 0)
}

fn print_tree(
    store: &mut ssb_store::LogStore,
    dirref: ssb_tangle::TangleRef,
    prefix: &str,
    human: bool,
    depth: usize,
) -> anyhow::Result<()> {
    if depth > TREE_DEPTH_CAP {
        println!("{prefix}...");
        return Ok(());
    }
    let tangle = ssb_tangle::Tangle::load(store, dirref)?;
    let mut entries = ssb_lfs::items(&tangle);
    entries.sort_by(|a, b| a.entry.name().cmp(&b.entry.name()));

    let count = entries.len();
    for (i, e) in entries.iter().enumerate() {
        let Some(name) = e.entry.name() else { continue };
        let is_last = i + 1 == count;
        let branch = if is_last { "'-- " } else { "|-- " };
        let label = match &e.entry {
            DirEntry::BindD { .. } => format!("{name}/"),
            DirEntry::BindF { size, .. } if human => format!("{name} ({})", human_size::format(*size)),
            _ => name.to_string(),
        };
        println!("{prefix}{branch}{label}");
        if let DirEntry::BindD { dirref, .. } = &e.entry {
            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "|   " });
            print_tree(store, dirref.clone(), &child_prefix, human, depth + 1)?;
        }
    }
    Ok(())
}
