//! `drive create` / `drive list` / `drive delete`.

use clap::{Args, Subcommand};

use ssb_lfs::{discover_drives, Drive};

use crate::config::Config;
use crate::drive_ctx;

#[derive(Args, Debug)]
pub struct DriveArgs {
    #[clap(subcommand)]
    pub command: DriveCommand,
}

#[derive(Subcommand, Debug)]
pub enum DriveCommand {
    /// Creates a new, empty drive and prints its UUID.
    Create,
    /// Lists every drive this identity has created, newest first.
    List,
    /// Closes a drive (appends a `blocked` marker to its root tangle).
    Delete { uuid: String },
}

pub fn run(cfg: &Config, args: DriveArgs) -> anyhow::Result<()> {
    let mut store = drive_ctx::open_store(cfg)?;
    match args.command {
        DriveCommand::Create => {
            let drive = Drive::create(&mut store)?;
            println!("{}", drive.uuid(&mut store)?);
        }
        DriveCommand::List => {
            let identity = store
                .identity()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no local identity"))?;
            for root in discover_drives(&mut store, &identity)? {
                let created = store.read(root.id())?.map(|m| m.timestamp).unwrap_or(0);
                let drive = Drive::open(&mut store, root)?;
                println!("{}  created={}", drive.uuid(&mut store)?, created);
            }
        }
        DriveCommand::Delete { uuid } => {
            let drive = drive_ctx::resolve_drive(&mut store, Some(&uuid))?;
            drive.close(&mut store)?;
            println!("deleted {uuid}");
        }
    }
    store.flush()?;
    Ok(())
}
