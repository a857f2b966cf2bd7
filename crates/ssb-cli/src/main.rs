//! `ssb-drive`: a command-line front end over the logical filesystem,
//! replicated peer-to-peer over a mutually-authenticated transport.
//!
//! This binary is a thin wrapper: every subcommand below parses its flags,
//! resolves [`config::Config`], and calls straight into `ssb-store` /
//! `ssb-lfs` / `ssb-session`. It holds no state of its own beyond what one
//! invocation needs.

mod commands;
mod config;
mod drive_ctx;
mod glob;
mod human_size;
mod identity;
mod net;
mod peer_addr;
mod telemetry;

use clap::{Parser, Subcommand};

use commands::{drive, fs, net as net_cmd};
use config::{Config, ConfigOverrides};

#[derive(Parser, Debug)]
#[command(name = "ssb-drive", about = "A peer-to-peer logical filesystem over an append-only signed log")]
struct Cli {
    /// Overrides the home directory (default `$HOME/.ssb-drive`).
    #[clap(long, global = true)]
    home: Option<std::path::PathBuf>,
    /// Selects a named identity under `<home>/user.<name>`.
    #[clap(long, global = true)]
    user: Option<String>,
    /// Overrides the application key (base64), for talking to a non-default network.
    #[clap(long, global = true)]
    app_key: Option<String>,
    /// Overrides the default port used by `port`/`sync` when unspecified.
    #[clap(long, global = true)]
    port: Option<u16>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, list, or delete drives.
    Drive(drive::DriveArgs),
    /// List a directory's entries.
    Ls(fs::LsArgs),
    /// Resolve and print a directory path (there is no persistent shell
    /// session, so this is equivalent to `pwd --path <path>`).
    Cd(fs::CdArgs),
    /// Print the resolved path for `--path`.
    Pwd(fs::PwdArgs),
    /// Create a subdirectory.
    Mkdir(fs::MkdirArgs),
    /// Remove an empty subdirectory.
    Rmdir(fs::RmdirArgs),
    /// Unlink a file by name (glob-matched).
    Rm(fs::RmArgs),
    /// Upload a local file and bind it under a name.
    Put(fs::PutArgs),
    /// Download a named file to a local path.
    Get(fs::GetArgs),
    /// Print a named file's contents to stdout.
    Cat(fs::CatArgs),
    /// Print one JSON record per matching entry.
    Stat(fs::StatArgs),
    /// Print the directory tree rooted at `--path`.
    Tree(fs::TreeArgs),
    /// Replicate once against a peer, then exit.
    Sync(net_cmd::SyncArgs),
    /// Listen for inbound connections indefinitely.
    Port(net_cmd::PortArgs),
    /// Dial a peer and stay connected, replicating live.
    Peer(net_cmd::PeerArgs),
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing()?;
    let cli = Cli::parse();
    let cfg = Config::resolve(ConfigOverrides {
        home: cli.home,
        user: cli.user,
        app_key: cli.app_key,
        port: cli.port,
    })?;

    match cli.command {
        Command::Drive(args) => drive::run(&cfg, args),
        Command::Ls(args) => fs::ls(&cfg, args),
        Command::Cd(args) => fs::cd(&cfg, args),
        Command::Pwd(args) => fs::pwd(&cfg, args),
        Command::Mkdir(args) => fs::mkdir(&cfg, args),
        Command::Rmdir(args) => fs::rmdir(&cfg, args),
        Command::Rm(args) => fs::rm(&cfg, args),
        Command::Put(args) => fs::put(&cfg, args),
        Command::Get(args) => fs::get(&cfg, args),
        Command::Cat(args) => fs::cat(&cfg, args),
        Command::Stat(args) => fs::stat(&cfg, args),
        Command::Tree(args) => fs::tree(&cfg, args),
        Command::Sync(args) => net_cmd::sync(&cfg, args),
        Command::Port(args) => net_cmd::port(&cfg, args),
        Command::Peer(args) => net_cmd::peer(&cfg, args),
    }
}
