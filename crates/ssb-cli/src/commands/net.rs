//! `sync`, `port`, and `peer`: the subcommands that drive the transport and
//! replication stack rather than operating purely on the local store.

use clap::Args;

use crate::config::Config;
use crate::net;
use crate::peer_addr::PeerAddr;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Peer to replicate against, as `host:port:id`.
    pub peer: PeerAddr,
}

/// One-shot replication: pulls every followed feed's backlog from `peer`,
/// then exits.
pub fn sync(cfg: &Config, args: SyncArgs) -> anyhow::Result<()> {
    net::sync_once(cfg, &args.peer)
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Port to listen on; defaults to the configured port (8008).
    pub port: Option<u16>,
}

/// Becomes a server: listens indefinitely, replicating with whoever
/// connects.
pub fn port(cfg: &Config, args: PortArgs) -> anyhow::Result<()> {
    net::serve(cfg, args.port.unwrap_or(cfg.port))
}

#[derive(Args, Debug)]
pub struct PeerArgs {
    /// Peer to dial, as `host:port:id`.
    pub peer: PeerAddr,
}

/// Dials a peer and stays connected, replicating live until it disconnects.
pub fn peer(cfg: &Config, args: PeerArgs) -> anyhow::Result<()> {
    net::dial_live(cfg, &args.peer)
}
