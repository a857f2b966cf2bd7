//! Networking entry points for the CLI's `sync`, `port`, and `peer`
//! subcommands, and for the on-demand single-blob prefetch `get`/`cat` fall
//! back to when a named file's content isn't local yet.
//!
//! Every fs/drive subcommand is a synchronous, single-shot process
//! invocation, so the async replication stack is only ever driven from
//! inside a short-lived Tokio runtime built for the one call that needs it.

use std::sync::Arc;

use tokio::net::TcpListener;

use ssb_session::{Node, Session, SyncMode};
use ssb_types::BlobId;

use crate::config::Config;
use crate::identity;
use crate::peer_addr::PeerAddr;

fn build_node(cfg: &Config) -> anyhow::Result<Arc<Node>> {
    let seed = identity::load_or_create_seed(&cfg.secret_path())?;
    let store = ssb_store::LogStore::open(cfg.flume_dir(), Some(ssb_crypto::identity::KeyPair::from_seed(&seed)), false)?;
    let blobs = ssb_store::BlobStore::open(cfg.user_dir())?;
    let keypair = ssb_crypto::identity::KeyPair::from_seed(&seed);
    Ok(Node::new(store, blobs, keypair, cfg.app_key, cfg.friends_path()))
}

/// `sync`: dial every known peer... in practice, dial the one peer given and
/// pull its and our followed identities' backlogs once, then exit.
pub fn sync_once(cfg: &Config, peer: &PeerAddr) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let node = build_node(cfg)?;
        let (addr, server_pub) = peer.resolve()?;
        let session = Session::new(node);
        session.dial_tcp(addr, server_pub, SyncMode::OneShot).await?;
        anyhow::Ok(())
    })
}

/// `port`: listen indefinitely, handshaking and replicating with whoever
/// connects.
pub fn serve(cfg: &Config, port: u16) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let node = build_node(cfg)?;
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!(target: "ssb_cli", %port, "listening");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let session = Session::new(node.clone());
            tracing::info!(target: "ssb_cli", %peer_addr, "inbound connection");
            tokio::spawn(async move {
                if let Err(e) = session.accept(stream, SyncMode::Live).await {
                    tracing::warn!(target: "ssb_cli", %peer_addr, error = %e, "connection ended with error");
                }
            });
        }
        #[allow(unreachable_code)]
        anyhow::Ok(())
    })
}

/// `peer host:port:id`: dial out and stay live until the peer disconnects.
pub fn dial_live(cfg: &Config, peer: &PeerAddr) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let node = build_node(cfg)?;
        let (addr, server_pub) = peer.resolve()?;
        let session = Session::new(node);
        session.dial_tcp(addr, server_pub, SyncMode::Live).await?;
        anyhow::Ok(())
    })
}

/// Fetches one missing blob from `peer` over a fresh connection, for
/// `get --peer`/`cat --peer` when the content isn't available locally yet.
pub fn prefetch_one(cfg: &Config, peer: &PeerAddr, blob_id: BlobId) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let node = build_node(cfg)?;
        let (addr, server_pub) = peer.resolve()?;
        let session = Session::new(node.clone());
        let conn = session.dial_tcp_connection(addr, server_pub).await?;
        ssb_session::prefetch_missing(&node, &conn, std::iter::once(blob_id)).await?;
        anyhow::Ok(())
    })
}
