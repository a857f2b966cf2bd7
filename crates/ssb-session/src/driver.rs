//! The replication driver: handshakes a connection, then runs a
//! become-client task per followed identity (including the local one, so a
//! peer's own backlog reaches us too) alongside serving whatever the other
//! side asks of us.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use ssb_crypto::identity::identity_from_public;
use ssb_rpc::muxrpc::CallType;
use ssb_rpc::packet_stream::PsBody;
use ssb_store::friends::load_follows;
use ssb_transport::box_stream::{BoxReader, BoxWriter};
use ssb_transport::handshake::{client_handshake, server_handshake, BoxKeys};
use ssb_types::Identity;

use crate::connection::Connection;
use crate::error::{Result, SessionError};
use crate::node::Node;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether a connection replicates once and returns, or stays open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Run every become-client task's backlog to completion, then close.
    OneShot,
    /// Keep every become-client task's `createHistoryStream` call live and
    /// keep serving inbound calls until the peer disconnects.
    Live,
}

/// Drives one connection to completion: handshake, then replication in
/// both directions until the peer disconnects (or, in [`SyncMode::OneShot`],
/// until every followed feed's backlog has been pulled).
pub struct Session {
    node: Arc<Node>,
    handshake_timeout: Duration,
}

impl Session {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accepts an already-connected duplex stream as the server side.
    pub async fn accept<S>(&self, mut stream: S, mode: SyncMode) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (keys, remote_pub) = tokio::time::timeout(
            self.handshake_timeout,
            server_handshake(&mut stream, &self.node.keypair, &self.node.app_key),
        )
        .await
        .map_err(|_| SessionError::HandshakeTimeout)??;
        let peer = identity_from_public(&remote_pub);
        tracing::info!(target: "ssb_session", peer = %peer, "accepted connection");
        self.run(stream, keys, mode).await
    }

    /// Dials out to a peer whose long-term public key is already known.
    pub async fn dial<S>(&self, mut stream: S, server_pub: [u8; 32], mode: SyncMode) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let keys = tokio::time::timeout(
            self.handshake_timeout,
            client_handshake(&mut stream, &self.node.keypair, &server_pub, &self.node.app_key),
        )
        .await
        .map_err(|_| SessionError::HandshakeTimeout)??;
        tracing::info!(target: "ssb_session", peer = %identity_from_public(&server_pub), "dialed connection");
        self.run(stream, keys, mode).await
    }

    /// Connects over TCP and dials, for the CLI's `peer host:port:id` command.
    pub async fn dial_tcp(&self, addr: SocketAddr, server_pub: [u8; 32], mode: SyncMode) -> Result<()> {
        let stream = TcpStream::connect(addr).await?;
        self.dial(stream, server_pub, mode).await
    }

    /// Handshakes and wires up a connection without starting any
    /// become-client replication task, for callers (the CLI's
    /// blob-prefetch path) that just need a handle to issue their own
    /// calls against an already-authenticated peer.
    pub async fn dial_tcp_connection(&self, addr: SocketAddr, server_pub: [u8; 32]) -> Result<Connection> {
        let mut stream = TcpStream::connect(addr).await?;
        let keys = tokio::time::timeout(
            self.handshake_timeout,
            client_handshake(&mut stream, &self.node.keypair, &server_pub, &self.node.app_key),
        )
        .await
        .map_err(|_| SessionError::HandshakeTimeout)??;
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = BoxReader::new(read_half, keys.decrypt_key, keys.decrypt_nonce);
        let writer = BoxWriter::new(write_half, keys.encrypt_key, keys.encrypt_nonce);
        Ok(Connection::spawn(reader, writer, self.node.clone()))
    }

    async fn run<S>(&self, stream: S, keys: BoxKeys, mode: SyncMode) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = BoxReader::new(read_half, keys.decrypt_key, keys.decrypt_nonce);
        let writer = BoxWriter::new(write_half, keys.encrypt_key, keys.encrypt_nonce);
        let conn = Connection::spawn(reader, writer, self.node.clone());

        let targets = self.replication_targets()?;
        let live = mode == SyncMode::Live;
        let mut tasks = Vec::new();
        for id in targets {
            let conn_handle = conn.clone();
            let node = self.node.clone();
            tasks.push(tokio::spawn(become_client(conn_handle, node, id, live)));
        }

        match mode {
            SyncMode::OneShot => {
                for task in tasks {
                    let _ = task.await;
                }
                conn.close();
            }
            SyncMode::Live => {
                let mut cancelled = conn.subscribe_cancel();
                let _ = cancelled.recv().await;
                for task in tasks {
                    task.abort();
                }
            }
        }
        Ok(())
    }

    fn replication_targets(&self) -> Result<Vec<Identity>> {
        let me = self.node.identity();
        let mut targets = load_follows(&self.node.friends_path, &me)?;
        targets.insert(me);
        Ok(targets.into_iter().collect())
    }
}

/// Follows one identity's feed over an already-handshaked connection:
/// requests everything after the last sequence we have, verifies and
/// appends each message, and (in live mode) keeps the call open for new
/// messages as the peer produces them.
async fn become_client(conn: Connection, node: Arc<Node>, id: Identity, live: bool) -> Result<()> {
    let next_seq = {
        let store = node.store.lock().await;
        store.latest(&id).1 + 1
    };
    let args: Value = json!([{
        "id": id.as_str(),
        "seq": next_seq,
        "live": live,
        "keys": true,
    }]);

    let mut replies = conn.call(vec!["createHistoryStream".to_string()], args, CallType::Source).await?;

    while let Some(msg) = replies.recv().await {
        if let Some(err) = ssb_rpc::muxrpc::as_error_reply(&msg.body) {
            tracing::warn!(target: "ssb_session", peer_feed = %id, error = %err.message, "createHistoryStream error");
            break;
        }
        if msg.end_err {
            if matches!(msg.body, PsBody::Json(Value::Bool(true))) {
                tracing::debug!(target: "ssb_session", peer_feed = %id, "history stream caught up");
            }
            break;
        }
        let Some(json) = msg.body.as_json() else { continue };
        let Some(value) = json.get("value") else { continue };
        let value_str = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "ssb_session", error = %e, "could not re-serialize history frame");
                continue;
            }
        };
        match node.append_verified(&value_str).await {
            Ok(_) => {}
            Err(ssb_store::StoreError::SequenceGap { author, expected, got }) => {
                tracing::warn!(target: "ssb_session", %author, expected, got, "sequence gap from peer, continuing without forced fill");
            }
            Err(e) => {
                tracing::warn!(target: "ssb_session", error = %e, "rejected message from peer");
            }
        }
    }
    Ok(())
}
