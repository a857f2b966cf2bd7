//! Opportunistic blob prefetch: when a directory listing references a blob
//! id not yet present locally, fetch it over an already-connected peer
//! rather than surface it as merely "not available yet".

use serde_json::{json, Value};

use ssb_rpc::muxrpc::{as_error_reply, CallType};
use ssb_rpc::packet_stream::PsBody;
use ssb_types::BlobId;

use crate::connection::Connection;
use crate::error::Result;
use crate::node::Node;

/// Issues `blobs.get` over `conn` for every id in `ids` not already present
/// in `node`'s blob store. Ids the peer doesn't have either are logged and
/// skipped, not treated as fatal — a later sync from a different peer may
/// still produce them.
pub async fn prefetch_missing(node: &Node, conn: &Connection, ids: impl IntoIterator<Item = BlobId>) -> Result<()> {
    for id in ids {
        if node.blobs.has(&id)? {
            continue;
        }
        let args: Value = json!([id.as_str()]);
        let mut replies = conn
            .call(vec!["blobs".to_string(), "get".to_string()], args, CallType::Source)
            .await?;

        let mut bytes = Vec::new();
        while let Some(msg) = replies.recv().await {
            if let Some(err) = as_error_reply(&msg.body) {
                tracing::debug!(target: "ssb_session", blob = %id, error = %err.message, "blob not available from peer");
                bytes.clear();
                break;
            }
            if let PsBody::Buffer(chunk) = &msg.body {
                bytes.extend_from_slice(chunk);
            }
            if msg.end_err {
                break;
            }
        }

        if !bytes.is_empty() {
            node.blobs.write(&bytes)?;
            tracing::debug!(target: "ssb_session", blob = %id, bytes = bytes.len(), "prefetched blob");
        }
    }
    Ok(())
}
