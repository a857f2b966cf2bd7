//! Shared, lockable state one connection (or several, concurrently) dispatch
//! against: the log, the blob store, and the local identity.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use ssb_crypto::identity::KeyPair;
use ssb_store::{BlobStore, LogStore};
use ssb_types::{Identity, MessageId};

/// Broadcast capacity for the "a message was appended" event stream. Sized
/// generously since a slow live subscriber only misses events (detected via
/// `RecvError::Lagged`) rather than blocking a writer.
const APPEND_EVENT_CAPACITY: usize = 1024;

/// Published whenever any message (local or received from a peer) is
/// appended to the log, so live `createHistoryStream` subscribers can be
/// woken without polling.
#[derive(Clone, Debug)]
pub struct AppendEvent {
    pub author: Identity,
    pub id: MessageId,
}

/// The state a session driver and its mux-rpc dispatch table share.
///
/// Not itself `Clone`; callers hold it behind an `Arc` so every connection
/// task sees the same log and blob store.
pub struct Node {
    pub store: Mutex<LogStore>,
    pub blobs: BlobStore,
    pub app_key: [u8; 32],
    pub keypair: KeyPair,
    pub friends_path: PathBuf,
    append_events: broadcast::Sender<AppendEvent>,
}

impl Node {
    pub fn new(store: LogStore, blobs: BlobStore, keypair: KeyPair, app_key: [u8; 32], friends_path: PathBuf) -> Arc<Self> {
        let (append_events, _) = broadcast::channel(APPEND_EVENT_CAPACITY);
        Arc::new(Self {
            store: Mutex::new(store),
            blobs,
            app_key,
            keypair,
            friends_path,
            append_events,
        })
    }

    pub fn identity(&self) -> Identity {
        self.keypair.identity()
    }

    pub fn subscribe_appends(&self) -> broadcast::Receiver<AppendEvent> {
        self.append_events.subscribe()
    }

    fn publish(&self, author: Identity, id: MessageId) {
        // No receivers is not an error; it just means nobody is live-tailing.
        let _ = self.append_events.send(AppendEvent { author, id });
    }

    /// Verifies and appends a peer-supplied message, publishing an append
    /// event on success. Idempotent re-appends still publish, which is
    /// harmless: live subscribers key their own state off sequence numbers.
    pub async fn append_verified(&self, json_str: &str) -> ssb_store::error::Result<MessageId> {
        let id = {
            let mut store = self.store.lock().await;
            store.append_verified(json_str)?
        };
        let author = {
            let mut store = self.store.lock().await;
            store.read(&id)?.map(|m| m.author)
        };
        if let Some(author) = author {
            self.publish(author, id.clone());
        }
        Ok(id)
    }

    /// Builds, signs, and appends the next message in the local feed.
    pub async fn write_local(&self, content: serde_json::Value) -> ssb_store::error::Result<MessageId> {
        let id = {
            let mut store = self.store.lock().await;
            store.write_local(content)?
        };
        self.publish(self.identity(), id.clone());
        Ok(id)
    }
}
