//! End-to-end replication over an in-memory duplex transport: a peer with a
//! backlog, a peer with none, a one-shot sync, and a re-run that proves the
//! sync is idempotent.

use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use ssb_crypto::identity::KeyPair;
use ssb_session::{Node, Session, SyncMode};
use ssb_store::{BlobStore, LogStore};

const APP_KEY: [u8; 32] = [7u8; 32];

fn make_node(dir: &std::path::Path, seed: [u8; 32]) -> Arc<Node> {
    let store = LogStore::open(dir.join("flume"), Some(KeyPair::from_seed(&seed)), false).unwrap();
    let blobs = BlobStore::open(dir).unwrap();
    Node::new(store, blobs, KeyPair::from_seed(&seed), APP_KEY, dir.join("friends.json"))
}

#[tokio::test]
async fn one_shot_sync_pulls_full_backlog_and_is_idempotent() {
    let x_dir = tempdir().unwrap();
    let y_dir = tempdir().unwrap();

    let x_seed = KeyPair::generate().to_secret_bytes();
    let y_seed = KeyPair::generate().to_secret_bytes();
    let x_pub = KeyPair::from_seed(&x_seed).public_bytes();

    let x_node = make_node(x_dir.path(), x_seed);
    for i in 0..10 {
        x_node
            .write_local(json!({"type": "post", "text": format!("message {i}")}))
            .await
            .unwrap();
    }

    let y_node = make_node(y_dir.path(), y_seed);
    // y follows x so x's feed is a replication target from y's side.
    std::fs::write(
        y_dir.path().join("friends.json"),
        format!(
            r#"{{"version":2,"seq":1,"value":{{"{}":{{"{}":true}}}}}}"#,
            y_node.identity(),
            x_node.identity(),
        ),
    )
    .unwrap();

    let (x_sock, y_sock) = tokio::io::duplex(64 * 1024);

    let x_session = Session::new(x_node.clone());
    let y_session = Session::new(y_node.clone());

    let x_fut = x_session.accept(x_sock, SyncMode::OneShot);
    let y_fut = y_session.dial(y_sock, x_pub, SyncMode::OneShot);
    let (x_res, y_res) = tokio::join!(x_fut, y_fut);
    x_res.unwrap();
    y_res.unwrap();

    {
        let mut store = y_node.store.lock().await;
        assert_eq!(store.latest(&x_node.identity()).1, 10);
        let first = store.get_by_seq(&x_node.identity(), 1).unwrap().unwrap();
        assert_eq!(first.content["text"], "message 0");
        let last = store.get_by_seq(&x_node.identity(), 10).unwrap().unwrap();
        assert_eq!(last.content["text"], "message 9");
    }

    // Re-running the sync against an already-caught-up peer should not
    // error and should leave the feed exactly where it was.
    let (x_sock2, y_sock2) = tokio::io::duplex(64 * 1024);
    let x_fut2 = x_session.accept(x_sock2, SyncMode::OneShot);
    let y_fut2 = y_session.dial(y_sock2, x_pub, SyncMode::OneShot);
    let (x_res2, y_res2) = tokio::join!(x_fut2, y_fut2);
    x_res2.unwrap();
    y_res2.unwrap();

    let mut store = y_node.store.lock().await;
    assert_eq!(store.latest(&x_node.identity()).1, 10);
}
