//! The mux-rpc method table: what a peer's incoming call actually does
//! against the local [`crate::node::Node`].
//!
//! Three methods are implemented, matching what this system's peers need
//! from each other: `createHistoryStream` (replication), `blobs.get`
//! (blob transfer), and `blobs.createWants` (accepted and immediately
//! closed — this system never announces blob wants of its own).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use ssb_rpc::muxrpc::{RpcErrorReply, RpcRequest};
use ssb_rpc::packet_stream::PsBody;
use ssb_types::{BlobId, Identity};

use crate::connection::WriteJob;
use crate::node::Node;

#[derive(Deserialize)]
struct HistoryStreamArgs {
    id: Identity,
    #[serde(default)]
    seq: u64,
    #[serde(default)]
    live: bool,
    #[serde(default = "default_true")]
    keys: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct BlobGetArgs {
    #[serde(alias = "key")]
    id: BlobId,
}

/// Dispatches one incoming call, spawning whatever task(s) it takes to
/// serve it and sending replies back over `reply_to` (the call's id,
/// negated, per the packet-stream convention). Returns immediately; the
/// dispatched work (which may be open-ended, for `live` history streams)
/// runs in the background until the connection closes.
pub fn serve(node: Arc<Node>, req: RpcRequest, reply_to: i32, out: mpsc::UnboundedSender<WriteJob>, mut cancelled: tokio::sync::broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let method = req.method();
        let result = match method.as_str() {
            "createHistoryStream" => serve_history_stream(&node, &req, reply_to, &out, &mut cancelled).await,
            "blobs.get" => serve_blobs_get(&node, &req, reply_to, &out).await,
            "blobs.createWants" => serve_blobs_create_wants(reply_to, &out).await,
            other => Err(crate::error::SessionError::NoSuchMethod(other.to_string())),
        };
        if let Err(e) = result {
            let reply = RpcErrorReply::new(e.to_string());
            if let Ok(body) = reply.to_body() {
                let _ = out.send(WriteJob::reply(body, false, true, reply_to));
            }
        }
    });
}

async fn serve_history_stream(
    node: &Arc<Node>,
    req: &RpcRequest,
    reply_to: i32,
    out: &mpsc::UnboundedSender<WriteJob>,
    cancelled: &mut tokio::sync::broadcast::Receiver<()>,
) -> crate::error::Result<()> {
    let args: HistoryStreamArgs = parse_first_arg(&req.args)?;

    let mut seq = if args.seq == 0 { 1 } else { args.seq };
    loop {
        let msg = {
            let mut store = node.store.lock().await;
            store.get_by_seq(&args.id, seq)?
        };
        let Some(msg) = msg else { break };
        let body = render_history_frame(&args, &msg)?;
        if out.send(WriteJob::reply(body, true, false, reply_to)).is_err() {
            return Ok(());
        }
        seq += 1;
    }

    if !args.live {
        let _ = out.send(WriteJob::reply(PsBody::Json(Value::Bool(true)), true, true, reply_to));
        return Ok(());
    }

    let mut rx = node.subscribe_appends();
    loop {
        tokio::select! {
            _ = cancelled.recv() => return Ok(()),
            event = rx.recv() => {
                match event {
                    Ok(ev) if ev.author == args.id => {
                        let Some(msg) = ({
                            let mut store = node.store.lock().await;
                            store.read(&ev.id)?
                        }) else { continue };
                        if msg.sequence < seq {
                            // Already emitted from the backlog scan above.
                            continue;
                        }
                        let body = render_history_frame(&args, &msg)?;
                        if out.send(WriteJob::reply(body, true, false, reply_to)).is_err() {
                            return Ok(());
                        }
                        seq = msg.sequence + 1;
                    }
                    Ok(_) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

fn render_history_frame(args: &HistoryStreamArgs, msg: &ssb_types::SignedMessage) -> crate::error::Result<PsBody> {
    if args.keys {
        let id = ssb_crypto::identity::message_id_for(
            ssb_types::canonical::render_signed(msg).as_bytes(),
        );
        Ok(PsBody::Json(json!({
            "key": id,
            "value": msg,
        })))
    } else {
        Ok(PsBody::Json(serde_json::to_value(msg)?))
    }
}

async fn serve_blobs_get(
    node: &Arc<Node>,
    req: &RpcRequest,
    reply_to: i32,
    out: &mpsc::UnboundedSender<WriteJob>,
) -> crate::error::Result<()> {
    let args: BlobGetArgs = parse_first_arg(&req.args)?;
    if !node.blobs.has(&args.id)? {
        let err = RpcErrorReply::new(format!("blob not found: {}", args.id));
        let _ = out.send(WriteJob::reply(err.to_body()?, true, true, reply_to));
        return Ok(());
    }
    let bytes = node.blobs.read(&args.id)?;
    let _ = out.send(WriteJob::reply(PsBody::Buffer(bytes), true, false, reply_to));
    let _ = out.send(WriteJob::reply(PsBody::Json(Value::Bool(true)), true, true, reply_to));
    Ok(())
}

async fn serve_blobs_create_wants(reply_to: i32, out: &mpsc::UnboundedSender<WriteJob>) -> crate::error::Result<()> {
    let _ = out.send(WriteJob::reply(PsBody::Json(json!({})), true, true, reply_to));
    Ok(())
}

fn parse_first_arg<T: serde::de::DeserializeOwned>(args: &Value) -> crate::error::Result<T> {
    let first = args
        .get(0)
        .ok_or_else(|| ssb_rpc::RpcError::MalformedPacket("call is missing its first argument".into()))?;
    Ok(serde_json::from_value(first.clone())?)
}
