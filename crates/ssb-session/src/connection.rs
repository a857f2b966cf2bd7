//! Glue between the wire-level packet-stream and the higher-level call
//! semantics both [`crate::dispatch`] (serving inbound calls) and
//! [`crate::driver`] (the become-client replication loop) need: a single
//! writer serializing every outbound frame, and a map correlating inbound
//! replies back to the call that originated them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};

use ssb_rpc::muxrpc::{CallType, RpcRequest};
use ssb_rpc::packet_stream::{PacketReader, PacketWriter, PsBody, PsMessage};
use ssb_transport::box_stream::{BoxReader, BoxWriter};

use crate::error::{Result, SessionError};
use crate::node::Node;

/// One frame queued for the connection's single writer task.
pub struct WriteJob {
    pub body: PsBody,
    pub stream: bool,
    pub end_err: bool,
    /// `None` originates a new call (the writer assigns the next id and, if
    /// `assigned` is set, reports it back); `Some(n)` replies to call `n`
    /// (the writer negates it, per the packet-stream convention).
    pub reply_to: Option<i32>,
    pub assigned: Option<oneshot::Sender<i32>>,
}

impl WriteJob {
    pub fn reply(body: PsBody, stream: bool, end_err: bool, reply_to: i32) -> Self {
        Self {
            body,
            stream,
            end_err,
            reply_to: Some(reply_to),
            assigned: None,
        }
    }

    fn call(body: PsBody, stream: bool, assigned: oneshot::Sender<i32>) -> Self {
        Self {
            body,
            stream,
            end_err: false,
            reply_to: None,
            assigned: Some(assigned),
        }
    }
}

type PendingOutbound = Arc<Mutex<HashMap<i32, mpsc::UnboundedSender<PsMessage>>>>;

/// A running connection: one reader task demuxing inbound frames to either
/// a pending outbound call or a freshly dispatched inbound call, and one
/// writer task serializing every outbound frame in turn.
///
/// Cheap to clone: every field is itself a shared handle (a channel sender
/// or an `Arc`), so each become-client task gets its own handle onto the
/// same underlying reader/writer pair.
#[derive(Clone)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<WriteJob>,
    pending: PendingOutbound,
    cancel: broadcast::Sender<()>,
}

impl Connection {
    /// Spawns the reader and writer tasks for an already-handshaked,
    /// box-stream-wrapped duplex connection, and returns a handle for
    /// originating outbound calls against it.
    pub fn spawn<R, W>(reader: BoxReader<R>, writer: BoxWriter<W>, node: Arc<Node>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let pending: PendingOutbound = Arc::new(Mutex::new(HashMap::new()));
        let (cancel_tx, _) = broadcast::channel(1);

        tokio::spawn(writer_task(writer, outbound_rx));
        tokio::spawn(reader_task(
            reader,
            node,
            outbound_tx.clone(),
            pending.clone(),
            cancel_tx.clone(),
        ));

        Self {
            outbound: outbound_tx,
            pending,
            cancel: cancel_tx,
        }
    }

    /// Originates a call and returns a channel of its replies: one message
    /// for `sync`/`async`, a sequence terminated by `end_err` for
    /// `source`/`sink`/`duplex`.
    pub async fn call(&self, name: Vec<String>, args: Value, call_type: CallType) -> Result<mpsc::UnboundedReceiver<PsMessage>> {
        let req = RpcRequest { name, args, call_type };
        let body = req.to_body()?;

        let (assign_tx, assign_rx) = oneshot::channel();
        let job = WriteJob::call(body, call_type.is_streaming(), assign_tx);
        self.outbound.send(job).map_err(|_| SessionError::Closed)?;
        let id = assign_rx.await.map_err(|_| SessionError::Closed)?;

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        self.pending.lock().expect("pending map poisoned").insert(id, reply_tx);
        Ok(reply_rx)
    }

    /// Signals every task spawned off this connection (inbound dispatch,
    /// live history-stream tails) to stop.
    pub fn close(&self) {
        let _ = self.cancel.send(());
    }

    pub fn subscribe_cancel(&self) -> broadcast::Receiver<()> {
        self.cancel.subscribe()
    }
}

async fn writer_task<W: AsyncWrite + Unpin + Send + 'static>(writer: BoxWriter<W>, mut jobs: mpsc::UnboundedReceiver<WriteJob>) {
    let mut writer = PacketWriter::new(writer);
    while let Some(job) = jobs.recv().await {
        let req = match job.reply_to {
            Some(id) => Some(-id),
            None => None,
        };
        let sent = writer.send(&job.body, job.stream, job.end_err, req).await;
        match sent {
            Ok(assigned_id) => {
                if let Some(tx) = job.assigned {
                    let _ = tx.send(assigned_id);
                }
            }
            Err(e) => {
                tracing::warn!(target: "ssb_session", error = %e, "write failed, closing connection writer");
                return;
            }
        }
    }
}

async fn reader_task<R: AsyncRead + Unpin>(
    reader: BoxReader<R>,
    node: Arc<Node>,
    outbound: mpsc::UnboundedSender<WriteJob>,
    pending: PendingOutbound,
    cancel: broadcast::Sender<()>,
) {
    let mut reader = PacketReader::new(reader);
    let mut dispatched: std::collections::HashSet<i32> = std::collections::HashSet::new();
    loop {
        let msg = match reader.read().await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "ssb_session", error = %e, "read failed, closing connection reader");
                break;
            }
        };

        if msg.req < 0 {
            let id = -msg.req;
            let done = msg.end_err;
            let mut table = pending.lock().expect("pending map poisoned");
            if let Some(tx) = table.get(&id) {
                let _ = tx.send(msg);
            }
            if done {
                table.remove(&id);
            }
            continue;
        }

        if dispatched.insert(msg.req) {
            match RpcRequest::from_body(&msg.body) {
                Ok(req) => crate::dispatch::serve(node.clone(), req, msg.req, outbound.clone(), cancel.subscribe()),
                Err(e) => {
                    tracing::warn!(target: "ssb_session", error = %e, "malformed inbound call");
                }
            }
        }
        // Further frames under the same positive id (sink continuations)
        // are not expected by any method this table serves, so they are
        // silently dropped rather than misrouted.
    }
    let _ = cancel.send(());
}
