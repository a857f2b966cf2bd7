//! Packet-stream: the 9-byte-header request/reply framing mux-rpc runs on
//! top of a box-stream transport.
//!
//! Each packet is one header segment followed by zero or more body segments,
//! each body segment being one box-stream frame of at most
//! [`ssb_transport::box_stream::MAX_SEGMENT_SIZE`] bytes. The number of body
//! segments a reader must pull is `ceil(length / MAX_SEGMENT_SIZE)`, which is
//! also how many segments the writer produced; a naive `length / 4096 + 1`
//! over-reads by one segment whenever `length` is an exact multiple of 4096.

use tokio::io::{AsyncRead, AsyncWrite};

use ssb_transport::box_stream::{BoxReader, BoxWriter, MAX_SEGMENT_SIZE};

use crate::error::{Result, RpcError};

/// The three payload encodings a packet-stream body may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PsMessageType {
    Buffer = 0,
    Text = 1,
    Json = 2,
}

impl PsMessageType {
    fn from_flags(flags: u8) -> Result<Self> {
        match flags & 0x03 {
            0 => Ok(Self::Buffer),
            1 => Ok(Self::Text),
            2 => Ok(Self::Json),
            other => Err(RpcError::MalformedPacket(format!("unknown packet type {other}"))),
        }
    }
}

/// A decoded packet-stream body, carrying its payload in whichever encoding
/// the header's type bits named.
#[derive(Clone, Debug)]
pub enum PsBody {
    Buffer(Vec<u8>),
    Text(String),
    Json(serde_json::Value),
}

impl PsBody {
    pub fn msg_type(&self) -> PsMessageType {
        match self {
            Self::Buffer(_) => PsMessageType::Buffer,
            Self::Text(_) => PsMessageType::Text,
            Self::Json(_) => PsMessageType::Json,
        }
    }

    /// The wire encoding of this body, as written after the packet header.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Self::Buffer(b) => b.clone(),
            Self::Text(s) => s.as_bytes().to_vec(),
            Self::Json(v) => serde_json::to_vec(v)?,
        })
    }

    fn from_bytes(msg_type: PsMessageType, raw: Vec<u8>) -> Result<Self> {
        Ok(match msg_type {
            PsMessageType::Buffer => Self::Buffer(raw),
            PsMessageType::Text => {
                Self::Text(String::from_utf8(raw).map_err(|e| RpcError::MalformedPacket(e.to_string()))?)
            }
            PsMessageType::Json => Self::Json(serde_json::from_slice(&raw)?),
        })
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// One packet-stream message: a body plus its framing metadata.
#[derive(Clone, Debug)]
pub struct PsMessage {
    pub body: PsBody,
    /// Set on every packet belonging to a `source`/`sink`/`duplex` call.
    pub stream: bool,
    /// Set on the final packet of a stream, or on an error reply.
    pub end_err: bool,
    /// Positive for an outbound call, negative for a reply to `-req`.
    pub req: i32,
}

/// `ceil(length / MAX_SEGMENT_SIZE)`: the number of box-stream frames a body
/// of `length` bytes was (and must be) split across.
fn body_segment_count(length: usize) -> usize {
    (length + MAX_SEGMENT_SIZE - 1) / MAX_SEGMENT_SIZE
}

/// Reads packet-stream messages off a box-stream reader.
pub struct PacketReader<R> {
    inner: BoxReader<R>,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    pub fn new(inner: BoxReader<R>) -> Self {
        Self { inner }
    }

    /// Reads the next message, or `Ok(None)` if the peer closed the stream.
    pub async fn read(&mut self) -> Result<Option<PsMessage>> {
        let Some(header) = self.inner.read().await? else {
            return Ok(None);
        };
        if header.len() != 9 {
            return Err(RpcError::MalformedPacket(format!(
                "packet header is {} bytes, expected 9",
                header.len()
            )));
        }
        let flags = header[0];
        let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        let req = i32::from_be_bytes([header[5], header[6], header[7], header[8]]);

        let msg_type = PsMessageType::from_flags(flags)?;
        let stream = flags & 0x08 != 0;
        let end_err = flags & 0x04 != 0;

        let mut raw = Vec::with_capacity(length);
        for _ in 0..body_segment_count(length) {
            let Some(segment) = self.inner.read().await? else {
                return Err(RpcError::MalformedPacket("connection closed mid-body".into()));
            };
            raw.extend_from_slice(&segment);
        }
        if raw.len() != length {
            return Err(RpcError::MalformedPacket(format!(
                "body length mismatch: header said {length}, read {}",
                raw.len()
            )));
        }

        Ok(Some(PsMessage {
            body: PsBody::from_bytes(msg_type, raw)?,
            stream,
            end_err,
            req,
        }))
    }
}

/// Writes packet-stream messages to a box-stream writer, tracking the
/// monotonically increasing request-id counter for locally originated calls.
pub struct PacketWriter<W> {
    inner: BoxWriter<W>,
    req_counter: i32,
}

impl<W: AsyncWrite + Unpin> PacketWriter<W> {
    pub fn new(inner: BoxWriter<W>) -> Self {
        Self { inner, req_counter: 1 }
    }

    /// The request id the next call (with `req: None`) will be assigned.
    pub fn next_req(&self) -> i32 {
        self.req_counter
    }

    /// Writes one packet. Pass `req: None` to originate a new call (consumes
    /// and advances the counter); pass `Some(-n)` to reply to call `n`.
    pub async fn send(&mut self, body: &PsBody, stream: bool, end_err: bool, req: Option<i32>) -> Result<i32> {
        let req = req.unwrap_or_else(|| {
            let r = self.req_counter;
            self.req_counter += 1;
            r
        });

        let data = body.to_bytes()?;
        let flags = ((stream as u8) << 3) | ((end_err as u8) << 2) | (body.msg_type() as u8);
        let mut header = [0u8; 9];
        header[0] = flags;
        header[1..5].copy_from_slice(&(data.len() as u32).to_be_bytes());
        header[5..9].copy_from_slice(&req.to_be_bytes());

        self.inner.write_all(&header).await?;
        self.inner.write_all(&data).await?;
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_count_handles_exact_multiples() {
        assert_eq!(body_segment_count(0), 0);
        assert_eq!(body_segment_count(1), 1);
        assert_eq!(body_segment_count(4096), 1);
        assert_eq!(body_segment_count(4097), 2);
        assert_eq!(body_segment_count(8192), 2);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_a_json_call() {
        let key = [3u8; 32];
        let nonce = [4u8; 24];
        let mut buf = Vec::new();
        {
            let box_writer = BoxWriter::new(&mut buf, key, nonce);
            let mut writer = PacketWriter::new(box_writer);
            let body = PsBody::Json(serde_json::json!({"name": ["createHistoryStream"], "args": [{}]}));
            let req = writer.send(&body, true, false, None).await.unwrap();
            assert_eq!(req, 1);
        }

        let box_reader = BoxReader::new(std::io::Cursor::new(buf), key, nonce);
        let mut reader = PacketReader::new(box_reader);
        let msg = reader.read().await.unwrap().unwrap();
        assert_eq!(msg.req, 1);
        assert!(msg.stream);
        assert!(!msg.end_err);
        let json = msg.body.as_json().unwrap();
        assert_eq!(json["name"][0], "createHistoryStream");
    }

    #[tokio::test]
    async fn large_body_round_trips_across_multiple_segments() {
        let key = [9u8; 32];
        let nonce = [1u8; 24];
        let payload = vec![0x42u8; 9000];
        let mut buf = Vec::new();
        {
            let box_writer = BoxWriter::new(&mut buf, key, nonce);
            let mut writer = PacketWriter::new(box_writer);
            writer
                .send(&PsBody::Buffer(payload.clone()), false, false, None)
                .await
                .unwrap();
        }

        let box_reader = BoxReader::new(std::io::Cursor::new(buf), key, nonce);
        let mut reader = PacketReader::new(box_reader);
        let msg = reader.read().await.unwrap().unwrap();
        match msg.body {
            PsBody::Buffer(b) => assert_eq!(b, payload),
            _ => panic!("expected buffer body"),
        }
    }
}
