//! Box-stream: authenticated, length-framed encryption over a raw duplex
//! socket, keyed by the four values a completed handshake produces.
//!
//! Every frame is `header(34) || ciphertext(<=4096)`. The header is itself a
//! sealed box whose 18-byte plaintext is `length(u16 BE) || body_mac(16)`;
//! the body's MAC travels inside the header rather than alongside its own
//! ciphertext. A frame whose header plaintext is 18 zero bytes, with no body,
//! terminates the stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::boxes::{open, seal};
use crate::error::{Result, TransportError};

pub const HEADER_LEN: usize = 2 + 16 + 16;
pub const MAX_SEGMENT_SIZE: usize = 4 * 1024;
const TERMINATION_PLAINTEXT: [u8; 18] = [0u8; 18];

/// Increments a 24-byte big-endian counter nonce, wrapping at 2^192.
pub fn inc_nonce(nonce: &[u8; 24]) -> [u8; 24] {
    let mut out = *nonce;
    for byte in out.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
    out
}

/// Writes authenticated, framed ciphertext to an underlying async writer.
pub struct BoxWriter<W> {
    writer: W,
    key: [u8; 32],
    nonce: [u8; 24],
}

impl<W: AsyncWrite + Unpin> BoxWriter<W> {
    pub fn new(writer: W, key: [u8; 32], nonce: [u8; 24]) -> Self {
        Self { writer, key, nonce }
    }

    /// Seals `data`, splitting it into at-most-4096-byte segments, each its
    /// own header+body frame.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_SEGMENT_SIZE) {
            self.write_segment(chunk).await?;
        }
        Ok(())
    }

    async fn write_segment(&mut self, chunk: &[u8]) -> Result<()> {
        let body_nonce = inc_nonce(&self.nonce);
        let sealed_body = seal(&self.key, &body_nonce, chunk);
        let (mac, ciphertext) = sealed_body.split_at(16);

        let mut header_plain = [0u8; 18];
        header_plain[..2].copy_from_slice(&(ciphertext.len() as u16).to_be_bytes());
        header_plain[2..].copy_from_slice(mac);
        let sealed_header = seal(&self.key, &self.nonce, &header_plain);

        self.writer.write_all(&sealed_header).await?;
        self.writer.write_all(ciphertext).await?;
        self.nonce = inc_nonce(&body_nonce);
        Ok(())
    }

    /// Sends the termination frame: a sealed header whose plaintext is 18
    /// zero bytes, with no following body.
    pub async fn close(&mut self) -> Result<()> {
        let sealed_header = seal(&self.key, &self.nonce, &TERMINATION_PLAINTEXT);
        self.writer.write_all(&sealed_header).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Reads authenticated, framed plaintext from an underlying async reader.
pub struct BoxReader<R> {
    reader: R,
    key: [u8; 32],
    nonce: [u8; 24],
}

impl<R: AsyncRead + Unpin> BoxReader<R> {
    pub fn new(reader: R, key: [u8; 32], nonce: [u8; 24]) -> Self {
        Self { reader, key, nonce }
    }

    /// Reads and authenticates the next frame. Returns `Ok(None)` on a clean
    /// termination frame or on the peer closing the socket before sending a
    /// header; any other truncation or authentication failure is an error.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        let mut sealed_header = [0u8; HEADER_LEN];
        if let Err(e) = self.reader.read_exact(&mut sealed_header).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(None);
            }
            return Err(TransportError::Io(e));
        }

        let header_plain = open(&self.key, &self.nonce, &sealed_header)?;
        if header_plain.as_slice() == TERMINATION_PLAINTEXT.as_slice() {
            return Ok(None);
        }
        if header_plain.len() != 18 {
            return Err(TransportError::Protocol("box-stream header has the wrong length".into()));
        }

        let length = u16::from_be_bytes([header_plain[0], header_plain[1]]) as usize;
        let mac = &header_plain[2..18];

        let mut ciphertext = vec![0u8; length];
        self.reader.read_exact(&mut ciphertext).await?;

        let mut sealed_body = Vec::with_capacity(16 + length);
        sealed_body.extend_from_slice(mac);
        sealed_body.extend_from_slice(&ciphertext);

        let body_nonce = inc_nonce(&self.nonce);
        let body = open(&self.key, &body_nonce, &sealed_body)?;
        self.nonce = inc_nonce(&body_nonce);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CLIENT_ENCRYPT_KEY: [u8; 32] = [
        0xec, 0x1f, 0x2c, 0x82, 0x9f, 0xed, 0x41, 0xc0, 0xda, 0x87, 0x5b, 0xf9, 0x75, 0xbf, 0xac, 0x9c, 0x49, 0xa5,
        0x54, 0xd1, 0x91, 0xff, 0xa8, 0x2e, 0xd0, 0x20, 0xfb, 0x55, 0xc7, 0x14, 0x29, 0xc7,
    ];
    const CLIENT_ENCRYPT_NONCE: [u8; 24] = [
        0x53, 0x5c, 0x06, 0x8d, 0xe5, 0xeb, 0x26, 0x2a, 0xb8, 0x0b, 0x70, 0xb3, 0x5a, 0x8e, 0x5c, 0x85, 0x14, 0xaa,
        0x1c, 0x8d, 0x69, 0x9d, 0x7f, 0xa9,
    ];

    const MESSAGE_1: [u8; 37] = [
        0xce, 0x76, 0xed, 0x45, 0x06, 0x6c, 0x02, 0x13, 0xc8, 0x17, 0x56, 0xfa, 0x8b, 0x5a, 0x3f, 0x88, 0x42, 0x25,
        0x4f, 0xb0, 0x4c, 0x9f, 0x8e, 0x8c, 0x30, 0x79, 0x1d, 0x76, 0xc0, 0xc9, 0xf6, 0x9d, 0xc2, 0xdf, 0xdb, 0xee,
        0x9d,
    ];
    const MESSAGE_2: [u8; 37] = [
        0x14, 0x31, 0xd6, 0x33, 0x13, 0x64, 0xd1, 0xec, 0x5a, 0x9b, 0xd0, 0xd4, 0x03, 0xcd, 0x52, 0x3f, 0x27, 0xaa,
        0x2e, 0x89, 0x49, 0x92, 0x49, 0xf9, 0x67, 0x75, 0x4c, 0xaa, 0x06, 0x3f, 0xea, 0xca, 0x2f, 0x7d, 0x88, 0x2a,
        0xb2,
    ];
    const MESSAGE_3: [u8; 37] = [
        0xcb, 0x59, 0x59, 0xf1, 0x0f, 0xa5, 0x4f, 0x13, 0x72, 0xa6, 0x22, 0x15, 0xc5, 0x9d, 0x0d, 0x2e, 0x2a, 0x0b,
        0x92, 0x10, 0x6d, 0xa6, 0x28, 0x0c, 0x0c, 0xc6, 0x31, 0x80, 0x6a, 0x81, 0x29, 0x80, 0x30, 0xed, 0xda, 0xad,
        0xa1,
    ];
    const MESSAGE_CLOSED: [u8; 34] = [
        0xb1, 0x14, 0x68, 0x55, 0x27, 0xb5, 0x4d, 0xa6, 0x22, 0x03, 0x9d, 0x75, 0x79, 0xa1, 0xd4, 0x65, 0x76, 0x57,
        0x2c, 0xdc, 0x45, 0x18, 0xe4, 0x2b, 0x20, 0x43, 0x34, 0xe8, 0x68, 0x96, 0xed, 0xc5, 0x94, 0x80,
    ];

    // Testable Property 8 / Scenario S4: bit-exact against the reference
    // implementation's box-stream vectors.
    #[tokio::test]
    async fn write_matches_reference_vectors() {
        let mut buf = Vec::new();
        let mut writer = BoxWriter::new(&mut buf, CLIENT_ENCRYPT_KEY, CLIENT_ENCRYPT_NONCE);
        writer.write_all(b"foo").await.unwrap();
        assert_eq!(buf, MESSAGE_1);

        buf.clear();
        writer.write_all(b"foo").await.unwrap();
        assert_eq!(buf, MESSAGE_2);

        buf.clear();
        writer.write_all(b"bar").await.unwrap();
        assert_eq!(buf, MESSAGE_3);

        buf.clear();
        writer.close().await.unwrap();
        assert_eq!(buf, MESSAGE_CLOSED);
    }

    #[tokio::test]
    async fn read_matches_reference_vectors() {
        let mut all = Vec::new();
        all.extend_from_slice(&MESSAGE_1);
        all.extend_from_slice(&MESSAGE_2);
        all.extend_from_slice(&MESSAGE_3);
        all.extend_from_slice(&MESSAGE_CLOSED);

        let mut reader = BoxReader::new(Cursor::new(all), CLIENT_ENCRYPT_KEY, CLIENT_ENCRYPT_NONCE);
        assert_eq!(reader.read().await.unwrap().unwrap(), b"foo");
        assert_eq!(reader.read().await.unwrap().unwrap(), b"foo");
        assert_eq!(reader.read().await.unwrap().unwrap(), b"bar");
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn long_payload_splits_at_segment_boundary() {
        let data: Vec<u8> = (0..(6 * 1024usize)).map(|n| (n % 256) as u8).collect();

        let mut buf = Vec::new();
        let mut writer = BoxWriter::new(&mut buf, CLIENT_ENCRYPT_KEY, CLIENT_ENCRYPT_NONCE);
        writer.write_all(&data).await.unwrap();
        assert_eq!(buf.len(), data.len() + HEADER_LEN * 2);

        let mut reader = BoxReader::new(Cursor::new(buf), CLIENT_ENCRYPT_KEY, CLIENT_ENCRYPT_NONCE);
        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(first, data[..4096]);
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(second, data[4096..]);
    }

    #[tokio::test]
    async fn peer_closing_socket_without_header_reads_as_none() {
        let mut reader = BoxReader::new(Cursor::new(Vec::<u8>::new()), CLIENT_ENCRYPT_KEY, CLIENT_ENCRYPT_NONCE);
        assert!(reader.read().await.unwrap().is_none());
    }
}
