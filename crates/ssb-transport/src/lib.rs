//! Secret-handshake authentication and box-stream framing: the transport
//! layer every mux-rpc connection in this system runs over.

pub mod box_stream;
pub mod boxes;
pub mod error;
pub mod handshake;

pub use box_stream::{inc_nonce, BoxReader, BoxWriter, HEADER_LEN, MAX_SEGMENT_SIZE};
pub use error::TransportError;
pub use handshake::{client_handshake, server_handshake, BoxKeys, DEFAULT_APP_KEY};
