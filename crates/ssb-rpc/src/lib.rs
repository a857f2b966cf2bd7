//! Packet-stream framing and mux-rpc request/reply shapes, layered on top of
//! `ssb-transport`'s box-stream.

pub mod error;
pub mod muxrpc;
pub mod packet_stream;

pub use error::RpcError;
pub use muxrpc::{as_error_reply, CallType, RpcErrorReply, RpcRequest};
pub use packet_stream::{PacketReader, PacketWriter, PsBody, PsMessage, PsMessageType};
