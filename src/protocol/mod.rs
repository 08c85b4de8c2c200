//! Protocol module - Defines the LLRPC wire protocol
//!
//! The protocol uses a fixed-size binary header carried directly in raw
//! IPv4 datagrams (no UDP/TCP):
//! - 2 bytes message type (big-endian)
//! - 4 bytes endpoint id (big-endian)
//! - 4 bytes sequence id (big-endian)
//! - 2 bytes total length (big-endian)
//! - 8 bytes timestamp, UNIX seconds (big-endian)
//! - 4 bytes CRC32, reserved (big-endian)
//!
//! There is no payload; every message is exactly [`HEADER_SIZE`] bytes.

mod message;
mod codec;

pub use message::*;
pub use codec::*;

/// IP protocol number reserved for LLRPC traffic.
pub const TRANSPORT_PROTOCOL: u8 = 0xFC;

/// Size of the encoded message header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Endpoint id this implementation stamps on outbound messages.
///
/// Reserved for multi-endpoint routing; always 0 in a single-endpoint
/// deployment.
pub const LOCAL_ENDPOINT_ID: u32 = 0;
