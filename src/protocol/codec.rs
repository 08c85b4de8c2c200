//! Protocol codec for encoding/decoding message headers
//!
//! Handles translation between [`Header`] values and their fixed-size wire
//! encoding, plus the diagnostic rendering of send/receive events.
//!
//! All multi-byte fields are big-endian and written field-by-field; the
//! wire layout never depends on in-memory struct layout or alignment.

use bytes::{Buf, BufMut, BytesMut};
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::{Header, MessageType, HEADER_SIZE, LOCAL_ENDPOINT_ID};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("short read: need {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Builds outbound message headers.
///
/// Owns the endpoint's sequence counter: every encoded message gets the
/// next sequence id, strictly increasing from 1 for the lifetime of the
/// process. Decoding inbound messages never advances the counter.
pub struct Encoder {
    sequence: u32,
}

impl Encoder {
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    /// Build a fresh outbound header of the given type.
    ///
    /// Fills in the local endpoint id, the next sequence id, the fixed
    /// wire length, and the current wall-clock timestamp. The checksum
    /// field is reserved and always 0.
    pub fn encode(&mut self, kind: MessageType) -> Header {
        self.sequence = self.sequence.wrapping_add(1);
        Header {
            kind,
            endpoint_id: LOCAL_ENDPOINT_ID,
            sequence_id: self.sequence,
            length: HEADER_SIZE as u16,
            timestamp: unix_timestamp(),
            checksum: 0,
        }
    }

    /// Sequence id of the most recently encoded message (0 before the first).
    pub fn last_sequence(&self) -> u32 {
        self.sequence
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a header into its 24-byte wire form.
pub fn encode_header(header: &Header, buf: &mut BytesMut) {
    buf.reserve(HEADER_SIZE);
    buf.put_u16(header.kind.to_wire());
    buf.put_u32(header.endpoint_id);
    buf.put_u32(header.sequence_id);
    buf.put_u16(header.length);
    buf.put_u64(header.timestamp);
    buf.put_u32(header.checksum);
}

/// Parse a header from the start of `bytes`.
///
/// Fails with [`CodecError::ShortRead`] if fewer than [`HEADER_SIZE`]
/// bytes are available; on failure no fields are assigned. Unknown type
/// values decode as [`MessageType::Unknown`] rather than failing.
pub fn decode_header(bytes: &[u8]) -> CodecResult<Header> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::ShortRead {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut cursor = bytes;
    Ok(Header {
        kind: MessageType::from_wire(cursor.get_u16()),
        endpoint_id: cursor.get_u32(),
        sequence_id: cursor.get_u32(),
        length: cursor.get_u16(),
        timestamp: cursor.get_u64(),
        checksum: cursor.get_u32(),
    })
}

/// Render a send/receive event as a single diagnostic line.
///
/// Pure formatting; the caller decides where the line goes.
pub fn format_event(peer: Ipv4Addr, header: &Header) -> String {
    format!(
        "peer={} type={} len={} endpoint={} seq={} ts={}",
        peer,
        header.kind,
        header.length,
        header.endpoint_id,
        header.sequence_id,
        header.timestamp
    )
}

/// Current wall-clock time as UNIX seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut encoder = Encoder::new();
        let header = encoder.encode(MessageType::EchoRequest);

        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = decode_header(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_wire_layout() {
        let header = Header {
            kind: MessageType::CommandRequest,
            endpoint_id: 0x01020304,
            sequence_id: 0x05060708,
            length: HEADER_SIZE as u16,
            timestamp: 0x1122334455667788,
            checksum: 0,
        };

        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);

        // type=2, then each field big-endian, no padding
        assert_eq!(
            &buf[..],
            &[
                0x00, 0x02, // type
                0x01, 0x02, 0x03, 0x04, // endpoint_id
                0x05, 0x06, 0x07, 0x08, // sequence_id
                0x00, 0x18, // length = 24
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, // timestamp
                0x00, 0x00, 0x00, 0x00, // crc32
            ]
        );
    }

    #[test]
    fn test_sequence_monotonic_from_one() {
        let mut encoder = Encoder::new();
        let mut previous = 0;
        for i in 1..=16u32 {
            let header = encoder.encode(MessageType::EchoRequest);
            assert_eq!(header.sequence_id, i);
            assert!(header.sequence_id > previous);
            previous = header.sequence_id;

            // Decoding never advances the counter
            let mut buf = BytesMut::new();
            encode_header(&header, &mut buf);
            decode_header(&buf).unwrap();
            assert_eq!(encoder.last_sequence(), i);
        }
    }

    #[test]
    fn test_short_read() {
        let err = decode_header(&[0u8; 10]).unwrap_err();
        match err {
            CodecError::ShortRead { expected, actual } => {
                assert_eq!(expected, HEADER_SIZE);
                assert_eq!(actual, 10);
            }
        }
    }

    #[test]
    fn test_unknown_type_tolerated() {
        let mut buf = BytesMut::new();
        let header = Header {
            kind: MessageType::Unknown(99),
            endpoint_id: 0,
            sequence_id: 7,
            length: HEADER_SIZE as u16,
            timestamp: 0,
            checksum: 0,
        };
        encode_header(&header, &mut buf);

        let decoded = decode_header(&buf).unwrap();
        assert_eq!(decoded.kind, MessageType::Unknown(99));
        assert_eq!(decoded.sequence_id, 7);
    }

    #[test]
    fn test_format_event() {
        let header = Header {
            kind: MessageType::EchoRequest,
            endpoint_id: 0,
            sequence_id: 1,
            length: HEADER_SIZE as u16,
            timestamp: 1722945600,
            checksum: 0,
        };

        let line = format_event(Ipv4Addr::LOCALHOST, &header);
        assert_eq!(
            line,
            "peer=127.0.0.1 type=ECHO_REQ len=24 endpoint=0 seq=1 ts=1722945600"
        );
    }
}
