//! Protocol message definitions
//!
//! Defines the message types and the fixed-layout header exchanged
//! between LLRPC endpoints.

use std::fmt;

/// All known wire message types.
///
/// The decoder never rejects a type value it does not recognize; unknown
/// values are carried through as [`MessageType::Unknown`] so that future
/// protocol revisions remain decodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Liveness probe sent on every heartbeat interval
    EchoRequest,
    /// Reply to an echo request (not originated by this implementation)
    EchoResponse,
    /// Command invocation (declared; no behavior defined yet)
    CommandRequest,
    /// Command completion (declared; no behavior defined yet)
    CommandResponse,
    /// Any type value outside the known set, preserved verbatim
    Unknown(u16),
}

impl MessageType {
    /// Map a wire type value to a message type.
    pub fn from_wire(value: u16) -> Self {
        match value {
            0 => MessageType::EchoRequest,
            1 => MessageType::EchoResponse,
            2 => MessageType::CommandRequest,
            3 => MessageType::CommandResponse,
            other => MessageType::Unknown(other),
        }
    }

    /// Get the wire type value for this message type.
    pub fn to_wire(self) -> u16 {
        match self {
            MessageType::EchoRequest => 0,
            MessageType::EchoResponse => 1,
            MessageType::CommandRequest => 2,
            MessageType::CommandResponse => 3,
            MessageType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::EchoRequest => write!(f, "ECHO_REQ"),
            MessageType::EchoResponse => write!(f, "ECHO_RESP"),
            MessageType::CommandRequest => write!(f, "COMMAND_REQ"),
            MessageType::CommandResponse => write!(f, "COMMAND_RESP"),
            MessageType::Unknown(value) => write!(f, "UNKNOWN({})", value),
        }
    }
}

/// The fixed-size LLRPC message header.
///
/// Constructed transiently: filled by [`Encoder::encode`] for outbound
/// messages, or read field-by-field off the wire for inbound ones. Inbound
/// fields are peer-controlled and reported as-is.
///
/// [`Encoder::encode`]: super::Encoder::encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type discriminator
    pub kind: MessageType,
    /// Sending endpoint id (always 0 in this implementation)
    pub endpoint_id: u32,
    /// Sender's monotonic message counter, starting at 1
    pub sequence_id: u32,
    /// Total encoded length in bytes
    pub length: u16,
    /// Sender wall-clock time at encode, UNIX seconds
    pub timestamp: u64,
    /// Reserved integrity field; encoded as 0, never validated
    pub checksum: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types_roundtrip() {
        for value in 0..4u16 {
            assert_eq!(MessageType::from_wire(value).to_wire(), value);
        }
    }

    #[test]
    fn test_unknown_type_preserved() {
        let kind = MessageType::from_wire(99);
        assert_eq!(kind, MessageType::Unknown(99));
        assert_eq!(kind.to_wire(), 99);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(MessageType::EchoRequest.to_string(), "ECHO_REQ");
        assert_eq!(MessageType::Unknown(99).to_string(), "UNKNOWN(99)");
    }
}
