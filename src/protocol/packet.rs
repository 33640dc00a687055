//! Packet definitions
//!
//! The fixed-layout NRPE frame and the enums carried in its header.

use bytes::Bytes;

/// Payload capacity of a v2 packet (NUL-terminated text + random padding)
pub const MAX_PAYLOAD_LENGTH: usize = 1024;

/// version (2) + type (2) + crc32 (4) + status (2)
pub const HEADER_SIZE: usize = 10;

/// Reserved bytes after the payload
pub const TRAILER_SIZE: usize = 2;

/// Total frame length of a v2 packet
pub const PACKET_LENGTH: usize = HEADER_SIZE + MAX_PAYLOAD_LENGTH + TRAILER_SIZE;

/// Byte range of the checksum field inside a frame
pub(crate) const CHECKSUM_RANGE: std::ops::Range<usize> = 4..8;

/// Protocol generation carried in the first header field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum ProtocolVersion {
    /// Fixed 1036-byte frames
    #[default]
    V2 = 2,
}

impl ProtocolVersion {
    /// Frame length on the wire for this version
    pub fn packet_length(self) -> usize {
        match self {
            ProtocolVersion::V2 => PACKET_LENGTH,
        }
    }

    /// Payload capacity for this version
    pub fn payload_capacity(self) -> usize {
        match self {
            ProtocolVersion::V2 => MAX_PAYLOAD_LENGTH,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            2 => Some(ProtocolVersion::V2),
            _ => None,
        }
    }
}

/// Packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    Query = 1,
    Response = 2,
}

impl PacketType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(PacketType::Query),
            2 => Some(PacketType::Response),
            _ => None,
        }
    }
}

/// Check result status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Status {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Status::Ok),
            1 => Some(Status::Warning),
            2 => Some(Status::Critical),
            3 => Some(Status::Unknown),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A decoded packet
///
/// Built by the codec from a verified frame; never patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: ProtocolVersion,
    pub packet_type: PacketType,
    pub checksum: u32,
    /// Raw result code. Only guaranteed to be a valid `Status` for responses.
    pub result_code: u16,
    /// Full payload buffer, padding included
    pub payload: Vec<u8>,
    pub trailer: [u8; TRAILER_SIZE],
}

impl Packet {
    /// Payload bytes up to the first NUL (the whole buffer if there is none)
    pub fn text_bytes(&self) -> &[u8] {
        match self.payload.iter().position(|&b| b == 0) {
            Some(pos) => &self.payload[..pos],
            None => &self.payload,
        }
    }

    /// Payload text, lossily decoded as UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.text_bytes()).into_owned()
    }

    /// Whether the payload carries a NUL terminator at all
    pub fn is_terminated(&self) -> bool {
        self.payload.contains(&0)
    }
}

/// A serialized frame whose checksum has been finalized
///
/// The only way to obtain one is through `PacketCodec`, so a frame with a
/// half-computed checksum never leaves the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    bytes: Bytes,
}

impl EncodedPacket {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Checksum stored in the frame header
    pub fn checksum(&self) -> u32 {
        let b = &self.bytes[CHECKSUM_RANGE];
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for EncodedPacket {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
