//! Protocol codec
//!
//! Encoding and decoding of NRPE frames.
//!
//! ## Wire Format (v2)
//!
//! ```text
//! ┌────────────┬─────────┬───────────┬────────────┬──────────────────┬─────────────┐
//! │ Version(2) │ Type(2) │ CRC32 (4) │ Status (2) │ Payload (1024)   │ Trailer (2) │
//! └────────────┴─────────┴───────────┴────────────┴──────────────────┴─────────────┘
//! ```
//!
//! All integers are big-endian. The payload holds NUL-terminated text; the
//! bytes after the terminator and the trailer are random padding so that
//! frames of the same command never look alike on the wire. The CRC-32
//! (IEEE) covers the whole frame with the checksum field set to zero.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::packet::CHECKSUM_RANGE;
use super::{
    Command, CommandResult, EncodedPacket, Packet, PacketType, ProtocolVersion, Status,
    HEADER_SIZE, TRAILER_SIZE,
};
use crate::error::{NrpeError, Result};

/// Encoder/decoder for one protocol version
///
/// Owns the pseudorandom source used for padding. Each codec is
/// independent, so scrapes running in parallel never share random state.
pub struct PacketCodec {
    version: ProtocolVersion,
    rng: StdRng,
}

impl PacketCodec {
    /// Create a codec seeded from OS entropy
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a codec with a fixed padding seed (reproducible frames)
    pub fn with_seed(version: ProtocolVersion, seed: u64) -> Self {
        Self {
            version,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Frame length this codec reads and writes
    pub fn packet_length(&self) -> usize {
        self.version.packet_length()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode a query packet for a command
    pub fn encode_query(&mut self, command: &Command) -> Result<EncodedPacket> {
        let text = command.to_query_text();
        self.encode(PacketType::Query, Status::Ok.code(), text.as_bytes())
    }

    /// Encode a response packet carrying a check result
    pub fn encode_response(&mut self, result: &CommandResult) -> Result<EncodedPacket> {
        self.encode(PacketType::Response, result.status.code(), result.output.as_bytes())
    }

    /// Encode a frame
    ///
    /// Fails with `CommandTooLong` when `text` plus its terminator does not
    /// fit in the payload. Text is never truncated.
    pub fn encode(
        &mut self,
        packet_type: PacketType,
        result_code: u16,
        text: &[u8],
    ) -> Result<EncodedPacket> {
        let capacity = self.version.payload_capacity();
        if text.len() >= capacity {
            return Err(NrpeError::CommandTooLong {
                len: text.len(),
                max: capacity - 1,
            });
        }

        let mut frame = BytesMut::zeroed(self.version.packet_length());
        self.rng.fill_bytes(&mut frame);

        {
            let mut header = &mut frame[..HEADER_SIZE];
            header.put_u16(self.version as u16);
            header.put_u16(packet_type as u16);
            header.put_u32(0);
            header.put_u16(result_code);
        }

        let payload_start = HEADER_SIZE;
        frame[payload_start..payload_start + text.len()].copy_from_slice(text);
        frame[payload_start + text.len()] = 0;

        let crc = crc32fast::hash(&frame);
        frame[CHECKSUM_RANGE].copy_from_slice(&crc.to_be_bytes());

        Ok(EncodedPacket::new(frame.freeze()))
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode and verify a frame
    ///
    /// Checks, in order: frame length, packet type, checksum, version and,
    /// for responses only, the result code.
    pub fn decode(&self, bytes: &[u8], expected: PacketType) -> Result<Packet> {
        let expected_len = self.version.packet_length();
        if bytes.len() != expected_len {
            return Err(NrpeError::ShortRead {
                expected: expected_len,
                actual: bytes.len(),
            });
        }

        let mut header = &bytes[..HEADER_SIZE];
        let raw_version = header.get_u16();
        let raw_type = header.get_u16();
        let stored = header.get_u32();
        let result_code = header.get_u16();

        let packet_type = match PacketType::from_u16(raw_type) {
            Some(t) if t == expected => t,
            _ => {
                return Err(NrpeError::TypeMismatch {
                    expected: expected as u16,
                    actual: raw_type,
                })
            }
        };

        let computed = compute_checksum(bytes);
        if stored != computed {
            return Err(NrpeError::ChecksumMismatch { stored, computed });
        }

        let version = match ProtocolVersion::from_u16(raw_version) {
            Some(v) if v == self.version => v,
            _ => return Err(NrpeError::UnsupportedVersion(raw_version)),
        };

        if packet_type == PacketType::Response && Status::from_u16(result_code).is_none() {
            return Err(NrpeError::UnknownStatus(result_code));
        }

        let payload_end = expected_len - TRAILER_SIZE;
        let mut trailer = [0u8; TRAILER_SIZE];
        trailer.copy_from_slice(&bytes[payload_end..]);

        Ok(Packet {
            version,
            packet_type,
            checksum: stored,
            result_code,
            payload: bytes[HEADER_SIZE..payload_end].to_vec(),
            trailer,
        })
    }

    /// Decode a response frame into a check result
    pub fn decode_response(&self, bytes: &[u8]) -> Result<CommandResult> {
        let packet = self.decode(bytes, PacketType::Response)?;
        let status = Status::from_u16(packet.result_code)
            .ok_or(NrpeError::UnknownStatus(packet.result_code))?;
        Ok(CommandResult::new(status, packet.text()))
    }

    /// Decode a query frame into a command
    pub fn decode_query(&self, bytes: &[u8]) -> Result<Command> {
        let packet = self.decode(bytes, PacketType::Query)?;
        if !packet.is_terminated() {
            return Err(NrpeError::Protocol("invalid request: unterminated payload".to_string()));
        }
        Ok(Command::parse(&packet.text()))
    }
}

/// CRC-32 of a frame computed as if its checksum field were zero
pub fn compute_checksum(frame: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame[..CHECKSUM_RANGE.start]);
    hasher.update(&[0u8; 4]);
    hasher.update(&frame[CHECKSUM_RANGE.end..]);
    hasher.finalize()
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a complete frame to a stream
///
/// A stream that stops accepting bytes mid-frame is an error, not a
/// partial success.
pub fn write_packet<W: Write>(writer: &mut W, packet: &EncodedPacket) -> Result<()> {
    writer
        .write_all(packet.as_bytes())
        .map_err(|e| map_io_error(e, "write"))?;
    writer.flush().map_err(|e| map_io_error(e, "write"))?;
    Ok(())
}

/// Read exactly one frame of `len` bytes from a stream
///
/// Returns `ShortRead` if the peer closes the stream before a full frame
/// has arrived.
pub fn read_frame<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut frame = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        match reader.read(&mut frame[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_io_error(e, "read")),
        }
    }

    if filled != len {
        return Err(NrpeError::ShortRead {
            expected: len,
            actual: filled,
        });
    }

    Ok(frame)
}

/// Map socket errors to the transport taxonomy
///
/// Deadline expiry surfaces as `WouldBlock` on Unix and `TimedOut` on Windows.
fn map_io_error(err: std::io::Error, op: &'static str) -> NrpeError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => NrpeError::Timeout(op),
        ErrorKind::WriteZero => NrpeError::FrameIo(format!("short {}: {}", op, err)),
        _ => NrpeError::Io(err),
    }
}
