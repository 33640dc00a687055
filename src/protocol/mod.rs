//! Protocol Module
//!
//! Defines the NRPE wire protocol spoken between the bridge and an agent.
//!
//! ## Exchange
//! One connection carries exactly one exchange: the bridge sends a QUERY
//! packet holding `command[!arg1[!arg2...]]`, the agent answers with a
//! RESPONSE packet holding the status code and the check output, then the
//! connection is closed.
//!
//! ### Packet Types
//! - 1: QUERY
//! - 2: RESPONSE
//!
//! ### Status Codes
//! - 0: OK
//! - 1: WARNING
//! - 2: CRITICAL
//! - 3: UNKNOWN

mod command;
mod packet;
mod codec;

pub use command::{Command, CommandResult, ARG_SEPARATOR, VERSION_COMMAND};
pub use packet::{
    EncodedPacket, Packet, PacketType, ProtocolVersion, Status, HEADER_SIZE,
    MAX_PAYLOAD_LENGTH, PACKET_LENGTH, TRAILER_SIZE,
};
pub use codec::{compute_checksum, read_frame, write_packet, PacketCodec};
