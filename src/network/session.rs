//! Transport Session
//!
//! Drives one query/response exchange over an open stream.
//!
//! ```text
//! Idle ──open──▶ Connected ──write──▶ Sent ──read──▶ Received ──▶ Closed
//!                    │                  │                │
//!                    └──────────────────┴─── error ──────┴──▶ Closed
//! ```
//!
//! The agent serves exactly one exchange per connection, so the stream is
//! closed after every exchange whatever the outcome. Nothing is retried here.

use std::time::Duration;

use super::{Dialer, NrpeStream};
use crate::error::Result;
use crate::protocol::{read_frame, write_packet, Command, CommandResult, EncodedPacket, PacketCodec};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Sent,
    Received,
    Closed,
}

/// A single-exchange session with an agent
pub struct Session<S: NrpeStream> {
    stream: S,
    state: SessionState,
    peer_addr: String,
}

impl<S: NrpeStream> Session<S> {
    /// Dial `target` and return a connected session
    pub fn open<D>(dialer: &D, target: &str, connect_timeout: Option<Duration>) -> Result<Self>
    where
        D: Dialer<Stream = S>,
    {
        tracing::trace!("Session {:?} -> dialing {}", SessionState::Idle, target);
        let stream = dialer.dial(target, connect_timeout)?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already negotiated stream (plain or TLS)
    pub fn from_stream(stream: S) -> Self {
        let peer_addr = stream.peer_addr_string();
        Self {
            stream,
            state: SessionState::Connected,
            peer_addr,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Encode `command`, send it and wait for the response
    ///
    /// A command that does not fit in a packet is rejected before anything
    /// is written.
    pub fn exchange(
        self,
        codec: &mut PacketCodec,
        command: &Command,
        timeout: Option<Duration>,
    ) -> Result<CommandResult> {
        let query = match codec.encode_query(command) {
            Ok(query) => query,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };
        self.exchange_encoded(codec, &query, timeout)
    }

    /// Send a pre-encoded query and wait for the response
    pub fn exchange_encoded(
        mut self,
        codec: &PacketCodec,
        query: &EncodedPacket,
        timeout: Option<Duration>,
    ) -> Result<CommandResult> {
        let outcome = self.round_trip(codec, query, timeout);
        if let Err(ref e) = outcome {
            tracing::debug!(
                "Exchange with {} failed in state {:?}: {}",
                self.peer_addr,
                self.state,
                e
            );
        }
        self.close();
        outcome
    }

    fn round_trip(
        &mut self,
        codec: &PacketCodec,
        query: &EncodedPacket,
        timeout: Option<Duration>,
    ) -> Result<CommandResult> {
        self.stream.set_deadline(timeout)?;

        write_packet(&mut self.stream, query)?;
        self.state = SessionState::Sent;

        let frame = read_frame(&mut self.stream, codec.packet_length())?;
        self.state = SessionState::Received;

        codec.decode_response(&frame)
    }

    /// Close the stream without exchanging anything
    pub fn close(mut self) {
        if let Err(e) = self.stream.close() {
            tracing::trace!("Closing stream to {}: {}", self.peer_addr, e);
        }
        self.state = SessionState::Closed;
        tracing::trace!("Session with {} {:?}", self.peer_addr, self.state);
    }
}
