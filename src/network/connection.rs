//! Agent-side Connection Handler
//!
//! Serves a single query on an accepted stream, the way an NRPE agent does:
//! read one QUERY frame, run the handler, write one RESPONSE frame, close.

use std::time::Duration;

use super::NrpeStream;
use crate::error::{NrpeError, Result};
use crate::protocol::{read_frame, write_packet, Command, CommandResult, PacketCodec};

/// Handles one query on one stream
pub struct Connection<S: NrpeStream> {
    stream: S,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: NrpeStream> Connection<S> {
    pub fn new(stream: S) -> Self {
        let peer_addr = stream.peer_addr_string();
        Self { stream, peer_addr }
    }

    /// Configure the read/write deadline (0 disables it)
    pub fn set_timeout_ms(&mut self, ms: u64) -> Result<()> {
        let timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self.stream.set_deadline(timeout)?;
        Ok(())
    }

    /// Serve the query and close the stream
    ///
    /// Returns the command that was answered. Handler errors close the
    /// stream without sending a response.
    pub fn handle<H>(mut self, codec: &mut PacketCodec, handler: H) -> Result<Command>
    where
        H: FnOnce(&Command) -> Result<CommandResult>,
    {
        let outcome = self.serve(codec, handler);
        match &outcome {
            Ok(command) => tracing::debug!("Answered {:?} for {}", command.name, self.peer_addr),
            Err(e) => tracing::warn!("Error serving {}: {}", self.peer_addr, e),
        }
        if let Err(e) = self.stream.close() {
            tracing::trace!("Closing stream to {}: {}", self.peer_addr, e);
        }
        outcome
    }

    fn serve<H>(&mut self, codec: &mut PacketCodec, handler: H) -> Result<Command>
    where
        H: FnOnce(&Command) -> Result<CommandResult>,
    {
        let frame = read_frame(&mut self.stream, codec.packet_length())?;
        let command = codec.decode_query(&frame)?;

        tracing::trace!("Received query from {}: {}", self.peer_addr, command);

        let result = handler(&command)?;
        let response = codec.encode_response(&result).map_err(|e| match e {
            NrpeError::CommandTooLong { len, max } => NrpeError::Protocol(format!(
                "check output too long: {} bytes (max {})",
                len, max
            )),
            other => other,
        })?;
        write_packet(&mut self.stream, &response)?;

        Ok(command)
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Serve exactly one query on `stream`
pub fn serve_one<S, H>(
    stream: S,
    codec: &mut PacketCodec,
    handler: H,
    timeout: Option<Duration>,
) -> Result<Command>
where
    S: NrpeStream,
    H: FnOnce(&Command) -> Result<CommandResult>,
{
    stream.set_deadline(timeout)?;
    Connection::new(stream).handle(codec, handler)
}
