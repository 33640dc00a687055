//! Stream Factory
//!
//! The session only needs a byte stream it can put deadlines on. Plain TCP
//! is provided here; TLS-wrapped streams plug in through the same traits.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{NrpeError, Result};

/// A bidirectional byte stream to an agent
pub trait NrpeStream: Read + Write {
    /// Apply a read and write deadline (`None` blocks indefinitely)
    fn set_deadline(&self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Peer address for logging
    fn peer_addr_string(&self) -> String {
        "unknown".to_string()
    }

    /// Close both directions of the stream
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl NrpeStream for TcpStream {
    fn set_deadline(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)?;
        Ok(())
    }

    fn peer_addr_string(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn close(&mut self) -> std::io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // Peer already hung up
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Opens one stream per exchange
pub trait Dialer {
    type Stream: NrpeStream;

    /// Connect to `target` (`host:port`)
    ///
    /// Any failure is reported as `NrpeError::Dial`.
    fn dial(&self, target: &str, timeout: Option<Duration>) -> Result<Self::Stream>;
}

/// Plain TCP dialer
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&self, target: &str, timeout: Option<Duration>) -> Result<TcpStream> {
        let dial_error = |reason: String| NrpeError::Dial {
            target: target.to_string(),
            reason,
        };

        let addrs = target
            .to_socket_addrs()
            .map_err(|e| dial_error(e.to_string()))?;

        let mut last_error = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(t) => TcpStream::connect_timeout(&addr, t),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    // Disable Nagle's algorithm, each frame is written in one go
                    stream.set_nodelay(true).map_err(|e| dial_error(e.to_string()))?;
                    tracing::trace!("Connected to {} ({})", target, addr);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!("Connect to {} ({}) failed: {}", target, addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(dial_error(match last_error {
            Some(e) => e.to_string(),
            None => "address resolved to nothing".to_string(),
        }))
    }
}
