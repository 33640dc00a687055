//! TCP Server
//!
//! Minimal agent: accepts connections and answers one query on each.
//! Used by the `nrpe-agent` binary and the test suite.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Connection;
use crate::error::Result;
use crate::protocol::{Command, CommandResult, PacketCodec, ProtocolVersion};

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Single-exchange NRPE server
pub struct Server {
    listener: TcpListener,
    codec: PacketCodec,
    timeout_ms: u64,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind to `addr` (use port 0 for an ephemeral port)
    pub fn bind(addr: &str, version: ProtocolVersion) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!("Agent listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            codec: PacketCodec::new(version),
            timeout_ms: 5000,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Per-connection read/write timeout (0 disables it)
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops `run` once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Accept and serve connections until shutdown is signalled
    ///
    /// Errors on individual connections, setup included, are logged and do
    /// not stop the loop.
    pub fn run<H>(&mut self, handler: H) -> Result<()>
    where
        H: Fn(&Command) -> Result<CommandResult>,
    {
        self.listener.set_nonblocking(true)?;

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!("Connection established from {}", addr);
                    if let Err(e) = self.serve_accepted(stream, &handler) {
                        tracing::warn!("Connection from {} failed: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }

        tracing::info!("Agent stopped");
        Ok(())
    }

    /// Accept exactly one connection and serve it (blocking)
    pub fn run_once<H>(&mut self, handler: H) -> Result<Command>
    where
        H: FnOnce(&Command) -> Result<CommandResult>,
    {
        self.listener.set_nonblocking(false)?;
        let (stream, addr) = self.listener.accept()?;
        tracing::debug!("Connection established from {}", addr);
        self.serve_accepted(stream, handler)
    }

    /// Prepare an accepted stream and answer its query
    fn serve_accepted<H>(&mut self, stream: TcpStream, handler: H) -> Result<Command>
    where
        H: FnOnce(&Command) -> Result<CommandResult>,
    {
        // Accepted sockets may inherit the listener's non-blocking mode
        stream.set_nonblocking(false)?;
        let mut conn = Connection::new(stream);
        conn.set_timeout_ms(self.timeout_ms)?;
        conn.handle(&mut self.codec, handler)
    }
}
