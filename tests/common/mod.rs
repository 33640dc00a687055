//! Shared test doubles: an in-memory stream and a scripted dialer

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use nrpe_bridge::network::{Dialer, NrpeStream};
use nrpe_bridge::protocol::{CommandResult, PacketCodec, ProtocolVersion};
use nrpe_bridge::{NrpeError, Result};

// =============================================================================
// In-memory stream
// =============================================================================

/// What the mock stream's reads do
#[derive(Debug, Clone)]
pub enum ReadBehavior {
    /// Serve these bytes, then EOF
    Bytes(Vec<u8>),
    /// Fail every read as a socket timeout would
    TimeOut,
}

/// Observations shared between a test and the stream it handed out
#[derive(Debug, Default)]
pub struct StreamLog {
    pub written: RefCell<Vec<u8>>,
    pub closed: Cell<bool>,
    pub deadline: Cell<Option<Duration>>,
}

pub struct MockStream {
    input: Cursor<Vec<u8>>,
    time_out: bool,
    log: Rc<StreamLog>,
}

impl MockStream {
    pub fn new(behavior: ReadBehavior) -> (Self, Rc<StreamLog>) {
        let log = Rc::new(StreamLog::default());
        let (input, time_out) = match behavior {
            ReadBehavior::Bytes(bytes) => (bytes, false),
            ReadBehavior::TimeOut => (Vec::new(), true),
        };
        let stream = Self {
            input: Cursor::new(input),
            time_out,
            log: Rc::clone(&log),
        };
        (stream, log)
    }

    pub fn responding(result: &CommandResult) -> (Self, Rc<StreamLog>) {
        Self::new(ReadBehavior::Bytes(encode_response(result)))
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.time_out {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "Resource temporarily unavailable",
            ));
        }
        // Dribble the frame out in small chunks, like a real socket might
        let n = buf.len().min(100);
        self.input.read(&mut buf[..n])
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.log.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl NrpeStream for MockStream {
    fn set_deadline(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.log.deadline.set(timeout);
        Ok(())
    }

    fn peer_addr_string(&self) -> String {
        "mock:5666".to_string()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.log.closed.set(true);
        Ok(())
    }
}

pub fn encode_response(result: &CommandResult) -> Vec<u8> {
    let mut codec = PacketCodec::with_seed(ProtocolVersion::V2, 7);
    codec
        .encode_response(result)
        .expect("response fits")
        .as_bytes()
        .to_vec()
}

// =============================================================================
// Scripted dialer
// =============================================================================

/// What the next dial produces
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(CommandResult),
    Raw(Vec<u8>),
    Refuse,
}

/// Hands out one scripted stream per dial, in order
#[derive(Default)]
pub struct ScriptedDialer {
    replies: RefCell<VecDeque<Reply>>,
    pub dials: Cell<usize>,
    pub logs: RefCell<Vec<Rc<StreamLog>>>,
    pub dial_timeouts: RefCell<Vec<Option<Duration>>>,
    pub dial_delay: Option<Duration>,
}

impl ScriptedDialer {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            ..Default::default()
        }
    }

    /// Queries sent so far, decoded as text
    pub fn queries(&self) -> Vec<String> {
        let codec = PacketCodec::new(ProtocolVersion::V2);
        self.logs
            .borrow()
            .iter()
            .map(|log| {
                codec
                    .decode_query(&log.written.borrow())
                    .expect("valid query")
                    .to_query_text()
            })
            .collect()
    }
}

impl Dialer for ScriptedDialer {
    type Stream = MockStream;

    fn dial(&self, target: &str, timeout: Option<Duration>) -> Result<MockStream> {
        self.dials.set(self.dials.get() + 1);
        self.dial_timeouts.borrow_mut().push(timeout);
        if let Some(delay) = self.dial_delay {
            std::thread::sleep(delay);
        }
        let reply = self.replies.borrow_mut().pop_front().unwrap_or(Reply::Refuse);
        let (stream, log) = match reply {
            Reply::Respond(result) => MockStream::responding(&result),
            Reply::Raw(bytes) => MockStream::new(ReadBehavior::Bytes(bytes)),
            Reply::Refuse => {
                return Err(NrpeError::Dial {
                    target: target.to_string(),
                    reason: "Connection refused (os error 111)".to_string(),
                })
            }
        };
        self.logs.borrow_mut().push(log);
        Ok(stream)
    }
}
