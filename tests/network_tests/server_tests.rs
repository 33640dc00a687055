//! Server Tests
//!
//! Tests for the agent side: one query answered per accepted connection.

#[path = "../common/mod.rs"]
mod common;

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use common::{MockStream, ReadBehavior};
use nrpe_bridge::network::{serve_one, Server, Session, TcpDialer};
use nrpe_bridge::protocol::{
    compute_checksum, read_frame, Command, CommandResult, PacketCodec, ProtocolVersion, Status,
    MAX_PAYLOAD_LENGTH, PACKET_LENGTH,
};
use nrpe_bridge::NrpeError;

// =============================================================================
// Helper Functions
// =============================================================================

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(1000))
}

fn start_once<H>(handler: H) -> (String, thread::JoinHandle<nrpe_bridge::Result<Command>>)
where
    H: FnOnce(&Command) -> nrpe_bridge::Result<CommandResult> + Send + 'static,
{
    let mut server = Server::bind("127.0.0.1:0", ProtocolVersion::V2)
        .unwrap()
        .with_timeout_ms(1000);
    let addr = server.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || server.run_once(handler));
    (addr, handle)
}

/// Send raw bytes and read whatever comes back until EOF
fn send_raw(addr: &str, bytes: &[u8]) -> nrpe_bridge::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(timeout())?;
    stream.write_all(bytes)?;
    read_frame(&mut stream, PACKET_LENGTH)
}

// =============================================================================
// Single Connection Tests
// =============================================================================

#[test]
fn test_run_once_answers_query() {
    let (addr, agent) = start_once(|command| {
        assert_eq!(command.name, "check_swap");
        Ok(CommandResult::new(Status::Critical, "SWAP CRITICAL | swap=98%"))
    });

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    let result = Session::open(&TcpDialer, &addr, timeout())
        .unwrap()
        .exchange(&mut codec, &Command::new("check_swap"), timeout())
        .unwrap();

    assert_eq!(result.status, Status::Critical);
    assert_eq!(result.output, "SWAP CRITICAL | swap=98%");
    assert_eq!(agent.join().unwrap().unwrap(), Command::new("check_swap"));
}

#[test]
fn test_response_rejected_as_query() {
    let (addr, agent) = start_once(|_| Ok(CommandResult::ok("never")));

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    let response = codec.encode_response(&CommandResult::ok("hello")).unwrap();

    // Nothing is sent back
    let reply = send_raw(&addr, response.as_bytes());
    assert!(matches!(reply, Err(NrpeError::ShortRead { actual: 0, .. })));

    let served = agent.join().unwrap();
    assert!(matches!(
        served,
        Err(NrpeError::TypeMismatch { expected: 1, actual: 2 })
    ));
}

#[test]
fn test_unterminated_query_rejected() {
    let (addr, agent) = start_once(|_| Ok(CommandResult::ok("never")));

    let mut frame = vec![0u8; PACKET_LENGTH];
    frame[0..2].copy_from_slice(&2u16.to_be_bytes());
    frame[2..4].copy_from_slice(&1u16.to_be_bytes());
    frame[10..10 + MAX_PAYLOAD_LENGTH].fill(b'A');
    let crc = compute_checksum(&frame);
    frame[4..8].copy_from_slice(&crc.to_be_bytes());

    let reply = send_raw(&addr, &frame);
    assert!(matches!(reply, Err(NrpeError::ShortRead { actual: 0, .. })));

    let served = agent.join().unwrap();
    assert!(matches!(served, Err(NrpeError::Protocol(_))));
}

#[test]
fn test_handler_error_closes_without_response() {
    let (addr, agent) = start_once(|_| Err(NrpeError::Protocol("no such command".to_string())));

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    let result = Session::open(&TcpDialer, &addr, timeout())
        .unwrap()
        .exchange(&mut codec, &Command::new("check_nothing"), timeout());

    assert!(matches!(result, Err(NrpeError::ShortRead { actual: 0, .. })));
    assert!(agent.join().unwrap().is_err());
}

#[test]
fn test_output_too_long_is_not_sent() {
    let (addr, agent) = start_once(|_| Ok(CommandResult::ok("y".repeat(MAX_PAYLOAD_LENGTH))));

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    let result = Session::open(&TcpDialer, &addr, timeout())
        .unwrap()
        .exchange(&mut codec, &Command::new("check_verbose"), timeout());

    assert!(matches!(result, Err(NrpeError::ShortRead { .. })));
    match agent.join().unwrap() {
        Err(NrpeError::Protocol(msg)) => assert!(msg.contains("check output too long")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

// =============================================================================
// serve_one Tests
// =============================================================================

#[test]
fn test_serve_one_in_memory() {
    let mut client = PacketCodec::with_seed(ProtocolVersion::V2, 5);
    let query = client.encode_query(&Command::with_args("check_procs", ["5"])).unwrap();
    let (stream, log) = MockStream::new(ReadBehavior::Bytes(query.as_bytes().to_vec()));

    let mut agent_codec = PacketCodec::with_seed(ProtocolVersion::V2, 6);
    let served = serve_one(
        stream,
        &mut agent_codec,
        |command| Ok(CommandResult::new(Status::Unknown, format!("{} args", command.args.len()))),
        timeout(),
    )
    .unwrap();

    assert_eq!(served.to_query_text(), "check_procs!5");
    assert_eq!(log.deadline.get(), timeout());
    assert!(log.closed.get());

    let result = client.decode_response(&log.written.borrow()).unwrap();
    assert_eq!(result, CommandResult::new(Status::Unknown, "1 args"));
}

// =============================================================================
// Accept Loop Tests
// =============================================================================

#[test]
fn test_run_serves_until_shutdown() {
    let mut server = Server::bind("127.0.0.1:0", ProtocolVersion::V2).unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let shutdown = server.shutdown_handle();

    let agent = thread::spawn(move || {
        server.run(|command| Ok(CommandResult::ok(format!("pong {}", command.name))))
    });

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    for name in ["check_a", "check_b", "check_c"] {
        let result = Session::open(&TcpDialer, &addr, timeout())
            .unwrap()
            .exchange(&mut codec, &Command::new(name), timeout())
            .unwrap();
        assert_eq!(result.output, format!("pong {}", name));
    }

    shutdown.store(true, Ordering::Relaxed);
    agent.join().unwrap().unwrap();
}

#[test]
fn test_run_survives_bad_client() {
    let mut server = Server::bind("127.0.0.1:0", ProtocolVersion::V2)
        .unwrap()
        .with_timeout_ms(500);
    let addr = server.local_addr().unwrap().to_string();
    let shutdown = server.shutdown_handle();

    let agent = thread::spawn(move || server.run(|_| Ok(CommandResult::ok("still here"))));

    // Half a frame, then hang up
    {
        let mut stream = TcpStream::connect(&addr).unwrap();
        stream.write_all(&[0u8; 100]).unwrap();
    }

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    let result = Session::open(&TcpDialer, &addr, timeout())
        .unwrap()
        .exchange(&mut codec, &Command::new("check_load"), timeout())
        .unwrap();
    assert_eq!(result.output, "still here");

    shutdown.store(true, Ordering::Relaxed);
    agent.join().unwrap().unwrap();
}

#[test]
fn test_run_survives_client_hangup() {
    let mut server = Server::bind("127.0.0.1:0", ProtocolVersion::V2)
        .unwrap()
        .with_timeout_ms(500);
    let addr = server.local_addr().unwrap().to_string();
    let shutdown = server.shutdown_handle();

    let agent = thread::spawn(move || server.run(|_| Ok(CommandResult::ok("answered"))));

    // Connect and leave before sending anything, twice
    for _ in 0..2 {
        drop(TcpStream::connect(&addr).unwrap());
    }

    let mut codec = PacketCodec::new(ProtocolVersion::V2);
    for _ in 0..2 {
        let result = Session::open(&TcpDialer, &addr, timeout())
            .unwrap()
            .exchange(&mut codec, &Command::new("check_load"), timeout())
            .unwrap();
        assert_eq!(result.output, "answered");
    }

    shutdown.store(true, Ordering::Relaxed);
    agent.join().unwrap().unwrap();
}
