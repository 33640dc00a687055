//! nrpe-agent
//!
//! A minimal NRPE agent answering every query with a fixed result. Useful
//! for trying the bridge without a real monitoring agent.

use clap::Parser;
use nrpe_bridge::network::Server;
use nrpe_bridge::protocol::{Command, CommandResult, ProtocolVersion, Status, VERSION_COMMAND};
use tracing_subscriber::{fmt, EnvFilter};

/// nrpe-agent
#[derive(Parser, Debug)]
#[command(name = "nrpe-agent")]
#[command(about = "Answer NRPE queries with a fixed check result")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5666")]
    listen: String,

    /// Status code to return (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN)
    #[arg(short, long, default_value = "0")]
    status: u16,

    /// Output text to return, perfdata included
    #[arg(short, long, default_value = "OK - all good | load1=0.50;1.00;2.00")]
    output: String,

    /// Per-connection timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nrpe_bridge=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let Some(status) = Status::from_u16(args.status) else {
        tracing::error!("Invalid status code {}", args.status);
        std::process::exit(1);
    };

    tracing::info!("nrpe-agent v{}", nrpe_bridge::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let mut server = match Server::bind(&args.listen, ProtocolVersion::V2) {
        Ok(s) => s.with_timeout_ms(args.timeout_ms),
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    let output = args.output;
    let handler = move |command: &Command| -> nrpe_bridge::Result<CommandResult> {
        if command.name == VERSION_COMMAND {
            return Ok(CommandResult::ok(format!("nrpe-agent v{}", nrpe_bridge::VERSION)));
        }
        tracing::info!("Query: {}", command);
        Ok(CommandResult::new(status, output.clone()))
    };

    if let Err(e) = server.run(handler) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
