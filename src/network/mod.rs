//! Network Module
//!
//! Byte streams, the bridge-side session and the agent-side server.
//!
//! ## Architecture
//! - `Dialer` opens one stream per command (plain TCP bundled)
//! - `Session` runs one exchange and closes the stream
//! - `Server`/`Connection` answer one query per accepted connection

mod dialer;
mod session;
mod connection;
mod server;

pub use dialer::{Dialer, NrpeStream, TcpDialer};
pub use session::{Session, SessionState};
pub use connection::{serve_one, Connection};
pub use server::Server;
