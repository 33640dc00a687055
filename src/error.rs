//! Error types for nrpe-bridge
//!
//! Provides a unified error type for the codec, the transport session,
//! perfdata handling and configuration.

use thiserror::Error;

/// Result type alias using NrpeError
pub type Result<T> = std::result::Result<T, NrpeError>;

/// Unified error type for nrpe-bridge operations
#[derive(Debug, Error)]
pub enum NrpeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Cannot connect to {target}: {reason}")]
    Dial { target: String, reason: String },

    #[error("Frame I/O error: {0}")]
    FrameIo(String),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    // -------------------------------------------------------------------------
    // Protocol Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Packet type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: u16, actual: u16 },

    #[error("Checksum mismatch: packet says 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Unknown status code {0}")]
    UnknownStatus(u16),

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Caller Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Command is too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Perfdata Errors (never fatal for a scrape)
    // -------------------------------------------------------------------------
    #[error("Label decode error: {0}")]
    LabelDecode(String),

    #[error("Invalid value: {0:?}")]
    ValueParse(String),

    // -------------------------------------------------------------------------
    // Exposition Errors
    // -------------------------------------------------------------------------
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl NrpeError {
    /// True for failures that mean the whole target should be treated as down
    pub fn is_dial(&self) -> bool {
        matches!(self, NrpeError::Dial { .. })
    }
}

impl From<base64::DecodeError> for NrpeError {
    fn from(err: base64::DecodeError) -> Self {
        NrpeError::LabelDecode(err.to_string())
    }
}

impl From<toml::de::Error> for NrpeError {
    fn from(err: toml::de::Error) -> Self {
        NrpeError::Config(err.to_string())
    }
}

impl From<prometheus::Error> for NrpeError {
    fn from(err: prometheus::Error) -> Self {
        NrpeError::Metrics(err.to_string())
    }
}
