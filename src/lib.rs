//! # nrpe-bridge
//!
//! Bridges NRPE agents to Prometheus:
//! - Bit-exact NRPE v2 packet codec with CRC-32 and random padding
//! - One-exchange-per-connection transport session
//! - Performance data parsing (`name=v1;v2;...` and `name=labels(...)`)
//! - Deterministic metric naming and labeling
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Scrape Orchestrator                        │
//! │          (one target, commands run in order)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  one connection per command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Transport Session                           │
//! │        dial → send query → receive response → close          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │ PacketCodec │          │  Perfdata    │
//!   │ (CRC, pad)  │          │ parse + name │
//!   └─────────────┘          └──────┬───────┘
//!                                   │
//!                                   ▼
//!                           ┌──────────────┐
//!                           │ MetricRecord │
//!                           │  exposition  │
//!                           └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod profile;

pub mod protocol;
pub mod network;
pub mod perfdata;
pub mod metrics;
pub mod scrape;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{NrpeError, Result};
pub use config::Config;
pub use profile::{CommandSpec, Profiles};
pub use scrape::{Scrape, ScrapeOrchestrator};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of nrpe-bridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
