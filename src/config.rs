//! Configuration for nrpe-bridge
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::metrics::MetricKind;
use crate::protocol::ProtocolVersion;

/// Help text used for perfdata metrics without an explicit one
pub const DEFAULT_PERFDATA_HELP: &str = "the NRPE command perfdata value";

/// Main configuration for a scrape orchestrator
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Packet layout spoken to agents
    pub protocol_version: ProtocolVersion,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read/write deadline for one exchange (milliseconds, 0 = none)
    pub exchange_timeout_ms: u64,

    /// Budget for a whole scrape (milliseconds, 0 = unbounded)
    /// Once spent, remaining commands are not run.
    pub scrape_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Naming Configuration
    // -------------------------------------------------------------------------
    /// Fallbacks for commands that do not set help text or a metric type
    pub naming: NamingDefaults,
}

/// Defaults applied by the metric namer
#[derive(Debug, Clone, PartialEq)]
pub struct NamingDefaults {
    pub help: String,
    pub kind: MetricKind,
}

impl Default for NamingDefaults {
    fn default() -> Self {
        Self {
            help: DEFAULT_PERFDATA_HELP.to_string(),
            kind: MetricKind::Gauge,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::V2,
            connect_timeout_ms: 5000,
            exchange_timeout_ms: 10000,
            scrape_timeout_ms: 0,
            naming: NamingDefaults::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn exchange_timeout(&self) -> Option<Duration> {
        millis(self.exchange_timeout_ms)
    }

    pub fn scrape_timeout(&self) -> Option<Duration> {
        millis(self.scrape_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the protocol version
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.config.protocol_version = version;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-exchange read/write timeout (in milliseconds)
    pub fn exchange_timeout_ms(mut self, ms: u64) -> Self {
        self.config.exchange_timeout_ms = ms;
        self
    }

    /// Set the whole-scrape budget (in milliseconds)
    pub fn scrape_timeout_ms(mut self, ms: u64) -> Self {
        self.config.scrape_timeout_ms = ms;
        self
    }

    /// Set the default help text for perfdata metrics
    pub fn default_help(mut self, help: impl Into<String>) -> Self {
        self.config.naming.help = help.into();
        self
    }

    /// Set the default metric type for perfdata metrics
    pub fn default_kind(mut self, kind: MetricKind) -> Self {
        self.config.naming.kind = kind;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
