//! Scrape Orchestrator
//!
//! Runs a list of commands against one target and turns the results into
//! metrics.
//!
//! ## Per scrape
//! 1. For each command, in order: dial a fresh connection, exchange, close
//! 2. Emit `nrpe_command_ok`, `nrpe_command_status`, `nrpe_command_duration`
//!    then the command's perfdata metrics
//! 3. Emit `nrpe_scrape_duration` and `nrpe_up`
//!
//! A dial failure means the target is down: `nrpe_up 0` is emitted and the
//! remaining commands are skipped. A failed exchange only fails its own
//! command (`nrpe_command_ok 0`). Nothing is retried.

use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::Result;
use crate::metrics::{MetricRecord, MetricSink};
use crate::network::{Dialer, Session};
use crate::perfdata::{parse_perfdata, MetricNamer};
use crate::profile::CommandSpec;
use crate::protocol::{CommandResult, PacketCodec};

pub const UP_METRIC: &str = "nrpe_up";
pub const SCRAPE_DURATION_METRIC: &str = "nrpe_scrape_duration";
pub const COMMAND_OK_METRIC: &str = "nrpe_command_ok";
pub const COMMAND_STATUS_METRIC: &str = "nrpe_command_status";
pub const COMMAND_DURATION_METRIC: &str = "nrpe_command_duration";

/// Label carrying the command name on per-command metrics
pub const COMMAND_LABEL: &str = "command";

const UP_HELP: &str = "Indicates whether or not nrpe agent is up";
const SCRAPE_DURATION_HELP: &str = "Length of time the NRPE commands took";
const COMMAND_OK_HELP: &str =
    "Indicates whether or not the command was a success (0: cmd status code did not equal 0 | 1: ok)";
const COMMAND_STATUS_HELP: &str =
    "Indicates the status of the command (nrpe status: 0: OK | 1: WARNING | 2: CRITICAL | 3: UNKNOWN)";
const COMMAND_DURATION_HELP: &str = "Length of time the NRPE command took";

/// Result of one scrape
#[derive(Debug, Clone)]
pub struct Scrape {
    /// All emitted records, in emission order
    pub metrics: Vec<MetricRecord>,

    /// False when the batch was aborted
    pub up: bool,

    pub duration: Duration,
}

/// Drives commands against targets
///
/// Holds only read-only configuration. Each call owns its codec and its
/// connections, so one orchestrator can serve concurrent scrapes.
pub struct ScrapeOrchestrator<D: Dialer> {
    config: Config,
    dialer: D,
}

impl<D: Dialer> ScrapeOrchestrator<D> {
    pub fn new(config: Config, dialer: D) -> Self {
        Self { config, dialer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Scrape `target` and collect the records
    pub fn scrape(&self, target: &str, commands: &[CommandSpec]) -> Scrape {
        let start = Instant::now();
        let mut metrics = Vec::new();
        let up = self.scrape_into(target, commands, &mut metrics);
        Scrape {
            metrics,
            up,
            duration: start.elapsed(),
        }
    }

    /// Scrape `target`, streaming records into `sink`
    ///
    /// Returns the value emitted for `nrpe_up`.
    pub fn scrape_into<S: MetricSink>(&self, target: &str, commands: &[CommandSpec], sink: &mut S) -> bool {
        let start = Instant::now();
        let deadline = self.config.scrape_timeout().map(|t| start + t);
        let mut codec = PacketCodec::new(self.config.protocol_version);

        for spec in commands {
            match self.run_command(&mut codec, target, spec, deadline) {
                Ok(Outcome::Completed(result, duration)) => {
                    self.emit_command(spec, &result, duration, sink)
                }
                Ok(Outcome::OutOfTime) => {
                    tracing::warn!(
                        "Scrape of {} ran out of time at {:?}, aborting",
                        target,
                        spec.command
                    );
                    sink.emit(MetricRecord::gauge(UP_METRIC, UP_HELP, 0.0));
                    return false;
                }
                Err(e) if e.is_dial() => {
                    tracing::error!("Error dialing NRPE server: {}", e);
                    sink.emit(MetricRecord::gauge(UP_METRIC, UP_HELP, 0.0));
                    return false;
                }
                Err(e) => {
                    tracing::error!("Error running command {:?}: {}", spec.command, e);
                    sink.emit(
                        MetricRecord::gauge(COMMAND_OK_METRIC, COMMAND_OK_HELP, 0.0)
                            .with_label(COMMAND_LABEL, spec.command.clone()),
                    );
                }
            }
        }

        sink.emit(MetricRecord::gauge(
            SCRAPE_DURATION_METRIC,
            SCRAPE_DURATION_HELP,
            start.elapsed().as_secs_f64(),
        ));
        sink.emit(MetricRecord::gauge(UP_METRIC, UP_HELP, 1.0));
        true
    }

    /// Run one command on a fresh connection
    ///
    /// The query is encoded before dialing so an oversized command never
    /// reaches the network. Both the connect timeout and the exchange
    /// deadline are cut to what is left of the scrape budget; the budget is
    /// checked again once the dial returns.
    fn run_command(
        &self,
        codec: &mut PacketCodec,
        target: &str,
        spec: &CommandSpec,
        deadline: Option<Instant>,
    ) -> Result<Outcome> {
        let command = spec.to_command();
        let query = codec.encode_query(&command)?;

        let Some(connect_timeout) = within_budget(self.config.connect_timeout(), deadline) else {
            return Ok(Outcome::OutOfTime);
        };
        let session = Session::open(&self.dialer, target, connect_timeout)?;

        let Some(timeout) = within_budget(self.config.exchange_timeout(), deadline) else {
            session.close();
            return Ok(Outcome::OutOfTime);
        };
        let peer = session.peer_addr().to_string();

        let start = Instant::now();
        let result = session.exchange_encoded(codec, &query, timeout)?;
        let duration = start.elapsed();

        tracing::info!(
            "Command returned: command={} address={} duration={:.6} return_code={} command_output={:?}",
            command,
            peer,
            duration.as_secs_f64(),
            result.status.code(),
            result.output
        );
        Ok(Outcome::Completed(result, duration))
    }

    fn emit_command<S: MetricSink>(
        &self,
        spec: &CommandSpec,
        result: &CommandResult,
        duration: Duration,
        sink: &mut S,
    ) {
        let ok = if result.status.is_ok() { 1.0 } else { 0.0 };
        sink.emit(
            MetricRecord::gauge(COMMAND_OK_METRIC, COMMAND_OK_HELP, ok)
                .with_label(COMMAND_LABEL, spec.command.clone()),
        );
        sink.emit(
            MetricRecord::gauge(
                COMMAND_STATUS_METRIC,
                COMMAND_STATUS_HELP,
                f64::from(result.status.code()),
            )
            .with_label(COMMAND_LABEL, spec.command.clone()),
        );
        sink.emit(
            MetricRecord::gauge(
                COMMAND_DURATION_METRIC,
                COMMAND_DURATION_HELP,
                duration.as_secs_f64(),
            )
            .with_label(COMMAND_LABEL, spec.command.clone()),
        );

        if !spec.perfdata {
            return;
        }
        let fields = parse_perfdata(&result.output);
        for record in MetricNamer::new(spec, &self.config.naming).records(&fields) {
            tracing::debug!("will add metric {} = {}", record.name, record.value);
            sink.emit(record);
        }
    }
}

/// How far one command got within the scrape budget
enum Outcome {
    Completed(CommandResult, Duration),
    OutOfTime,
}

/// Cut `limit` to the time left before `deadline`
///
/// `None` once the deadline has passed; `Some(None)` when nothing bounds
/// the operation.
fn within_budget(limit: Option<Duration>, deadline: Option<Instant>) -> Option<Option<Duration>> {
    let Some(deadline) = deadline else {
        return Some(limit);
    };
    let remaining = deadline.checked_duration_since(Instant::now())?;
    if remaining.is_zero() {
        return None;
    }
    Some(Some(match limit {
        Some(t) => t.min(remaining),
        None => remaining,
    }))
}

/// Run a single command outside of a scrape and return its raw result
pub fn check_command<D: Dialer>(
    dialer: &D,
    config: &Config,
    target: &str,
    spec: &CommandSpec,
) -> Result<CommandResult> {
    let mut codec = PacketCodec::new(config.protocol_version);
    let session = Session::open(dialer, target, config.connect_timeout())?;
    session.exchange(&mut codec, &spec.to_command(), config.exchange_timeout())
}
