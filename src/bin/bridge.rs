//! nrpe-bridge CLI
//!
//! Scrapes one NRPE target and prints the metrics in the Prometheus text
//! format.

use clap::Parser;
use nrpe_bridge::metrics::{encode_text, MetricKind};
use nrpe_bridge::network::TcpDialer;
use nrpe_bridge::scrape::check_command;
use nrpe_bridge::{CommandSpec, Config, Profiles, ScrapeOrchestrator};
use tracing_subscriber::{fmt, EnvFilter};

/// nrpe-bridge
#[derive(Parser, Debug)]
#[command(name = "nrpe-bridge")]
#[command(about = "Run NRPE checks and print them as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Agent address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5666")]
    target: String,

    /// Command to run (ignored when --profile is given)
    #[arg(short, long)]
    command: Option<String>,

    /// Command arguments, separated by '!'
    #[arg(short, long, default_value = "")]
    params: String,

    /// Comma-separated metric names for the perfdata value slots
    #[arg(long)]
    metric_name: Option<String>,

    /// Prefix for perfdata metric names
    #[arg(long)]
    metric_prefix: Option<String>,

    /// Label carrying the perfdata field name ("NONE" for no label)
    #[arg(long)]
    label_name: Option<String>,

    /// Help text of perfdata metrics
    #[arg(long)]
    help_text: Option<String>,

    /// Only report status metrics, skip perfdata
    #[arg(long)]
    no_perfdata: bool,

    /// Metric type of perfdata metrics (gauge or counter)
    #[arg(long, default_value = "gauge")]
    metric_type: MetricKind,

    /// Profiles file (TOML)
    #[arg(long)]
    profiles_file: Option<String>,

    /// Profile to run from the profiles file
    #[arg(long)]
    profile: Option<String>,

    /// Print the loaded profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Ask the agent for its version and exit
    #[arg(long)]
    check_version: bool,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    /// Read/write timeout per command in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Budget for the whole scrape in milliseconds (0 = unbounded)
    #[arg(long, default_value = "0")]
    scrape_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging on stderr, stdout carries the metrics
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nrpe_bridge=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> nrpe_bridge::Result<()> {
    let config = Config::builder()
        .connect_timeout_ms(args.connect_timeout_ms)
        .exchange_timeout_ms(args.timeout_ms)
        .scrape_timeout_ms(args.scrape_timeout_ms)
        .default_kind(args.metric_type)
        .build();

    let profiles = match &args.profiles_file {
        Some(path) => Some(Profiles::load(path)?),
        None => None,
    };

    if args.list_profiles {
        let profiles = profiles.ok_or_else(|| {
            nrpe_bridge::NrpeError::Config("no profiles file given".to_string())
        })?;
        print!("{}", profiles.dump()?);
        return Ok(());
    }

    if args.check_version {
        let result = check_command(
            &TcpDialer,
            &config,
            &args.target,
            &CommandSpec::new(nrpe_bridge::protocol::VERSION_COMMAND),
        )?;
        println!("{} {}", result.status, result.output);
        return Ok(());
    }

    let commands = match (&args.profile, &args.command) {
        (Some(name), _) => {
            let profiles = profiles.ok_or_else(|| {
                nrpe_bridge::NrpeError::Config("no profile defined!".to_string())
            })?;
            profiles.find(name)?.commands.clone()
        }
        (None, Some(command)) => vec![adhoc_spec(&args, command)],
        (None, None) => {
            return Err(nrpe_bridge::NrpeError::Config(
                "Command parameter is missing".to_string(),
            ))
        }
    };

    tracing::info!("nrpe-bridge v{}", nrpe_bridge::VERSION);
    tracing::info!("Scraping {} ({} command(s))", args.target, commands.len());

    let orchestrator = ScrapeOrchestrator::new(config, TcpDialer);
    let scrape = orchestrator.scrape(&args.target, &commands);
    print!("{}", encode_text(&scrape.metrics)?);

    Ok(())
}

/// Build the single command spec given on the command line
fn adhoc_spec(args: &Args, command: &str) -> CommandSpec {
    let mut spec = CommandSpec::new(command)
        .params(args.params.clone())
        .perfdata(!args.no_perfdata);
    if let Some(names) = &args.metric_name {
        spec = spec.metric_name(names.clone());
    }
    if let Some(prefix) = &args.metric_prefix {
        spec = spec.metric_prefix(prefix.clone());
    }
    if let Some(label) = &args.label_name {
        spec = spec.label_name(label.clone());
    }
    if let Some(help) = &args.help_text {
        spec = spec.help(help.clone());
    }
    spec
}
