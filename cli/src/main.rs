//! ntool - multifunctional network analyser
//!
//! ```text
//! ntool --ping [-n N] TARGET
//! ntool --tr [-m HOPS] [-q QUERIES] TARGET
//! ```

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser};
use log::{debug, LevelFilter};

use ntool_ping::{
    resolve, CancelToken, PingConfig, PingOutcome, PingReport, Pinger, RawSocket, TraceConfig,
    TraceOutcome, TraceReport, Tracer,
};

#[derive(Parser, Debug)]
#[command(
    name = "ntool",
    author,
    version,
    about = "ntool - multifunctional network analyser tool",
    after_help = "EXAMPLES:\n    \
        ntool --ping 127.0.0.1            ping IP address\n    \
        ntool --ping -n 6 example.com     ping hostname 6 times\n    \
        ntool --tr -m 10 -q 4 example.com trace route, 10 hops, 4 queries"
)]
#[command(group(ArgGroup::new("mode").args(["ping", "tr"])))]
struct Args {
    /// Ping a specific IP address or hostname
    #[arg(long)]
    ping: bool,

    /// Trace the route to a target
    #[arg(long)]
    tr: bool,

    /// Number of echo requests (0 selects the default of 4)
    #[arg(short = 'n', value_name = "N", requires = "ping")]
    count: Option<u16>,

    /// Maximum number of hops (0 selects the default of 30)
    #[arg(short = 'm', value_name = "N", requires = "tr")]
    max_hops: Option<u8>,

    /// Probes per hop (0 selects the default of 3)
    #[arg(short = 'q', value_name = "N", requires = "tr")]
    max_queries: Option<u16>,

    /// Per-probe reply timeout in milliseconds
    #[arg(short = 'W', long = "timeout", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// IP address or hostname
    target: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    if !is_root() {
        eprintln!("ntool: this process must be run as root");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ntool: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Exit status of a finished ping run
///
/// A run that gathered no round-trip samples has nothing to summarize and
/// fails, as does an interrupted one. Losing some probes is still success.
fn ping_succeeded(report: &PingReport) -> bool {
    report.outcome != PingOutcome::Cancelled && report.stats.has_connectivity()
}

/// Exit status of a finished trace
///
/// Running out of hops before the destination answers is a normal end.
fn trace_succeeded(report: &TraceReport) -> bool {
    report.outcome != TraceOutcome::Cancelled
}

/// Run the selected mode, returning whether it completed normally
fn run(args: Args) -> Result<bool> {
    if !args.ping && !args.tr {
        Args::command().print_help()?;
        return Ok(true);
    }

    let mode = if args.ping { "--ping" } else { "--tr" };
    let target = match args.target.as_deref() {
        Some(target) => target,
        None => anyhow::bail!("expected target after {} option", mode),
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install the interrupt handler")?;

    let target = resolve(target)?;
    debug!("resolved {} to {}", target.name, target.addr);

    let timeout = args.timeout_ms.map(Duration::from_millis);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let succeeded = if args.ping {
        let defaults = PingConfig::default();
        let config = PingConfig {
            count: args.count.unwrap_or(0),
            timeout: timeout.unwrap_or(defaults.timeout),
            ..defaults
        };
        let socket = RawSocket::icmpv4(config.timeout).context("ping")?;
        let mut pinger = Pinger::new(config, socket).with_cancel(cancel);

        let report = pinger.run(&target, &mut out).context("ping")?;
        ping_succeeded(&report)
    } else {
        let defaults = TraceConfig::default();
        let config = TraceConfig {
            max_hops: args.max_hops.unwrap_or(0),
            max_queries: args.max_queries.unwrap_or(0),
            timeout: timeout.unwrap_or(defaults.timeout),
            ..defaults
        };
        let socket = RawSocket::icmpv4(config.timeout).context("traceroute")?;
        let mut tracer = Tracer::new(config, socket).with_cancel(cancel);

        let report = tracer.run(&target, &mut out).context("traceroute")?;
        trace_succeeded(&report)
    };

    out.flush()?;
    Ok(succeeded)
}
