//! # gridsettle CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gridsettle_cli::config::RunContext;
use gridsettle_cli::net::{run_net, NetArgs};
use gridsettle_cli::price::{run_price, PriceArgs};
use gridsettle_cli::report::{run_report, ReportArgs};
use gridsettle_cli::simulate::{run_simulate, SimulateArgs};
use gridsettle_cli::tariff::{run_tariff, TariffArgs};

/// Tariff-based settlement and netting for metered energy trades.
#[derive(Parser, Debug)]
#[command(name = "gridsettle", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Path to run configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load, validate and summarize a tariff.
    Tariff(TariffArgs),

    /// Price every record in a ledger.
    Price(PriceArgs),

    /// Compute a settlement netting plan for a ledger.
    Net(NetArgs),

    /// Aggregate report: energy, carbon, netting efficiency, latency.
    Report(ReportArgs),

    /// Generate a deterministic demo ledger from the campus meter fleet.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides -v.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "gridsettle starting");

    let result = RunContext::load(cli.config.as_deref()).and_then(|ctx| match &cli.command {
        Commands::Tariff(args) => run_tariff(args, &ctx),
        Commands::Price(args) => run_price(args, &ctx),
        Commands::Net(args) => run_net(args, &ctx),
        Commands::Report(args) => run_report(args, &ctx),
        Commands::Simulate(args) => run_simulate(args, &ctx),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
