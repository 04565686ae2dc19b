//! # Simulate Subcommand
//!
//! Generates a demo ledger from the campus meter fleet. Output is fully
//! determined by `--start`, `--hours` and `--seed`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gridsettle_core::{Timestamp, TradeRecord};
use gridsettle_meter::{
    simulate_latencies, MeterFleet, MAX_LATENCY_SAMPLES, MAX_SIMULATION_HOURS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::RunContext;

/// Arguments for the `gridsettle simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// First reading time, RFC 3339.
    #[arg(long, default_value = "2026-01-22T00:00:00Z")]
    pub start: String,

    /// Hours of readings to generate (at most one leap year).
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_SIMULATION_HOURS)))]
    pub hours: u32,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Ledger output path.
    #[arg(long, short)]
    pub out: PathBuf,

    /// Also write this many latency samples to `--latencies-out`.
    #[arg(long, default_value_t = 200, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(0..=MAX_LATENCY_SAMPLES as u64))]
    pub latency_samples: usize,

    /// Latency samples output path.
    #[arg(long)]
    pub latencies_out: Option<PathBuf>,
}

/// Generate the ledger and latency samples described by `args`.
pub fn simulate(args: &SimulateArgs) -> Result<(Vec<TradeRecord>, Vec<u64>)> {
    let start = Timestamp::parse(&args.start).context("invalid --start")?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut fleet = MeterFleet::campus_demo().context("failed to build demo fleet")?;
    let ledger = fleet
        .simulate(start, args.hours, &mut rng)
        .context("simulation failed")?;
    let latencies =
        simulate_latencies(args.latency_samples, &mut rng).context("latency sampling failed")?;
    Ok((ledger, latencies))
}

/// Execute the simulate subcommand.
pub fn run_simulate(args: &SimulateArgs, _ctx: &RunContext) -> Result<u8> {
    let (ledger, latencies) = simulate(args)?;
    crate::write_json(&ledger, Some(&args.out))?;
    if let Some(path) = &args.latencies_out {
        crate::write_json(&latencies, Some(path))?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &std::path::Path, seed: u64) -> SimulateArgs {
        SimulateArgs {
            start: "2026-01-22T00:00:00Z".into(),
            hours: 6,
            seed,
            out: dir.join(format!("ledger-{seed}.json")),
            latency_samples: 10,
            latencies_out: Some(dir.join(format!("lat-{seed}.json"))),
        }
    }

    #[test]
    fn seeded_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(dir.path(), 9);
        run_simulate(&a, &RunContext::default()).unwrap();
        let first = std::fs::read(&a.out).unwrap();
        run_simulate(&a, &RunContext::default()).unwrap();
        assert_eq!(std::fs::read(&a.out).unwrap(), first);

        let ledger = crate::read_ledger(&a.out).unwrap();
        assert_eq!(ledger.len(), 30);
        let latencies = crate::read_latencies(a.latencies_out.as_ref().unwrap()).unwrap();
        assert_eq!(latencies.len(), 10);
    }

    #[test]
    fn different_seeds_differ() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = simulate(&args(dir.path(), 1)).unwrap();
        let (b, _) = simulate(&args(dir.path(), 2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn oversized_runs_fail_without_allocating() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), 1);
        a.hours = u32::MAX;
        let err = simulate(&a).unwrap_err();
        assert!(format!("{err:#}").contains("hour limit"));

        let mut b = args(dir.path(), 1);
        b.latency_samples = usize::MAX;
        assert!(simulate(&b).is_err());
    }

    #[test]
    fn oversized_flags_rejected_by_parser() {
        use clap::Parser;

        #[derive(Parser)]
        struct Cmd {
            #[command(flatten)]
            args: SimulateArgs,
        }

        assert!(Cmd::try_parse_from(["simulate", "--out", "l.json", "--hours", "4294967295"]).is_err());
        assert!(Cmd::try_parse_from(["simulate", "--out", "l.json", "--latency-samples", "1000001"]).is_err());
        let ok = Cmd::try_parse_from(["simulate", "--out", "l.json", "--hours", "8784"]).unwrap();
        assert_eq!(ok.args.hours, MAX_SIMULATION_HOURS);
    }

    #[test]
    fn bad_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), 1);
        a.start = "yesterday".into();
        assert!(simulate(&a).is_err());
    }
}
