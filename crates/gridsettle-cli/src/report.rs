//! # Report Subcommand
//!
//! Prices a ledger and aggregates the priced results into an
//! [`AggregateReport`]. Records that fail to price are logged and left out
//! of the totals unless `--fail-fast` is set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gridsettle_settlement::{AggregateReport, Aggregator, NettingMode};

use crate::config::RunContext;
use crate::price::{price_ledger, PriceArgs};

/// Arguments for the `gridsettle report` subcommand.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Ledger file: JSON array of trade records.
    #[arg(long)]
    pub ledger: PathBuf,

    /// Tariff file (YAML, or JSON by extension).
    #[arg(long)]
    pub tariff: Option<PathBuf>,

    /// Settlement latencies: JSON array of milliseconds.
    #[arg(long)]
    pub latencies: Option<PathBuf>,

    /// Settlement cycle length in minutes (1-1440).
    #[arg(long)]
    pub cycle_minutes: Option<u32>,

    /// Netting mode: bilateral or multilateral.
    #[arg(long)]
    pub mode: Option<NettingMode>,

    /// Abort on the first record that fails to price.
    #[arg(long)]
    pub fail_fast: bool,

    /// Write the report here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Build the report for the inputs named by `args`.
pub fn build_report(args: &ReportArgs, ctx: &RunContext) -> Result<AggregateReport> {
    let aggregator = Aggregator::new(ctx.cycle(args.cycle_minutes)?, ctx.mode(args.mode));
    let outcome = price_ledger(
        &PriceArgs {
            ledger: args.ledger.clone(),
            tariff: args.tariff.clone(),
            fail_fast: args.fail_fast,
            out: None,
        },
        ctx,
    )?;
    if !outcome.is_clean() {
        tracing::warn!(
            rejected = outcome.rejected.len(),
            "rejected records excluded from report"
        );
    }
    let latencies = match &args.latencies {
        Some(path) => crate::read_latencies(path)?,
        None => Vec::new(),
    };
    aggregate(&aggregator, &outcome.results, &latencies)
        .with_context(|| format!("cannot aggregate ledger {}", args.ledger.display()))
}

#[cfg(not(feature = "parallel"))]
fn aggregate(
    aggregator: &Aggregator,
    results: &[gridsettle_settlement::SettlementResult],
    latencies: &[u64],
) -> Result<AggregateReport, gridsettle_core::SettlementError> {
    aggregator.aggregate(results, latencies)
}

#[cfg(feature = "parallel")]
fn aggregate(
    aggregator: &Aggregator,
    results: &[gridsettle_settlement::SettlementResult],
    latencies: &[u64],
) -> Result<AggregateReport, gridsettle_core::SettlementError> {
    const BATCH_SIZE: usize = 4096;
    aggregator.aggregate_parallel(results, latencies, BATCH_SIZE)
}

/// Execute the report subcommand.
pub fn run_report(args: &ReportArgs, ctx: &RunContext) -> Result<u8> {
    let report = build_report(args, ctx)?;
    crate::write_json(&report, args.out.as_deref())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::tests::write_inputs;

    fn args(dir: &std::path::Path) -> ReportArgs {
        let (tariff, ledger) = write_inputs(dir);
        ReportArgs {
            ledger,
            tariff: Some(tariff),
            latencies: None,
            cycle_minutes: None,
            mode: None,
            fail_fast: false,
            out: None,
        }
    }

    #[test]
    fn report_excludes_rejected_records() {
        let dir = tempfile::tempdir().unwrap();
        let report = build_report(&args(dir.path()), &RunContext::default()).unwrap();
        assert_eq!(report.record_count, 2);
        assert!((report.total_energy_kwh - 1.6).abs() < 1e-9);
        assert!((report.renewable_share_pct - 37.5).abs() < 1e-9);
        assert_eq!(report.netting.net_volume, 40);
        assert!(report.latency.is_none());
    }

    #[test]
    fn latencies_file_is_ranked() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        let lat = dir.path().join("lat.json");
        std::fs::write(&lat, "[400, 100, 300, 200]").unwrap();
        a.latencies = Some(lat);
        let report = build_report(&a, &RunContext::default()).unwrap();
        let latency = report.latency.unwrap();
        assert_eq!(latency.p50_ms, 200);
        assert_eq!(latency.p95_ms, 400);
    }

    #[test]
    fn empty_ledger_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        a.ledger = empty;
        let err = build_report(&a, &RunContext::default()).unwrap_err();
        assert!(format!("{err:#}").contains("no settlement results"));
    }

    #[test]
    fn fail_fast_surfaces_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.fail_fast = true;
        let err = build_report(&a, &RunContext::default()).unwrap_err();
        assert!(format!("{err:#}").contains("no carbon factor configured for tag WIND"));
    }
}
