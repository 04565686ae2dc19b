//! # Net Subcommand
//!
//! Prices a ledger, derives buyer-to-seller obligations from records that
//! name a counterparty, and writes the resulting [`NettingPlan`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gridsettle_settlement::{NettingEngine, NettingMode, NettingPlan};

use crate::config::RunContext;
use crate::price::{price_ledger, PriceArgs};

/// Arguments for the `gridsettle net` subcommand.
#[derive(Args, Debug)]
pub struct NetArgs {
    /// Ledger file: JSON array of trade records.
    #[arg(long)]
    pub ledger: PathBuf,

    /// Tariff file (YAML, or JSON by extension).
    #[arg(long)]
    pub tariff: Option<PathBuf>,

    /// Settlement cycle length in minutes (1-1440).
    #[arg(long)]
    pub cycle_minutes: Option<u32>,

    /// Netting mode: bilateral or multilateral.
    #[arg(long)]
    pub mode: Option<NettingMode>,

    /// Abort on the first record that fails to price.
    #[arg(long)]
    pub fail_fast: bool,

    /// Write the plan here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Compute the netting plan for the ledger named by `args`.
pub fn net_ledger(args: &NetArgs, ctx: &RunContext) -> Result<NettingPlan> {
    let cycle = ctx.cycle(args.cycle_minutes)?;
    let mode = ctx.mode(args.mode);
    let outcome = price_ledger(
        &PriceArgs {
            ledger: args.ledger.clone(),
            tariff: args.tariff.clone(),
            fail_fast: args.fail_fast,
            out: None,
        },
        ctx,
    )?;
    NettingEngine::from_results(&outcome.results, cycle)
        .compute_plan(mode, cycle)
        .with_context(|| format!("cannot net ledger {}", args.ledger.display()))
}

/// Execute the net subcommand.
pub fn run_net(args: &NetArgs, ctx: &RunContext) -> Result<u8> {
    let plan = net_ledger(args, ctx)?;
    tracing::info!(
        legs = plan.summary.leg_count,
        efficiency_pct = plan.summary.efficiency_pct,
        "netting plan ready"
    );
    crate::write_json(&plan, args.out.as_deref())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::tests::write_inputs;

    fn args(dir: &std::path::Path, cycle_minutes: Option<u32>) -> NetArgs {
        let (tariff, ledger) = write_inputs(dir);
        NetArgs {
            ledger,
            tariff: Some(tariff),
            cycle_minutes,
            mode: None,
            fail_fast: false,
            out: None,
        }
    }

    #[test]
    fn hourly_cycle_nets_opposing_flows() {
        let dir = tempfile::tempdir().unwrap();
        let plan = net_ledger(&args(dir.path(), None), &RunContext::default()).unwrap();
        assert_eq!(plan.obligations.len(), 2);
        assert_eq!(plan.settlement_legs.len(), 1);
        assert_eq!(plan.settlement_legs[0].from_party.as_str(), "B");
        assert_eq!(plan.settlement_legs[0].amount, 40);
        assert!((plan.summary.efficiency_pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn short_cycle_keeps_flows_apart() {
        let dir = tempfile::tempdir().unwrap();
        let plan = net_ledger(&args(dir.path(), Some(30)), &RunContext::default()).unwrap();
        assert_eq!(plan.settlement_legs.len(), 2);
        assert_eq!(plan.summary.efficiency_pct, 0.0);
    }

    #[test]
    fn ledger_without_counterparties_cannot_net() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), None);
        let ledger = dir.path().join("solo.json");
        std::fs::write(
            &ledger,
            r#"[{"meter_id":"M-1","energy_kwh":1.0,"carbon_tag":"GRID","timestamp":"2026-01-22T10:00:00Z"}]"#,
        )
        .unwrap();
        a.ledger = ledger;
        let err = net_ledger(&a, &RunContext::default()).unwrap_err();
        assert!(format!("{err:#}").contains("no obligations"));
    }
}
