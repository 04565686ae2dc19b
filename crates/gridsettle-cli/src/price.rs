//! # Price Subcommand
//!
//! Prices every record in a ledger and writes the [`BatchOutcome`]: priced
//! results plus rejected records with their reasons.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gridsettle_settlement::{price_batch, BatchOutcome};

use crate::config::RunContext;

/// Arguments for the `gridsettle price` subcommand.
#[derive(Args, Debug)]
pub struct PriceArgs {
    /// Ledger file: JSON array of trade records.
    #[arg(long)]
    pub ledger: PathBuf,

    /// Tariff file (YAML, or JSON by extension).
    #[arg(long)]
    pub tariff: Option<PathBuf>,

    /// Abort on the first record that fails to price.
    #[arg(long)]
    pub fail_fast: bool,

    /// Write the outcome here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Price the ledger named by `args`.
pub fn price_ledger(args: &PriceArgs, ctx: &RunContext) -> Result<BatchOutcome> {
    let tariff = ctx.load_tariff(args.tariff.as_deref())?;
    let records = crate::read_ledger(&args.ledger)?;
    price_batch(&records, &tariff, ctx.policy(args.fail_fast))
        .with_context(|| format!("failed to price ledger {}", args.ledger.display()))
}

/// Execute the price subcommand.
pub fn run_price(args: &PriceArgs, ctx: &RunContext) -> Result<u8> {
    let outcome = price_ledger(args, ctx)?;
    if !outcome.is_clean() {
        tracing::warn!(
            rejected = outcome.rejected.len(),
            "some records could not be priced"
        );
    }
    crate::write_json(&outcome, args.out.as_deref())?;
    Ok(0)
}
