//! # Tariff Subcommand
//!
//! Loads and validates a tariff, then prints the effective rate for every
//! priced carbon tag in every period. Useful for checking a tariff edit
//! before pricing a ledger with it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use gridsettle_core::CarbonTag;
use gridsettle_tariff::{TariffConfig, TariffPeriod};
use serde::Serialize;

use crate::config::RunContext;

/// Arguments for the `gridsettle tariff` subcommand.
#[derive(Args, Debug)]
pub struct TariffArgs {
    /// Tariff file (YAML, or JSON by extension).
    #[arg(long)]
    pub tariff: Option<PathBuf>,

    /// Write the summary here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Rendered view of a validated tariff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffSummary {
    pub currency: String,
    pub base_rate: f64,
    pub peak_window: String,
    pub off_peak_window: String,
    pub utc_offset_minutes: i32,
    /// Effective currency-per-kWh rate by period and tag.
    pub rates: BTreeMap<TariffPeriod, BTreeMap<CarbonTag, f64>>,
    /// Emissions factor by tag, kg CO2 per kWh.
    pub carbon_factor: BTreeMap<CarbonTag, f64>,
}

impl TariffSummary {
    pub fn from_tariff(tariff: &TariffConfig) -> Self {
        let mut rates = BTreeMap::new();
        for &period in TariffPeriod::all() {
            let period_rate = tariff.base_rate * tariff.multiplier(period);
            let by_tag: BTreeMap<CarbonTag, f64> = tariff
                .priced_tags()
                .filter_map(|tag| {
                    let adjustment = tariff.adjustment(tag).ok()?;
                    Some((tag.clone(), adjustment.apply(period_rate)))
                })
                .collect();
            rates.insert(period, by_tag);
        }
        Self {
            currency: tariff.currency.to_string(),
            base_rate: tariff.base_rate,
            peak_window: tariff.peak_window.to_string(),
            off_peak_window: tariff.off_peak_window.to_string(),
            utc_offset_minutes: tariff.utc_offset_minutes,
            rates,
            carbon_factor: tariff.carbon_factor.clone(),
        }
    }
}

/// Execute the tariff subcommand.
pub fn run_tariff(args: &TariffArgs, ctx: &RunContext) -> Result<u8> {
    let tariff = ctx.load_tariff(args.tariff.as_deref())?;
    crate::write_json(&TariffSummary::from_tariff(&tariff), args.out.as_deref())?;
    Ok(0)
}
