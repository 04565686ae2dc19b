//! # Record Pricing
//!
//! [`price`] turns one [`TradeRecord`] into one [`SettlementResult`] under
//! the active [`TariffConfig`]. It is a pure function: the same record and
//! tariff always produce a bit-identical result, and a failure leaves
//! nothing behind.
//!
//! ## Formula
//!
//! ```text
//! period_rate    = base_rate × period_multiplier
//! effective_rate = adjustment[tag].apply(period_rate)
//! billed_amount  = energy_kwh × effective_rate
//! co2_kg         = energy_kwh × carbon_factor[tag]
//! baseline_co2   = energy_kwh × carbon_factor[GRID]
//! ```

use gridsettle_core::{
    CarbonTag, Counterparty, MeterId, ReadingDigest, SettlementError, Timestamp, TradeRecord,
};
use gridsettle_tariff::{Currency, TariffConfig, TariffPeriod};
use serde::{Deserialize, Serialize};

/// The priced outcome of exactly one trade record.
///
/// Carries a back-reference (`meter_id`, `timestamp`, `reading_digest`) to
/// its source record for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Source meter.
    pub meter_id: MeterId,
    /// Source reading time.
    pub timestamp: Timestamp,
    /// Source reading digest.
    pub reading_digest: ReadingDigest,
    /// Energy transacted, kWh.
    pub energy_kwh: f64,
    /// Generation-source classification.
    pub carbon_tag: CarbonTag,
    /// Trading parties, if the record named them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
    /// Time-of-day period the reading fell in.
    pub period: TariffPeriod,
    /// Multiplier applied to the base rate for `period`.
    pub period_multiplier: f64,
    /// Currency per kWh after period and carbon adjustments.
    pub effective_rate: f64,
    /// `energy_kwh × effective_rate`.
    pub billed_amount: f64,
    /// `billed_amount` rounded to the currency's minor unit.
    pub billed_minor_units: i64,
    /// Settlement currency.
    pub currency: Currency,
    /// Emissions attributed to this trade, kg CO2.
    pub co2_kg: f64,
    /// Emissions had the energy come from the grid, kg CO2.
    pub baseline_co2_kg: f64,
}

/// Price one record against a tariff.
///
/// # Errors
///
/// - `ConfigError` if the base rate is not positive, or the tariff lacks a
///   carbon factor or price adjustment for the record's tag, or lacks the
///   GRID baseline factor.
/// - `ValidationError` if the energy is negative or non-finite, or the
///   record trades a party with itself.
/// - `SettlementError::ArithmeticOverflow` if the bill or either emissions
///   figure is not finite, or the bill does not fit `i64` minor units.
pub fn price(record: &TradeRecord, tariff: &TariffConfig) -> Result<SettlementResult, SettlementError> {
    tariff.check_base_rate()?;
    record.validate()?;

    let carbon_factor = tariff.carbon_factor(&record.carbon_tag)?;
    let adjustment = tariff.adjustment(&record.carbon_tag)?;
    let baseline_factor = tariff.baseline_factor()?;

    let period = tariff.period_of(&record.timestamp);
    let period_multiplier = tariff.multiplier(period);
    let effective_rate = adjustment.apply(tariff.base_rate * period_multiplier);
    let billed_amount = finite(record.energy_kwh * effective_rate, "billed amount")?;
    let billed_minor_units = tariff.currency.to_minor_units(billed_amount)?;
    let co2_kg = finite(record.energy_kwh * carbon_factor, "emissions")?;
    let baseline_co2_kg = finite(record.energy_kwh * baseline_factor, "baseline emissions")?;

    tracing::trace!(
        meter_id = %record.meter_id,
        timestamp = %record.timestamp,
        %period,
        effective_rate,
        billed_amount,
        "priced reading"
    );

    Ok(SettlementResult {
        meter_id: record.meter_id.clone(),
        timestamp: record.timestamp,
        reading_digest: record.reading_digest(),
        energy_kwh: record.energy_kwh,
        carbon_tag: record.carbon_tag.clone(),
        counterparty: record.counterparty.clone(),
        period,
        period_multiplier,
        effective_rate,
        billed_amount,
        billed_minor_units,
        currency: tariff.currency.clone(),
        co2_kg,
        baseline_co2_kg,
    })
}

fn finite(value: f64, what: &'static str) -> Result<f64, SettlementError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SettlementError::ArithmeticOverflow(what))
    }
}
