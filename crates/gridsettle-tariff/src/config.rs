//! # Tariff Configuration
//!
//! [`TariffConfig`] is loaded once per run and never mutated. Pricing reads
//! it by shared reference, so any number of runs may use one config
//! concurrently.
//!
//! ## Rate composition
//!
//! The effective rate for a reading is computed in a fixed order:
//!
//! 1. `period_rate = base_rate × period_multiplier` (STANDARD is 1.0).
//! 2. The carbon tag's [`CarbonAdjustment`] is applied to `period_rate`:
//!    a discount or premium scales it, a surcharge adds a flat amount per kWh.
//!
//! ## Emissions baseline
//!
//! The GRID emissions factor doubles as the all-grid baseline used for
//! avoided-CO2 accounting, so a config without one is rejected.

use std::collections::BTreeMap;

use gridsettle_core::{CarbonTag, ConfigError, SettlementError, Timestamp};
use serde::{Deserialize, Serialize};

use crate::period::{classify, TariffPeriod, TimeWindow};

/// Maximum number of minor-unit digits a currency may declare.
pub const MAX_CURRENCY_PRECISION: u8 = 6;

/// Settlement currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency {
    /// Currency code (e.g., "INR", "USD").
    pub code: String,
    /// Decimal precision of the minor unit.
    pub precision: u8,
}

impl Currency {
    /// Build a currency.
    pub fn new(code: impl Into<String>, precision: u8) -> Self {
        Self {
            code: code.into(),
            precision,
        }
    }

    /// Round an amount to minor units, half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::ArithmeticOverflow` if the amount is not
    /// finite or its minor-unit value does not fit `i64`.
    pub fn to_minor_units(&self, amount: f64) -> Result<i64, SettlementError> {
        let minor = (amount * 10f64.powi(i32::from(self.precision))).round();
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
        if !minor.is_finite() || minor < i64::MIN as f64 || minor >= i64::MAX as f64 {
            return Err(SettlementError::ArithmeticOverflow("billed minor units"));
        }
        Ok(minor as i64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let code = self.code.trim();
        if code.is_empty() || code.len() > 8 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidCurrency(format!(
                "code {:?} must be 1-8 ASCII alphanumerics",
                self.code
            )));
        }
        if self.precision > MAX_CURRENCY_PRECISION {
            return Err(ConfigError::InvalidCurrency(format!(
                "precision {} exceeds {MAX_CURRENCY_PRECISION}",
                self.precision
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// Price adjustment keyed by carbon tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CarbonAdjustment {
    /// Period rate applies unchanged.
    None,
    /// Period rate reduced by `percent` (0-100).
    Discount {
        /// Reduction, in percent.
        percent: f64,
    },
    /// Period rate increased by `percent`.
    Premium {
        /// Increase, in percent.
        percent: f64,
    },
    /// Flat amount per kWh added to the period rate.
    Surcharge {
        /// Currency per kWh.
        per_kwh: f64,
    },
}

impl CarbonAdjustment {
    /// Apply the adjustment to a period rate.
    pub fn apply(&self, period_rate: f64) -> f64 {
        match *self {
            Self::None => period_rate,
            Self::Discount { percent } => period_rate * (1.0 - percent / 100.0),
            Self::Premium { percent } => period_rate * (1.0 + percent / 100.0),
            Self::Surcharge { per_kwh } => period_rate + per_kwh,
        }
    }

    fn validate(&self, tag: &CarbonTag) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidAdjustment {
            tag: tag.to_string(),
            reason,
        };
        match *self {
            Self::None => Ok(()),
            Self::Discount { percent } if !(0.0..=100.0).contains(&percent) => Err(invalid(
                format!("discount must be within [0, 100] percent, got {percent}"),
            )),
            Self::Premium { percent } if !percent.is_finite() || percent < 0.0 => Err(invalid(
                format!("premium must be finite and non-negative, got {percent}"),
            )),
            Self::Surcharge { per_kwh } if !per_kwh.is_finite() || per_kwh < 0.0 => Err(invalid(
                format!("surcharge must be finite and non-negative, got {per_kwh}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Process-wide tariff for one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TariffConfig {
    /// Settlement currency.
    pub currency: Currency,
    /// Currency per kWh during STANDARD periods.
    pub base_rate: f64,
    /// Multiplier on `base_rate` during PEAK.
    pub peak_multiplier: f64,
    /// Multiplier on `base_rate` during OFF_PEAK.
    pub off_peak_multiplier: f64,
    /// PEAK window in local time.
    #[serde(default = "TimeWindow::default_peak")]
    pub peak_window: TimeWindow,
    /// OFF_PEAK window in local time.
    #[serde(default = "TimeWindow::default_off_peak")]
    pub off_peak_window: TimeWindow,
    /// Offset of local time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Emissions factor, kg CO2 per kWh, per tag.
    pub carbon_factor: BTreeMap<CarbonTag, f64>,
    /// Price adjustment per tag.
    pub carbon_price_adjustment: BTreeMap<CarbonTag, CarbonAdjustment>,
}

impl TariffConfig {
    /// A tariff with default windows, unit multipliers, UTC, and no carbon
    /// entries. Add tags with [`TariffConfig::with_carbon`].
    pub fn new(currency: Currency, base_rate: f64) -> Self {
        Self {
            currency,
            base_rate,
            peak_multiplier: 1.0,
            off_peak_multiplier: 1.0,
            peak_window: TimeWindow::default_peak(),
            off_peak_window: TimeWindow::default_off_peak(),
            utc_offset_minutes: 0,
            carbon_factor: BTreeMap::new(),
            carbon_price_adjustment: BTreeMap::new(),
        }
    }

    /// Set the peak and off-peak multipliers.
    pub fn with_multipliers(mut self, peak: f64, off_peak: f64) -> Self {
        self.peak_multiplier = peak;
        self.off_peak_multiplier = off_peak;
        self
    }

    /// Register an emissions factor and price adjustment for a tag.
    pub fn with_carbon(
        mut self,
        tag: CarbonTag,
        factor: f64,
        adjustment: CarbonAdjustment,
    ) -> Self {
        self.carbon_factor.insert(tag.clone(), factor);
        self.carbon_price_adjustment.insert(tag, adjustment);
        self
    }

    /// Check every invariant pricing relies on.
    ///
    /// Per-tag entries are checked individually; a tag present in one map
    /// but not the other is reported here rather than at pricing time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.currency.validate()?;
        self.check_base_rate()?;
        for (name, value) in [
            ("peak", self.peak_multiplier),
            ("off_peak", self.off_peak_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }
        if self.peak_window.is_empty() {
            return Err(ConfigError::EmptyWindow("peak"));
        }
        if self.off_peak_window.is_empty() {
            return Err(ConfigError::EmptyWindow("off_peak"));
        }
        if self.peak_window.overlaps(&self.off_peak_window) {
            return Err(ConfigError::OverlappingWindows {
                peak: self.peak_window.to_string(),
                off_peak: self.off_peak_window.to_string(),
            });
        }
        if !(-1080..=1080).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_minutes));
        }
        for (tag, &factor) in &self.carbon_factor {
            if !factor.is_finite() || factor < 0.0 {
                return Err(ConfigError::InvalidCarbonFactor {
                    tag: tag.to_string(),
                    value: factor,
                });
            }
            if !self.carbon_price_adjustment.contains_key(tag) {
                return Err(ConfigError::MissingPriceAdjustment(tag.to_string()));
            }
        }
        for (tag, adjustment) in &self.carbon_price_adjustment {
            adjustment.validate(tag)?;
            if !self.carbon_factor.contains_key(tag) {
                return Err(ConfigError::MissingCarbonFactor(tag.to_string()));
            }
        }
        self.baseline_factor()?;
        Ok(())
    }

    /// Fail unless `base_rate` is finite and strictly positive.
    pub fn check_base_rate(&self) -> Result<(), ConfigError> {
        if !self.base_rate.is_finite() || self.base_rate <= 0.0 {
            return Err(ConfigError::NonPositiveBaseRate(self.base_rate));
        }
        Ok(())
    }

    /// Period of a reading taken at `timestamp`, in tariff-local time.
    pub fn period_of(&self, timestamp: &Timestamp) -> TariffPeriod {
        classify(
            timestamp.local_time(self.utc_offset_minutes),
            &self.peak_window,
            &self.off_peak_window,
        )
    }

    /// Multiplier applied to `base_rate` in a period.
    pub fn multiplier(&self, period: TariffPeriod) -> f64 {
        match period {
            TariffPeriod::Peak => self.peak_multiplier,
            TariffPeriod::Standard => 1.0,
            TariffPeriod::OffPeak => self.off_peak_multiplier,
        }
    }

    /// Emissions factor for a tag.
    pub fn carbon_factor(&self, tag: &CarbonTag) -> Result<f64, ConfigError> {
        self.carbon_factor
            .get(tag)
            .copied()
            .ok_or_else(|| ConfigError::MissingCarbonFactor(tag.to_string()))
    }

    /// Price adjustment for a tag.
    pub fn adjustment(&self, tag: &CarbonTag) -> Result<CarbonAdjustment, ConfigError> {
        self.carbon_price_adjustment
            .get(tag)
            .copied()
            .ok_or_else(|| ConfigError::MissingPriceAdjustment(tag.to_string()))
    }

    /// The GRID emissions factor, used as the all-grid baseline.
    pub fn baseline_factor(&self) -> Result<f64, ConfigError> {
        self.carbon_factor
            .get(&CarbonTag::Grid)
            .copied()
            .ok_or(ConfigError::MissingBaselineFactor)
    }

    /// Tags this tariff can price.
    pub fn priced_tags(&self) -> impl Iterator<Item = &CarbonTag> {
        self.carbon_factor
            .keys()
            .filter(|tag| self.carbon_price_adjustment.contains_key(*tag))
    }
}
