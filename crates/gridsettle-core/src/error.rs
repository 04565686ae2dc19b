//! # Error Hierarchy
//!
//! Structured error types for settlement, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! The taxonomy has three recoverable classes:
//!
//! - [`ValidationError`]: a single input record (or call argument) is
//!   malformed or impossible.
//! - [`ConfigError`]: the tariff configuration is missing required keys or
//!   carries values pricing cannot use.
//! - [`InsufficientDataError`]: an aggregate was requested over data that
//!   cannot define it.
//!
//! A failure for one record never poisons its siblings: every operation that
//! returns these errors holds no state, so callers choose whether to skip the
//! record or abort the batch.

use thiserror::Error;

/// Top-level error type for pricing and aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// An input record or argument failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The tariff configuration cannot price the request.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Aggregation was requested over data that cannot define the result.
    #[error("insufficient data: {0}")]
    InsufficientData(#[from] InsufficientDataError),

    /// A fixed-point total does not fit its reporting type.
    #[error("arithmetic overflow computing {0}")]
    ArithmeticOverflow(&'static str),
}

/// Validation errors for trade records and domain primitives.
///
/// Each variant carries the offending input so operators can locate the
/// record in the upstream ledger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Meter identifier is empty, too long, or contains disallowed characters.
    #[error("invalid meter id: \"{0}\" (expected 1-64 chars of [A-Za-z0-9._-])")]
    InvalidMeterId(String),

    /// Party identifier is empty, too long, or contains disallowed characters.
    #[error("invalid party id: \"{0}\" (expected 1-64 chars of [A-Za-z0-9._-])")]
    InvalidPartyId(String),

    /// Carbon tag is empty or contains characters other than letters, digits and `_`.
    #[error("invalid carbon tag: \"{0}\"")]
    InvalidCarbonTag(String),

    /// Energy quantity is negative.
    #[error("negative energy on meter {meter_id}: {energy_kwh} kWh")]
    NegativeEnergy {
        /// Source meter.
        meter_id: String,
        /// The rejected quantity.
        energy_kwh: f64,
    },

    /// Energy quantity is NaN or infinite.
    #[error("non-finite energy on meter {meter_id}")]
    NonFiniteEnergy {
        /// Source meter.
        meter_id: String,
    },

    /// A trade names the same party as seller and buyer.
    #[error("meter {meter_id} records a trade from {party} to itself")]
    SelfTrade {
        /// Source meter.
        meter_id: String,
        /// The party on both sides.
        party: String,
    },

    /// A reading with the same digest was already seen in this batch.
    #[error("duplicate reading from meter {meter_id} at {timestamp} (digest {digest})")]
    DuplicateReading {
        /// Source meter.
        meter_id: String,
        /// Reading timestamp, ISO 8601.
        timestamp: String,
        /// The repeated reading digest.
        digest: String,
    },

    /// Timestamp is not a valid RFC 3339 string or epoch value.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Percentile rank is outside `[0, 100]` or not finite.
    #[error("percentile must be within [0, 100], got {0}")]
    InvalidPercentile(f64),

    /// Settlement cycle length is outside `1..=1440` minutes.
    #[error("settlement cycle must be 1-1440 minutes, got {0}")]
    InvalidCycle(u32),
}

/// Tariff configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Base rate is zero, negative, or not finite.
    #[error("base rate must be positive, got {0}")]
    NonPositiveBaseRate(f64),

    /// A period multiplier is negative or not finite.
    #[error("{name} multiplier must be finite and non-negative, got {value}")]
    InvalidMultiplier {
        /// Which multiplier (`peak` or `off_peak`).
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// No emissions factor is configured for a carbon tag.
    #[error("no carbon factor configured for tag {0}")]
    MissingCarbonFactor(String),

    /// No price adjustment is configured for a carbon tag.
    #[error("no carbon price adjustment configured for tag {0}")]
    MissingPriceAdjustment(String),

    /// The GRID emissions factor, used as the all-grid baseline, is absent.
    #[error("carbon factor for GRID is required as the emissions baseline")]
    MissingBaselineFactor,

    /// An emissions factor is negative or not finite.
    #[error("carbon factor for {tag} must be finite and non-negative, got {value}")]
    InvalidCarbonFactor {
        /// The carbon tag.
        tag: String,
        /// The rejected factor.
        value: f64,
    },

    /// A price adjustment would produce a negative or non-finite rate.
    #[error("invalid price adjustment for {tag}: {reason}")]
    InvalidAdjustment {
        /// The carbon tag.
        tag: String,
        /// Why the adjustment was rejected.
        reason: String,
    },

    /// A time-of-day window starts and ends at the same instant.
    #[error("{0} window is empty (start equals end)")]
    EmptyWindow(&'static str),

    /// Peak and off-peak windows share at least one minute.
    #[error("peak window {peak} overlaps off-peak window {off_peak}")]
    OverlappingWindows {
        /// Peak window, `HH:MM-HH:MM`.
        peak: String,
        /// Off-peak window, `HH:MM-HH:MM`.
        off_peak: String,
    },

    /// Currency code is empty or precision is out of range.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// UTC offset lies outside ±18 hours.
    #[error("utc offset must be within ±1080 minutes, got {0}")]
    InvalidUtcOffset(i32),
}

/// Errors raised when an aggregate cannot be defined over its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsufficientDataError {
    /// Aggregation over an empty settlement result set.
    #[error("no settlement results to aggregate")]
    NoSettlementResults,

    /// Percentile over an empty latency sample.
    #[error("no latency samples to rank")]
    NoLatencySamples,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_wraps_into_settlement_error() {
        let err: SettlementError = ValidationError::InvalidPercentile(120.0).into();
        assert!(matches!(err, SettlementError::Validation(_)));
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn config_error_names_missing_tag() {
        let err = ConfigError::MissingCarbonFactor("WIND".to_string());
        assert_eq!(err.to_string(), "no carbon factor configured for tag WIND");
    }

    #[test]
    fn insufficient_data_display() {
        let err: SettlementError = InsufficientDataError::NoSettlementResults.into();
        assert_eq!(
            err.to_string(),
            "insufficient data: no settlement results to aggregate"
        );
    }
}
