//! # Batch Pricing
//!
//! Prices a ledger of records under one tariff. Each record is priced
//! independently, so a bad record never mis-prices or drops its siblings.
//! The caller's [`BatchPolicy`] decides whether the first failure aborts the
//! batch or is collected as a [`Rejection`].
//!
//! Readings are replay-checked within the batch: a record whose reading
//! digest was already seen is rejected as a duplicate.

use std::collections::BTreeSet;

use gridsettle_core::{
    MeterId, ReadingDigest, SettlementError, Timestamp, TradeRecord, ValidationError,
};
use gridsettle_tariff::TariffConfig;
use serde::{Deserialize, Serialize};

use crate::pricing::{price, SettlementResult};

/// How a batch treats records that fail to price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Collect failures and keep pricing the rest.
    #[default]
    SkipInvalid,
    /// Stop at the first failure and return it.
    FailFast,
}

/// A record that could not be priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Position of the record in the input ledger.
    pub index: usize,
    /// Source meter.
    pub meter_id: MeterId,
    /// Source reading time.
    pub timestamp: Timestamp,
    /// Rendered error.
    pub reason: String,
    /// The structured error.
    #[serde(skip)]
    pub error: Option<SettlementError>,
}

/// Result of pricing a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Successfully priced records, in input order.
    pub results: Vec<SettlementResult>,
    /// Records that failed, in input order.
    pub rejected: Vec<Rejection>,
}

impl BatchOutcome {
    /// True when every record priced.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Price every record in `records`.
///
/// # Errors
///
/// Under [`BatchPolicy::FailFast`], returns the first record's error.
/// Under [`BatchPolicy::SkipInvalid`], never fails; failures land in
/// [`BatchOutcome::rejected`].
pub fn price_batch(
    records: &[TradeRecord],
    tariff: &TariffConfig,
    policy: BatchPolicy,
) -> Result<BatchOutcome, SettlementError> {
    let mut outcome = BatchOutcome {
        results: Vec::with_capacity(records.len()),
        rejected: Vec::new(),
    };
    let mut seen = BTreeSet::new();

    for (index, record) in records.iter().enumerate() {
        let priced = check_replay(record, &mut seen).and_then(|()| price(record, tariff));
        match priced {
            Ok(result) => outcome.results.push(result),
            Err(error) => {
                tracing::warn!(
                    index,
                    meter_id = %record.meter_id,
                    timestamp = %record.timestamp,
                    error = %error,
                    "rejected trade record"
                );
                if policy == BatchPolicy::FailFast {
                    return Err(error);
                }
                outcome.rejected.push(Rejection {
                    index,
                    meter_id: record.meter_id.clone(),
                    timestamp: record.timestamp,
                    reason: error.to_string(),
                    error: Some(error),
                });
            }
        }
    }

    tracing::debug!(
        priced = outcome.results.len(),
        rejected = outcome.rejected.len(),
        "priced batch"
    );
    Ok(outcome)
}

fn check_replay(
    record: &TradeRecord,
    seen: &mut BTreeSet<ReadingDigest>,
) -> Result<(), SettlementError> {
    let digest = record.reading_digest();
    if !seen.insert(digest) {
        return Err(ValidationError::DuplicateReading {
            meter_id: record.meter_id.to_string(),
            timestamp: record.timestamp.to_iso8601(),
            digest: digest.to_hex(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsettle_core::{CarbonTag, ConfigError};
    use gridsettle_tariff::{CarbonAdjustment, Currency};

    fn tariff() -> TariffConfig {
        TariffConfig::new(Currency::new("INR", 2), 6.79)
            .with_carbon(
                CarbonTag::Solar,
                0.05,
                CarbonAdjustment::Discount { percent: 15.0 },
            )
            .with_carbon(CarbonTag::Grid, 0.82, CarbonAdjustment::None)
    }

    fn record(meter: &str, energy: f64, tag: CarbonTag, ts: &str) -> TradeRecord {
        TradeRecord::new(
            MeterId::new(meter).unwrap(),
            energy,
            tag,
            Timestamp::parse(ts).unwrap(),
        )
    }

    fn ledger() -> Vec<TradeRecord> {
        vec![
            record("SOLAR-1", 3.0, CarbonTag::Solar, "2026-01-22T10:00:00Z"),
            record("WIND-1", 2.0, CarbonTag::Other("WIND".into()), "2026-01-22T10:00:00Z"),
            record("LAB-1", -1.0, CarbonTag::Grid, "2026-01-22T10:00:00Z"),
            record("LAB-2", 5.0, CarbonTag::Grid, "2026-01-22T19:00:00Z"),
        ]
    }

    #[test]
    fn skip_invalid_keeps_siblings() {
        let outcome = price_batch(&ledger(), &tariff(), BatchPolicy::SkipInvalid).unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].meter_id.as_str(), "SOLAR-1");
        assert_eq!(outcome.results[1].meter_id.as_str(), "LAB-2");
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].index, 1);
        assert!(matches!(
            outcome.rejected[0].error,
            Some(SettlementError::Config(ConfigError::MissingCarbonFactor(_)))
        ));
        assert_eq!(outcome.rejected[1].index, 2);
        assert!(!outcome.is_clean());
    }

    #[test]
    fn sibling_prices_match_individual_pricing() {
        let t = tariff();
        let records = ledger();
        let outcome = price_batch(&records, &t, BatchPolicy::SkipInvalid).unwrap();
        assert_eq!(outcome.results[1], price(&records[3], &t).unwrap());
    }

    #[test]
    fn fail_fast_returns_first_error() {
        let err = price_batch(&ledger(), &tariff(), BatchPolicy::FailFast).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Config(ConfigError::MissingCarbonFactor(_))
        ));
    }

    #[test]
    fn replayed_reading_rejected() {
        let r = record("SOLAR-1", 3.0, CarbonTag::Solar, "2026-01-22T10:00:00Z");
        let outcome =
            price_batch(&[r.clone(), r], &tariff(), BatchPolicy::SkipInvalid).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(matches!(
            outcome.rejected[0].error,
            Some(SettlementError::Validation(
                ValidationError::DuplicateReading { .. }
            ))
        ));
    }

    #[test]
    fn empty_ledger_is_clean() {
        let outcome = price_batch(&[], &tariff(), BatchPolicy::FailFast).unwrap();
        assert!(outcome.is_clean());
        assert!(outcome.results.is_empty());
    }
}
