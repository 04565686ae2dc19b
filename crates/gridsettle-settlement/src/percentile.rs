//! Nearest-rank latency percentiles.
//!
//! Percentiles select an existing sample; there is no interpolation. For
//! `n` sorted samples the rank-`p` element sits at index
//! `ceil(p × n / 100) − 1`, clamped to `[0, n − 1]`.

use gridsettle_core::{InsufficientDataError, SettlementError, ValidationError};
use serde::{Deserialize, Serialize};

/// Nearest-rank percentile of an ascending slice of samples.
///
/// # Errors
///
/// - `ValidationError::InvalidPercentile` if `p` is not finite or outside `[0, 100]`.
/// - `InsufficientDataError::NoLatencySamples` if `sorted` is empty.
pub fn percentile(sorted: &[u64], p: f64) -> Result<u64, SettlementError> {
    if !p.is_finite() || !(0.0..=100.0).contains(&p) {
        return Err(ValidationError::InvalidPercentile(p).into());
    }
    let n = sorted.len();
    if n == 0 {
        return Err(InsufficientDataError::NoLatencySamples.into());
    }
    let rank = (p * n as f64 / 100.0).ceil() as usize;
    let index = rank.saturating_sub(1).min(n - 1);
    Ok(sorted[index])
}

/// Headline settlement-completion latencies, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    /// Number of samples ranked.
    pub samples: usize,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

impl LatencyPercentiles {
    /// Rank samples given in any order.
    pub fn from_unsorted(samples: &[u64]) -> Result<Self, SettlementError> {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        Self::from_sorted(&sorted)
    }

    /// Rank samples already in ascending order.
    pub fn from_sorted(sorted: &[u64]) -> Result<Self, SettlementError> {
        Ok(Self {
            samples: sorted.len(),
            p50_ms: percentile(sorted, 50.0)?,
            p95_ms: percentile(sorted, 95.0)?,
            p99_ms: percentile(sorted, 99.0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn four_sample_ranks() {
        let s = [100, 200, 300, 400];
        assert_eq!(percentile(&s, 50.0).unwrap(), 200);
        assert_eq!(percentile(&s, 95.0).unwrap(), 400);
        assert_eq!(percentile(&s, 25.0).unwrap(), 100);
        assert_eq!(percentile(&s, 26.0).unwrap(), 200);
    }

    #[test]
    fn extremes_clamp() {
        let s = [7, 9, 11];
        assert_eq!(percentile(&s, 0.0).unwrap(), 7);
        assert_eq!(percentile(&s, 100.0).unwrap(), 11);
    }

    #[test]
    fn single_sample() {
        assert_eq!(percentile(&[42], 99.0).unwrap(), 42);
    }

    #[test]
    fn empty_is_insufficient() {
        assert_eq!(
            percentile(&[], 50.0),
            Err(SettlementError::InsufficientData(
                InsufficientDataError::NoLatencySamples
            ))
        );
    }

    #[test]
    fn out_of_range_rank_rejected() {
        for p in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                percentile(&[1, 2], p),
                Err(SettlementError::Validation(ValidationError::InvalidPercentile(_)))
            ));
        }
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let l = LatencyPercentiles::from_unsorted(&[400, 100, 300, 200]).unwrap();
        assert_eq!(l.samples, 4);
        assert_eq!(l.p50_ms, 200);
        assert_eq!(l.p95_ms, 400);
        assert_eq!(l.p99_ms, 400);
    }

    proptest! {
        #[test]
        fn result_is_a_sample(mut samples in prop::collection::vec(0u64..10_000, 1..200), p in 0.0f64..=100.0) {
            samples.sort_unstable();
            let v = percentile(&samples, p).unwrap();
            prop_assert!(samples.contains(&v));
        }

        #[test]
        fn monotone_in_rank(mut samples in prop::collection::vec(0u64..10_000, 1..200)) {
            samples.sort_unstable();
            let l = LatencyPercentiles::from_sorted(&samples).unwrap();
            prop_assert!(l.p50_ms <= l.p95_ms);
            prop_assert!(l.p95_ms <= l.p99_ms);
        }
    }
}
