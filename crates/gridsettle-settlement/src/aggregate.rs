//! # Settlement Aggregation
//!
//! Folds priced trades into one [`AggregateReport`]: energy and carbon
//! totals, renewable share, per-period energy, per-currency billing, netting
//! efficiency and latency percentiles.
//!
//! ## Exact merging
//!
//! Sums are held as fixed-point integers (micro-kWh, milligrams of CO2,
//! minor currency units) inside a [`PartialAggregate`]. Integer addition is
//! associative and commutative, so partials built over disjoint batches merge
//! to exactly the same report regardless of batch boundaries or order. Floats
//! appear only when the report is rendered. A value or total that leaves the
//! fixed-point range is reported as `SettlementError::ArithmeticOverflow`.
//!
//! ## Replays
//!
//! Each result's reading digest may appear once across all merged partials.
//! A repeat is a `ValidationError::DuplicateReading`, the same verdict
//! [`price_batch`](crate::price_batch) gives, so a report never counts a
//! reading the netting plan for the same input would drop.
//!
//! ## Parallelism
//!
//! With the `parallel` feature, [`Aggregator::aggregate_parallel`] splits
//! results into chunks, builds partials on the rayon pool and reduces them.
//! Its output equals [`Aggregator::aggregate`] on the same input.

use std::collections::BTreeMap;

use gridsettle_core::{
    InsufficientDataError, MeterId, ReadingDigest, SettlementError, Timestamp, ValidationError,
};
use gridsettle_tariff::TariffPeriod;
use serde::{Deserialize, Serialize};

use crate::netting::{NettingBook, NettingMode, NettingSummary, Obligation, SettlementCycle};
use crate::percentile::LatencyPercentiles;
use crate::pricing::SettlementResult;

const MICRO: f64 = 1_000_000.0;

fn to_micro(value: f64, what: &'static str) -> Result<i128, SettlementError> {
    let micro = (value * MICRO).round();
    // i128::MAX as f64 rounds up to 2^127, which is itself out of range.
    if !micro.is_finite() || micro < i128::MIN as f64 || micro >= i128::MAX as f64 {
        return Err(SettlementError::ArithmeticOverflow(what));
    }
    Ok(micro as i128)
}

fn add(total: &mut i128, value: i128, what: &'static str) -> Result<(), SettlementError> {
    *total = total
        .checked_add(value)
        .ok_or(SettlementError::ArithmeticOverflow(what))?;
    Ok(())
}

fn from_micro(value: i128) -> f64 {
    value as f64 / MICRO
}

/// Summary statistics over a set of settlement results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Number of results aggregated.
    pub record_count: usize,
    /// Total energy, kWh.
    pub total_energy_kwh: f64,
    /// Energy from renewable tags, kWh.
    pub renewable_energy_kwh: f64,
    /// `renewable / total × 100`; 0 when total energy is 0.
    pub renewable_share_pct: f64,
    /// Emissions attributed to the traded energy, kg CO2.
    pub co2_kg: f64,
    /// Emissions had all energy come from the grid, kg CO2.
    pub baseline_co2_kg: f64,
    /// `baseline_co2_kg − co2_kg`.
    pub co2_avoided_kg: f64,
    /// Energy per pricing period, kWh.
    pub energy_by_period: BTreeMap<TariffPeriod, f64>,
    /// Billed total per currency, minor units.
    pub billed_totals: BTreeMap<String, i64>,
    /// Netting volumes and efficiency.
    pub netting: NettingSummary,
    /// Same as `netting.efficiency_pct`.
    pub netting_efficiency_pct: f64,
    /// Latency percentiles; `None` when no samples were supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyPercentiles>,
}

/// Mergeable intermediate state of an aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialAggregate {
    record_count: usize,
    energy_micro_kwh: i128,
    renewable_micro_kwh: i128,
    co2_mg: i128,
    baseline_co2_mg: i128,
    energy_by_period: BTreeMap<TariffPeriod, i128>,
    billed_minor: BTreeMap<String, i128>,
    readings: BTreeMap<ReadingDigest, (MeterId, Timestamp)>,
    book: NettingBook,
}

impl PartialAggregate {
    /// Accumulate `results`, bucketing netting flows into `cycle`.
    ///
    /// # Errors
    ///
    /// - `ValidationError::DuplicateReading` if two results share a reading digest.
    /// - `SettlementError::ArithmeticOverflow` if a value or running total
    ///   leaves the fixed-point range.
    pub fn from_results(
        results: &[SettlementResult],
        cycle: SettlementCycle,
    ) -> Result<Self, SettlementError> {
        let mut partial = Self::default();
        for result in results {
            partial.push(result, cycle)?;
        }
        Ok(partial)
    }

    fn push(
        &mut self,
        result: &SettlementResult,
        cycle: SettlementCycle,
    ) -> Result<(), SettlementError> {
        let energy = to_micro(result.energy_kwh, "energy total")?;
        let co2 = to_micro(result.co2_kg, "emissions total")?;
        let baseline = to_micro(result.baseline_co2_kg, "baseline emissions total")?;
        self.claim(result.reading_digest, &result.meter_id, result.timestamp)?;

        self.record_count += 1;
        add(&mut self.energy_micro_kwh, energy, "energy total")?;
        if result.carbon_tag.is_renewable() {
            add(&mut self.renewable_micro_kwh, energy, "renewable energy total")?;
        }
        add(&mut self.co2_mg, co2, "emissions total")?;
        add(&mut self.baseline_co2_mg, baseline, "baseline emissions total")?;
        add(
            self.energy_by_period.entry(result.period).or_default(),
            energy,
            "period energy total",
        )?;
        add(
            self.billed_minor
                .entry(result.currency.code.clone())
                .or_default(),
            i128::from(result.billed_minor_units),
            "billed total",
        )?;
        if let Some(obligation) = Obligation::from_result(result, cycle) {
            self.book.record(&obligation);
        }
        Ok(())
    }

    fn claim(
        &mut self,
        digest: ReadingDigest,
        meter_id: &MeterId,
        timestamp: Timestamp,
    ) -> Result<(), SettlementError> {
        if self.readings.contains_key(&digest) {
            return Err(ValidationError::DuplicateReading {
                meter_id: meter_id.to_string(),
                timestamp: timestamp.to_iso8601(),
                digest: digest.to_hex(),
            }
            .into());
        }
        self.readings.insert(digest, (meter_id.clone(), timestamp));
        Ok(())
    }

    /// Number of results accumulated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Combine two partials.
    ///
    /// # Errors
    ///
    /// Same as [`PartialAggregate::from_results`], applied across both sides.
    pub fn merge(mut self, other: PartialAggregate) -> Result<Self, SettlementError> {
        for (digest, (meter_id, timestamp)) in other.readings {
            self.claim(digest, &meter_id, timestamp)?;
        }
        self.record_count += other.record_count;
        add(&mut self.energy_micro_kwh, other.energy_micro_kwh, "energy total")?;
        add(
            &mut self.renewable_micro_kwh,
            other.renewable_micro_kwh,
            "renewable energy total",
        )?;
        add(&mut self.co2_mg, other.co2_mg, "emissions total")?;
        add(
            &mut self.baseline_co2_mg,
            other.baseline_co2_mg,
            "baseline emissions total",
        )?;
        for (period, energy) in other.energy_by_period {
            add(
                self.energy_by_period.entry(period).or_default(),
                energy,
                "period energy total",
            )?;
        }
        for (currency, billed) in other.billed_minor {
            add(self.billed_minor.entry(currency).or_default(), billed, "billed total")?;
        }
        self.book.merge(other.book);
        Ok(self)
    }

    /// Render the final report.
    ///
    /// # Errors
    ///
    /// - `InsufficientDataError::NoSettlementResults` if nothing was accumulated.
    /// - `SettlementError::ArithmeticOverflow` if a billed or netting total
    ///   exceeds `i64`.
    pub fn finish(
        self,
        latencies: &[u64],
        mode: NettingMode,
        cycle: SettlementCycle,
    ) -> Result<AggregateReport, SettlementError> {
        if self.record_count == 0 {
            return Err(InsufficientDataError::NoSettlementResults.into());
        }

        let latency = if latencies.is_empty() {
            None
        } else {
            Some(LatencyPercentiles::from_unsorted(latencies)?)
        };

        let netting = self
            .book
            .summarize(mode, cycle)
            .map_err(|_| SettlementError::ArithmeticOverflow("netting volume"))?;

        let billed_totals = self
            .billed_minor
            .into_iter()
            .map(|(currency, total)| {
                i64::try_from(total)
                    .map(|t| (currency, t))
                    .map_err(|_| SettlementError::ArithmeticOverflow("billed total"))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let renewable_share_pct = if self.energy_micro_kwh > 0 {
            self.renewable_micro_kwh as f64 / self.energy_micro_kwh as f64 * 100.0
        } else {
            0.0
        };

        let report = AggregateReport {
            record_count: self.record_count,
            total_energy_kwh: from_micro(self.energy_micro_kwh),
            renewable_energy_kwh: from_micro(self.renewable_micro_kwh),
            renewable_share_pct,
            co2_kg: from_micro(self.co2_mg),
            baseline_co2_kg: from_micro(self.baseline_co2_mg),
            co2_avoided_kg: from_micro(
                self.baseline_co2_mg
                    .checked_sub(self.co2_mg)
                    .ok_or(SettlementError::ArithmeticOverflow("avoided emissions"))?,
            ),
            energy_by_period: self
                .energy_by_period
                .into_iter()
                .map(|(period, energy)| (period, from_micro(energy)))
                .collect(),
            billed_totals,
            netting_efficiency_pct: netting.efficiency_pct,
            netting,
            latency,
        };

        tracing::debug!(
            records = report.record_count,
            total_energy_kwh = report.total_energy_kwh,
            renewable_share_pct = report.renewable_share_pct,
            netting_efficiency_pct = report.netting_efficiency_pct,
            "aggregated settlement results"
        );
        Ok(report)
    }
}

/// Aggregation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregator {
    /// Window within which opposing flows net.
    pub cycle: SettlementCycle,
    /// How opposing flows are offset.
    pub mode: NettingMode,
}

impl Aggregator {
    pub fn new(cycle: SettlementCycle, mode: NettingMode) -> Self {
        Self { cycle, mode }
    }

    /// Partial over one batch of results.
    pub fn partial(
        &self,
        results: &[SettlementResult],
    ) -> Result<PartialAggregate, SettlementError> {
        PartialAggregate::from_results(results, self.cycle)
    }

    /// Aggregate `results` and rank `latencies`.
    ///
    /// Neither input order affects the output.
    pub fn aggregate(
        &self,
        results: &[SettlementResult],
        latencies: &[u64],
    ) -> Result<AggregateReport, SettlementError> {
        self.partial(results)?.finish(latencies, self.mode, self.cycle)
    }

    /// [`Aggregator::aggregate`] over `batch_size` chunks on the rayon pool.
    #[cfg(feature = "parallel")]
    pub fn aggregate_parallel(
        &self,
        results: &[SettlementResult],
        latencies: &[u64],
        batch_size: usize,
    ) -> Result<AggregateReport, SettlementError> {
        use rayon::prelude::*;

        let partial = results
            .par_chunks(batch_size.max(1))
            .map(|chunk| self.partial(chunk))
            .try_reduce(PartialAggregate::default, PartialAggregate::merge)?;
        partial.finish(latencies, self.mode, self.cycle)
    }
}

/// Aggregate with a 60-minute bilateral netting cycle.
pub fn aggregate(
    results: &[SettlementResult],
    latencies: &[u64],
) -> Result<AggregateReport, SettlementError> {
    Aggregator::default().aggregate(results, latencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::price;
    use gridsettle_core::{CarbonTag, MeterId, PartyId, Timestamp, TradeRecord};
    use gridsettle_tariff::{CarbonAdjustment, Currency, TariffConfig};
    use proptest::prelude::*;

    fn tariff() -> TariffConfig {
        TariffConfig::new(Currency::new("INR", 2), 1.0)
            .with_carbon(CarbonTag::Solar, 0.05, CarbonAdjustment::None)
            .with_carbon(CarbonTag::Grid, 0.82, CarbonAdjustment::None)
            .with_carbon(CarbonTag::Battery, 0.12, CarbonAdjustment::None)
    }

    fn priced(meter: &str, energy: f64, tag: CarbonTag, ts: &str) -> SettlementResult {
        let r = TradeRecord::new(
            MeterId::new(meter).unwrap(),
            energy,
            tag,
            Timestamp::parse(ts).unwrap(),
        );
        price(&r, &tariff()).unwrap()
    }

    fn traded(meter: &str, energy: f64, seller: &str, buyer: &str, ts: &str) -> SettlementResult {
        let r = TradeRecord::new(
            MeterId::new(meter).unwrap(),
            energy,
            CarbonTag::Grid,
            Timestamp::parse(ts).unwrap(),
        )
        .with_counterparty(PartyId::new(seller).unwrap(), PartyId::new(buyer).unwrap());
        price(&r, &tariff()).unwrap()
    }

    #[test]
    fn empty_results_are_insufficient() {
        assert_eq!(
            aggregate(&[], &[]),
            Err(SettlementError::InsufficientData(
                InsufficientDataError::NoSettlementResults
            ))
        );
    }

    #[test]
    fn renewable_share_and_avoided_carbon() {
        let results = vec![
            priced("S-1", 3.0, CarbonTag::Solar, "2026-01-22T10:00:00Z"),
            priced("B-1", 1.0, CarbonTag::Battery, "2026-01-22T19:00:00Z"),
            priced("G-1", 4.0, CarbonTag::Grid, "2026-01-22T03:00:00Z"),
        ];
        let report = aggregate(&results, &[]).unwrap();
        assert_eq!(report.record_count, 3);
        assert!((report.total_energy_kwh - 8.0).abs() < 1e-9);
        assert!((report.renewable_share_pct - 50.0).abs() < 1e-9);
        assert!((report.co2_kg - (0.15 + 0.12 + 3.28)).abs() < 1e-9);
        assert!((report.baseline_co2_kg - 6.56).abs() < 1e-9);
        assert!((report.co2_avoided_kg - 3.01).abs() < 1e-9);
        assert_eq!(report.energy_by_period[&TariffPeriod::Peak], 1.0);
        assert_eq!(report.energy_by_period[&TariffPeriod::OffPeak], 4.0);
        assert_eq!(report.billed_totals["INR"], 800);
        assert!(report.latency.is_none());
    }

    #[test]
    fn zero_energy_gives_zero_share() {
        let results = vec![priced("S-1", 0.0, CarbonTag::Solar, "2026-01-22T10:00:00Z")];
        let report = aggregate(&results, &[100]).unwrap();
        assert_eq!(report.renewable_share_pct, 0.0);
        assert_eq!(report.netting_efficiency_pct, 0.0);
        assert_eq!(report.latency.unwrap().p50_ms, 100);
    }

    #[test]
    fn bilateral_flows_net_within_cycle() {
        let results = vec![
            traded("M-1", 1.0, "A", "B", "2026-01-22T10:05:00Z"),
            traded("M-2", 0.6, "B", "A", "2026-01-22T10:40:00Z"),
        ];
        let report = aggregate(&results, &[]).unwrap();
        assert_eq!(report.netting.gross_volume, 160);
        assert_eq!(report.netting.net_volume, 40);
        assert_eq!(report.netting.leg_count, 1);
        assert!((report.netting_efficiency_pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn shorter_cycle_separates_flows() {
        let results = vec![
            traded("M-1", 1.0, "A", "B", "2026-01-22T10:05:00Z"),
            traded("M-2", 0.6, "B", "A", "2026-01-22T10:40:00Z"),
        ];
        let agg = Aggregator::new(SettlementCycle::new(15).unwrap(), NettingMode::Bilateral);
        let report = agg.aggregate(&results, &[]).unwrap();
        assert_eq!(report.netting.net_volume, 160);
        assert_eq!(report.netting.cycle_minutes, 15);
        assert_eq!(report.netting_efficiency_pct, 0.0);
    }

    #[test]
    fn latencies_are_ranked() {
        let results = vec![priced("S-1", 1.0, CarbonTag::Solar, "2026-01-22T10:00:00Z")];
        let report = aggregate(&results, &[400, 100, 300, 200]).unwrap();
        let latency = report.latency.unwrap();
        assert_eq!((latency.p50_ms, latency.p95_ms), (200, 400));
    }

    #[test]
    fn split_merge_matches_whole() {
        let results = vec![
            priced("S-1", 3.0, CarbonTag::Solar, "2026-01-22T10:00:00Z"),
            traded("M-1", 1.0, "A", "B", "2026-01-22T10:05:00Z"),
            traded("M-2", 0.6, "B", "A", "2026-01-22T10:40:00Z"),
        ];
        let cycle = SettlementCycle::default();
        let whole = PartialAggregate::from_results(&results, cycle).unwrap();
        let split = PartialAggregate::from_results(&results[2..], cycle)
            .unwrap()
            .merge(PartialAggregate::from_results(&results[..2], cycle).unwrap())
            .unwrap();
        assert_eq!(whole, split);
    }

    #[test]
    fn totals_beyond_fixed_point_range_are_errors() {
        // Each energy fits, their sum does not.
        let mut a = priced("G-1", 1.0, CarbonTag::Grid, "2026-01-22T10:00:00Z");
        let mut b = priced("G-2", 1.0, CarbonTag::Grid, "2026-01-22T11:00:00Z");
        a.energy_kwh = 1e32;
        b.energy_kwh = 1e32;
        assert_eq!(
            aggregate(&[a.clone(), b.clone()], &[]),
            Err(SettlementError::ArithmeticOverflow("energy total"))
        );

        let cycle = SettlementCycle::default();
        let left = PartialAggregate::from_results(&[a.clone()], cycle).unwrap();
        let right = PartialAggregate::from_results(&[b], cycle).unwrap();
        assert_eq!(
            left.merge(right),
            Err(SettlementError::ArithmeticOverflow("energy total"))
        );

        a.energy_kwh = 1e300;
        assert_eq!(
            aggregate(&[a.clone()], &[]),
            Err(SettlementError::ArithmeticOverflow("energy total"))
        );
        a.energy_kwh = f64::INFINITY;
        assert_eq!(
            aggregate(&[a], &[]),
            Err(SettlementError::ArithmeticOverflow("energy total"))
        );
    }

    #[test]
    fn repeated_reading_is_rejected_in_batch_and_across_merges() {
        let trade = traded("M-1", 1.0, "A", "B", "2026-01-22T10:05:00Z");
        assert!(matches!(
            aggregate(&[trade.clone(), trade.clone()], &[]),
            Err(SettlementError::Validation(ValidationError::DuplicateReading { .. }))
        ));

        let cycle = SettlementCycle::default();
        let left = PartialAggregate::from_results(&[trade.clone()], cycle).unwrap();
        let right = PartialAggregate::from_results(&[trade], cycle).unwrap();
        assert!(matches!(
            left.merge(right),
            Err(SettlementError::Validation(ValidationError::DuplicateReading { .. }))
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential() {
        let results: Vec<_> = (0..50)
            .map(|i| {
                traded(
                    &format!("M-{i}"),
                    f64::from(i) * 0.25,
                    if i % 2 == 0 { "A" } else { "B" },
                    if i % 2 == 0 { "B" } else { "A" },
                    "2026-01-22T10:00:00Z",
                )
            })
            .collect();
        let agg = Aggregator::default();
        let sequential = agg.aggregate(&results, &[5, 1, 3]).unwrap();
        for batch in [0, 1, 7, 64] {
            assert_eq!(
                agg.aggregate_parallel(&results, &[5, 1, 3], batch).unwrap(),
                sequential
            );
        }
    }

    fn arb_result() -> impl Strategy<Value = SettlementResult> {
        (
            0u32..50_000,
            0i64..172_800,
            0usize..3,
            prop::option::of(prop::bool::ANY),
        )
            .prop_map(|(milli_kwh, offset, tag, direction)| {
                let tag = [CarbonTag::Solar, CarbonTag::Grid, CarbonTag::Battery][tag].clone();
                let mut r = TradeRecord::new(
                    MeterId::new("M-1").unwrap(),
                    f64::from(milli_kwh) / 1000.0,
                    tag,
                    Timestamp::from_epoch_secs(1_769_040_000 + offset).unwrap(),
                );
                if let Some(forward) = direction {
                    let (a, b) = (PartyId::new("A").unwrap(), PartyId::new("B").unwrap());
                    r = if forward {
                        r.with_counterparty(a, b)
                    } else {
                        r.with_counterparty(b, a)
                    };
                }
                price(&r, &tariff()).unwrap()
            })
    }

    proptest! {
        #[test]
        fn aggregate_is_order_independent(
            (original, shuffled) in prop::collection::vec(arb_result(), 1..40)
                .prop_map(|mut v| {
                    let mut seen = std::collections::BTreeSet::new();
                    v.retain(|r| seen.insert(r.reading_digest));
                    v
                })
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
            latencies in prop::collection::vec(0u64..5_000, 0..20),
        ) {
            let mut reversed = latencies.clone();
            reversed.reverse();
            for mode in [NettingMode::Bilateral, NettingMode::Multilateral] {
                let agg = Aggregator::new(SettlementCycle::default(), mode);
                let a = agg.aggregate(&original, &latencies).unwrap();
                let b = agg.aggregate(&shuffled, &reversed).unwrap();
                prop_assert_eq!(a, b);
            }
        }
    }
}
