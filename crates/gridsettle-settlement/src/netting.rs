//! # Settlement Netting Engine
//!
//! Compresses the payment flows implied by priced trades into net
//! settlement legs, and measures how much gross volume netting removed.
//!
//! ## Design
//!
//! Every priced trade with a counterparty becomes an [`Obligation`]: the
//! buyer owes the seller the billed amount, in minor currency units, within
//! the [`SettlementCycle`] containing the reading. Obligations accumulate in
//! a [`NettingBook`] keyed by `(currency, cycle, unordered party pair)`.
//!
//! Two netting modes read the same book:
//!
//! 1. **Bilateral**: opposing flows between the same two parties in the
//!    same cycle offset each other; one leg settles the difference.
//! 2. **Multilateral**: per currency and cycle, every party's receivables
//!    offset its payables, and net payers are greedily matched to net
//!    receivers.
//!
//! Netting efficiency is `(1 − net / gross) × 100`, and 0 when there is no
//! gross volume.
//!
//! ## Determinism
//!
//! All state lives in `BTreeMap`s keyed by currency, cycle start and party
//! id, so legs come out in a stable order and two runs over the same
//! obligations produce byte-identical output regardless of input order.
//!
//! ## Mergeability
//!
//! Books only hold sums, so [`NettingBook::merge`] is associative and
//! commutative. Disjoint batches may build books independently.

use std::collections::{BTreeMap, BTreeSet};

use gridsettle_core::{PartyId, ReadingDigest, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::SettlementResult;

/// Errors from netting operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NettingError {
    /// No obligations to net.
    #[error("no obligations provided")]
    NoObligations,

    /// Obligation amount is non-positive.
    #[error("obligation amount must be positive: got {amount} for {from_party} -> {to_party}")]
    InvalidAmount {
        /// The paying party.
        from_party: String,
        /// The receiving party.
        to_party: String,
        /// The invalid amount.
        amount: i64,
    },

    /// An obligation from the same source reading was already added.
    #[error("duplicate obligation for reading {digest}")]
    DuplicateObligation {
        /// The source reading digest.
        digest: String,
    },

    /// Obligation parties are identical.
    #[error("invalid obligation parties: {reason}")]
    InvalidParties {
        /// Reason for rejection.
        reason: String,
    },

    /// Currency code is empty.
    #[error("invalid currency code: must be non-empty")]
    InvalidCurrency,

    /// A total does not fit the reporting integer range.
    #[error("arithmetic overflow computing settlement totals")]
    ArithmeticOverflow,
}

/// How opposing flows are offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NettingMode {
    /// Offset flows between each pair of parties independently.
    #[default]
    Bilateral,
    /// Offset each party's total receivables against total payables.
    Multilateral,
}

impl std::str::FromStr for NettingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bilateral" => Ok(Self::Bilateral),
            "multilateral" => Ok(Self::Multilateral),
            other => Err(format!("unknown netting mode {other:?} (bilateral|multilateral)")),
        }
    }
}

impl std::fmt::Display for NettingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bilateral => "bilateral",
            Self::Multilateral => "multilateral",
        })
    }
}

/// Length of the epoch-aligned window within which flows net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SettlementCycle {
    minutes: u32,
}

impl SettlementCycle {
    /// Longest supported cycle: one day.
    pub const MAX_MINUTES: u32 = 1440;

    /// A cycle of `minutes`, between 1 and 1440.
    pub fn new(minutes: u32) -> Result<Self, ValidationError> {
        if minutes == 0 || minutes > Self::MAX_MINUTES {
            return Err(ValidationError::InvalidCycle(minutes));
        }
        Ok(Self { minutes })
    }

    /// Cycle length in minutes.
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Start of the cycle containing `timestamp`.
    pub fn start_of(&self, timestamp: &Timestamp) -> Timestamp {
        timestamp.floor_to_secs(i64::from(self.minutes) * 60)
    }
}

impl Default for SettlementCycle {
    fn default() -> Self {
        Self { minutes: 60 }
    }
}

impl TryFrom<u32> for SettlementCycle {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SettlementCycle> for u32 {
    fn from(cycle: SettlementCycle) -> Self {
        cycle.minutes
    }
}

/// A directed payment obligation: `from_party` owes `amount` to `to_party`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// The party that owes (the energy buyer).
    pub from_party: PartyId,
    /// The party that is owed (the energy seller).
    pub to_party: PartyId,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Start of the settlement cycle the obligation falls in.
    pub cycle_start: Timestamp,
    /// Source reading, for audit and duplicate detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ReadingDigest>,
}

impl Obligation {
    /// Derive the obligation a priced trade implies.
    ///
    /// Returns `None` for trades without a counterparty or with nothing to
    /// pay; neither contributes settlement volume.
    pub fn from_result(result: &SettlementResult, cycle: SettlementCycle) -> Option<Self> {
        let cp = result.counterparty.as_ref()?;
        if result.billed_minor_units <= 0 {
            return None;
        }
        Some(Self {
            from_party: cp.buyer.clone(),
            to_party: cp.seller.clone(),
            amount: result.billed_minor_units,
            currency: result.currency.code.clone(),
            cycle_start: cycle.start_of(&result.timestamp),
            source: Some(result.reading_digest),
        })
    }
}

/// A computed net position for a party in one currency and cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPosition {
    /// Party identifier.
    pub party_id: PartyId,
    /// Currency code.
    pub currency: String,
    /// Cycle start.
    pub cycle_start: Timestamp,
    /// Total receivable amount.
    pub receivable: i64,
    /// Total payable amount.
    pub payable: i64,
    /// Net amount (receivable - payable). Positive = net receiver.
    pub net: i64,
}

/// A settlement leg: a single payment in the settlement plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLeg {
    /// Paying party.
    pub from_party: PartyId,
    /// Receiving party.
    pub to_party: PartyId,
    /// Settlement amount in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Cycle start.
    pub cycle_start: Timestamp,
}

/// Headline netting figures, as carried in the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NettingSummary {
    /// Netting mode applied.
    pub mode: NettingMode,
    /// Settlement cycle length.
    pub cycle_minutes: u32,
    /// Sum of all obligation amounts, minor units.
    pub gross_volume: i64,
    /// Sum of all settlement leg amounts, minor units.
    pub net_volume: i64,
    /// `(1 − net / gross) × 100`; 0 when gross is 0.
    pub efficiency_pct: f64,
    /// Number of settlement legs.
    pub leg_count: usize,
}

/// A complete settlement plan produced by the netting engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NettingPlan {
    /// The obligations that were netted.
    pub obligations: Vec<Obligation>,
    /// Net positions per party per currency per cycle.
    pub net_positions: Vec<NetPosition>,
    /// Settlement legs.
    pub settlement_legs: Vec<SettlementLeg>,
    /// Headline figures.
    pub summary: NettingSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FlowKey {
    currency: String,
    cycle_start: Timestamp,
    low: PartyId,
    high: PartyId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PairFlow {
    low_to_high: i128,
    high_to_low: i128,
}

/// Accumulated opposing flows per `(currency, cycle, party pair)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NettingBook {
    flows: BTreeMap<FlowKey, PairFlow>,
}

impl NettingBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an obligation's flow. Callers validate obligations first; see
    /// [`NettingEngine::add_obligation`].
    pub fn record(&mut self, obligation: &Obligation) {
        let forward = obligation.from_party <= obligation.to_party;
        let (low, high) = if forward {
            (&obligation.from_party, &obligation.to_party)
        } else {
            (&obligation.to_party, &obligation.from_party)
        };
        let entry = self
            .flows
            .entry(FlowKey {
                currency: obligation.currency.clone(),
                cycle_start: obligation.cycle_start,
                low: low.clone(),
                high: high.clone(),
            })
            .or_default();
        if forward {
            entry.low_to_high += i128::from(obligation.amount);
        } else {
            entry.high_to_low += i128::from(obligation.amount);
        }
    }

    /// Fold another book into this one.
    pub fn merge(&mut self, other: NettingBook) {
        for (key, flow) in other.flows {
            let entry = self.flows.entry(key).or_default();
            entry.low_to_high += flow.low_to_high;
            entry.high_to_low += flow.high_to_low;
        }
    }

    /// Sum of every recorded flow.
    pub fn gross_total(&self) -> i128 {
        self.flows
            .values()
            .map(|f| f.low_to_high + f.high_to_low)
            .sum()
    }

    /// One leg per pair and cycle, from the net payer, for the difference
    /// between the opposing flows.
    pub fn bilateral_legs(&self) -> Result<Vec<SettlementLeg>, NettingError> {
        let mut legs = Vec::new();
        for (key, flow) in &self.flows {
            let diff = flow.low_to_high - flow.high_to_low;
            if diff == 0 {
                continue;
            }
            let (from_party, to_party) = if diff > 0 {
                (key.low.clone(), key.high.clone())
            } else {
                (key.high.clone(), key.low.clone())
            };
            legs.push(SettlementLeg {
                from_party,
                to_party,
                amount: to_i64(diff.abs())?,
                currency: key.currency.clone(),
                cycle_start: key.cycle_start,
            });
        }
        Ok(legs)
    }

    /// Receivables and payables per party, currency and cycle.
    pub fn net_positions(&self) -> Result<Vec<NetPosition>, NettingError> {
        // (currency, cycle, party) -> (receivable, payable)
        let mut positions: BTreeMap<(String, Timestamp, PartyId), (i128, i128)> = BTreeMap::new();
        for (key, flow) in &self.flows {
            let low = positions
                .entry((key.currency.clone(), key.cycle_start, key.low.clone()))
                .or_insert((0, 0));
            low.0 += flow.high_to_low;
            low.1 += flow.low_to_high;
            let high = positions
                .entry((key.currency.clone(), key.cycle_start, key.high.clone()))
                .or_insert((0, 0));
            high.0 += flow.low_to_high;
            high.1 += flow.high_to_low;
        }
        positions
            .into_iter()
            .map(|((currency, cycle_start, party_id), (receivable, payable))| {
                Ok(NetPosition {
                    party_id,
                    currency,
                    cycle_start,
                    receivable: to_i64(receivable)?,
                    payable: to_i64(payable)?,
                    net: to_i64(receivable - payable)?,
                })
            })
            .collect()
    }

    /// Greedy payer/receiver matching per currency and cycle.
    ///
    /// Payers and receivers are visited in party-id order.
    pub fn multilateral_legs(&self) -> Result<Vec<SettlementLeg>, NettingError> {
        let positions = self.net_positions()?;
        let mut groups: BTreeMap<(String, Timestamp), (Vec<(PartyId, i64)>, Vec<(PartyId, i64)>)> =
            BTreeMap::new();
        for np in positions {
            let group = groups
                .entry((np.currency.clone(), np.cycle_start))
                .or_default();
            if np.net < 0 {
                group.0.push((np.party_id, -np.net));
            } else if np.net > 0 {
                group.1.push((np.party_id, np.net));
            }
        }

        let mut legs = Vec::new();
        for ((currency, cycle_start), (mut payers, mut receivers)) in groups {
            let mut pi = 0;
            let mut ri = 0;
            while pi < payers.len() && ri < receivers.len() {
                let settle_amount = payers[pi].1.min(receivers[ri].1);
                if settle_amount > 0 {
                    legs.push(SettlementLeg {
                        from_party: payers[pi].0.clone(),
                        to_party: receivers[ri].0.clone(),
                        amount: settle_amount,
                        currency: currency.clone(),
                        cycle_start,
                    });
                }
                payers[pi].1 -= settle_amount;
                receivers[ri].1 -= settle_amount;
                if payers[pi].1 == 0 {
                    pi += 1;
                }
                if receivers[ri].1 == 0 {
                    ri += 1;
                }
            }
        }
        Ok(legs)
    }

    /// Settlement legs under `mode`.
    pub fn legs(&self, mode: NettingMode) -> Result<Vec<SettlementLeg>, NettingError> {
        match mode {
            NettingMode::Bilateral => self.bilateral_legs(),
            NettingMode::Multilateral => self.multilateral_legs(),
        }
    }

    /// Headline figures under `mode`.
    pub fn summarize(
        &self,
        mode: NettingMode,
        cycle: SettlementCycle,
    ) -> Result<NettingSummary, NettingError> {
        let legs = self.legs(mode)?;
        summarize_legs(self.gross_total(), &legs, mode, cycle)
    }
}

fn summarize_legs(
    gross: i128,
    legs: &[SettlementLeg],
    mode: NettingMode,
    cycle: SettlementCycle,
) -> Result<NettingSummary, NettingError> {
    let gross_volume = to_i64(gross)?;
    let net_volume = legs
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.amount))
        .ok_or(NettingError::ArithmeticOverflow)?;
    let efficiency_pct = if gross_volume > 0 {
        (1.0 - (net_volume as f64 / gross_volume as f64)) * 100.0
    } else {
        0.0
    };
    Ok(NettingSummary {
        mode,
        cycle_minutes: cycle.minutes(),
        gross_volume,
        net_volume,
        efficiency_pct,
        leg_count: legs.len(),
    })
}

fn to_i64(value: i128) -> Result<i64, NettingError> {
    i64::try_from(value).map_err(|_| NettingError::ArithmeticOverflow)
}

/// The settlement netting engine.
///
/// Collects validated obligations and computes a [`NettingPlan`].
///
/// ## Duplicate Detection
///
/// Obligations carrying a source reading digest are deduplicated by it, so
/// a replayed reading cannot be settled twice.
#[derive(Debug, Default)]
pub struct NettingEngine {
    obligations: Vec<Obligation>,
    seen: BTreeSet<ReadingDigest>,
    book: NettingBook,
}

impl NettingEngine {
    /// Create a new empty netting engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from priced trades.
    ///
    /// Trades without a counterparty or with a zero bill are skipped. A trade
    /// whose obligation fails validation is logged and skipped.
    pub fn from_results(results: &[SettlementResult], cycle: SettlementCycle) -> Self {
        let mut engine = Self::new();
        for result in results {
            let Some(obligation) = Obligation::from_result(result, cycle) else {
                continue;
            };
            if let Err(e) = engine.add_obligation(obligation) {
                tracing::warn!(
                    meter_id = %result.meter_id,
                    timestamp = %result.timestamp,
                    error = %e,
                    "obligation dropped from netting"
                );
            }
        }
        engine
    }

    /// Add an obligation to the netting set.
    pub fn add_obligation(&mut self, obligation: Obligation) -> Result<(), NettingError> {
        if obligation.amount <= 0 {
            return Err(NettingError::InvalidAmount {
                from_party: obligation.from_party.to_string(),
                to_party: obligation.to_party.to_string(),
                amount: obligation.amount,
            });
        }

        if obligation.from_party == obligation.to_party {
            return Err(NettingError::InvalidParties {
                reason: format!(
                    "from_party and to_party are identical: \"{}\"",
                    obligation.from_party
                ),
            });
        }

        if obligation.currency.trim().is_empty() {
            return Err(NettingError::InvalidCurrency);
        }

        if let Some(digest) = obligation.source {
            if !self.seen.insert(digest) {
                return Err(NettingError::DuplicateObligation {
                    digest: digest.to_hex(),
                });
            }
        }

        self.book.record(&obligation);
        self.obligations.push(obligation);
        Ok(())
    }

    /// Return the number of obligations.
    pub fn obligation_count(&self) -> usize {
        self.obligations.len()
    }

    /// The accumulated flows.
    pub fn book(&self) -> &NettingBook {
        &self.book
    }

    /// Compute the complete settlement plan.
    pub fn compute_plan(
        &self,
        mode: NettingMode,
        cycle: SettlementCycle,
    ) -> Result<NettingPlan, NettingError> {
        if self.obligations.is_empty() {
            return Err(NettingError::NoObligations);
        }

        let net_positions = self.book.net_positions()?;
        let settlement_legs = self.book.legs(mode)?;
        let gross = self
            .obligations
            .iter()
            .try_fold(0i64, |acc, o| acc.checked_add(o.amount))
            .ok_or(NettingError::ArithmeticOverflow)?;
        let summary = summarize_legs(i128::from(gross), &settlement_legs, mode, cycle)?;

        tracing::debug!(
            %mode,
            obligations = self.obligations.len(),
            legs = summary.leg_count,
            gross = summary.gross_volume,
            net = summary.net_volume,
            "computed netting plan"
        );

        Ok(NettingPlan {
            obligations: self.obligations.clone(),
            net_positions,
            settlement_legs,
            summary,
        })
    }
}
