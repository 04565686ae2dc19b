//! # Meter Fleet Simulator
//!
//! Generates trade ledgers from a fleet of simulated campus meters. Every
//! reading becomes a [`TradeRecord`] with a counterparty against the grid
//! operator: producers sell `owner → operator`, consumers buy
//! `operator → owner`. An owner holding both kinds of meter therefore has
//! opposing flows with the operator that net within a settlement cycle.
//!
//! All randomness comes from the caller's RNG. A seeded [`StdRng`](rand::rngs::StdRng)
//! reproduces the same ledger byte for byte.

use std::collections::BTreeMap;

use chrono::Timelike;
use gridsettle_core::{MeterId, PartyId, Timestamp, TradeRecord, ValidationError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::MeterKind;

/// Longest ledger [`MeterFleet::simulate`] will generate: one leap year of hours.
pub const MAX_SIMULATION_HOURS: u32 = 24 * 366;

/// Most samples [`simulate_latencies`] will draw in one call.
pub const MAX_LATENCY_SAMPLES: usize = 1_000_000;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Errors from fleet configuration and simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeterError {
    /// A meter with this id is already in the fleet.
    #[error("meter {0} is already registered")]
    DuplicateMeter(String),

    /// The meter owner is the grid operator, which would trade with itself.
    #[error("meter {meter_id} cannot be owned by the grid operator {operator}")]
    OwnerIsOperator {
        /// The rejected meter.
        meter_id: String,
        /// The operator party.
        operator: String,
    },

    /// The requested simulation horizon exceeds [`MAX_SIMULATION_HOURS`].
    #[error("simulation of {hours} hours exceeds the {max}-hour limit")]
    HorizonTooLong {
        /// Requested hours.
        hours: u32,
        /// The limit.
        max: u32,
    },

    /// The requested latency sample count exceeds [`MAX_LATENCY_SAMPLES`].
    #[error("{count} latency samples exceeds the limit of {max}")]
    TooManySamples {
        /// Requested samples.
        count: usize,
        /// The limit.
        max: usize,
    },

    /// An identifier or timestamp was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One simulated meter.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMeter {
    pub id: MeterId,
    pub kind: MeterKind,
    /// Party billed or paid for this meter's energy.
    pub owner: PartyId,
    readings: u64,
}

impl SimulatedMeter {
    pub fn new(id: MeterId, kind: MeterKind, owner: PartyId) -> Self {
        Self {
            id,
            kind,
            owner,
            readings: 0,
        }
    }

    /// Readings produced so far.
    pub fn reading_count(&self) -> u64 {
        self.readings
    }

    /// Take one reading at `timestamp`.
    ///
    /// The hour of day is taken in local time at `utc_offset_minutes`.
    pub fn reading_at<R: Rng + ?Sized>(
        &mut self,
        timestamp: Timestamp,
        utc_offset_minutes: i32,
        operator: &PartyId,
        rng: &mut R,
    ) -> TradeRecord {
        let profile = self.kind.profile();
        let noise = f64::from(rng.gen_range(0u32..1000)) / 1000.0;
        let hour = timestamp.local_time(utc_offset_minutes).hour();
        let kwh = profile.reading_kwh(hour, noise);
        self.readings += 1;

        let (seller, buyer) = if profile.producer {
            (self.owner.clone(), operator.clone())
        } else {
            (operator.clone(), self.owner.clone())
        };
        TradeRecord::new(self.id.clone(), kwh, profile.carbon_tag.clone(), timestamp)
            .with_counterparty(seller, buyer)
    }
}

/// Summary of one meter, as shown in fleet status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterInfo {
    pub meter_id: MeterId,
    pub kind: MeterKind,
    pub owner: PartyId,
    pub carbon_tag: String,
    pub producer: bool,
    pub total_readings: u64,
}

/// Fleet-wide summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetStatus {
    pub operator: PartyId,
    pub total_meters: usize,
    pub producers: usize,
    pub consumers: usize,
    pub meters: Vec<MeterInfo>,
}

/// A set of meters trading against one grid operator.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterFleet {
    operator: PartyId,
    utc_offset_minutes: i32,
    meters: BTreeMap<MeterId, SimulatedMeter>,
}

impl MeterFleet {
    /// Party id of the demo fleet's grid operator.
    pub const CAMPUS_OPERATOR: &'static str = "CAMPUS-GRID";

    /// An empty fleet reading local hours in UTC.
    pub fn new(operator: PartyId) -> Self {
        Self {
            operator,
            utc_offset_minutes: 0,
            meters: BTreeMap::new(),
        }
    }

    /// Read hours of day at a fixed offset from UTC.
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// The five-meter campus fleet.
    ///
    /// `HOSTEL-A` owns a solar array and a hostel block, `ENGINEERING` owns a
    /// roof array and the computer lab, so both have flows that net.
    pub fn campus_demo() -> Result<Self, MeterError> {
        let mut fleet = Self::new(PartyId::new(Self::CAMPUS_OPERATOR)?);
        for (id, kind, owner) in [
            ("SOLAR-MAIN-001", MeterKind::Solar, "HOSTEL-A"),
            ("SOLAR-ROOF-002", MeterKind::Solar, "ENGINEERING"),
            ("HOSTEL-BLOCK-A", MeterKind::Hostel, "HOSTEL-A"),
            ("HOSTEL-BLOCK-B", MeterKind::Hostel, "HOSTEL-B"),
            ("LAB-COMPUTER-01", MeterKind::Lab, "ENGINEERING"),
        ] {
            fleet.add_meter(MeterId::new(id)?, kind, PartyId::new(owner)?)?;
        }
        Ok(fleet)
    }

    pub fn operator(&self) -> &PartyId {
        &self.operator
    }

    /// Register a meter.
    pub fn add_meter(
        &mut self,
        id: MeterId,
        kind: MeterKind,
        owner: PartyId,
    ) -> Result<&SimulatedMeter, MeterError> {
        if owner == self.operator {
            return Err(MeterError::OwnerIsOperator {
                meter_id: id.to_string(),
                operator: self.operator.to_string(),
            });
        }
        if self.meters.contains_key(&id) {
            return Err(MeterError::DuplicateMeter(id.to_string()));
        }
        tracing::debug!(meter_id = %id, %kind, %owner, "registered meter");
        let meter = self
            .meters
            .entry(id.clone())
            .or_insert(SimulatedMeter::new(id, kind, owner));
        Ok(&*meter)
    }

    pub fn get_meter(&self, id: &MeterId) -> Option<&SimulatedMeter> {
        self.meters.get(id)
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Per-meter summary and producer/consumer counts.
    pub fn status(&self) -> FleetStatus {
        let meters: Vec<MeterInfo> = self
            .meters
            .values()
            .map(|m| {
                let profile = m.kind.profile();
                MeterInfo {
                    meter_id: m.id.clone(),
                    kind: m.kind,
                    owner: m.owner.clone(),
                    carbon_tag: profile.carbon_tag.to_string(),
                    producer: profile.producer,
                    total_readings: m.readings,
                }
            })
            .collect();
        let producers = meters.iter().filter(|m| m.producer).count();
        FleetStatus {
            operator: self.operator.clone(),
            total_meters: meters.len(),
            producers,
            consumers: meters.len() - producers,
            meters,
        }
    }

    /// One reading from every meter at `timestamp`, in meter-id order.
    pub fn readings_at<R: Rng + ?Sized>(
        &mut self,
        timestamp: Timestamp,
        rng: &mut R,
    ) -> Vec<TradeRecord> {
        let offset = self.utc_offset_minutes;
        let operator = &self.operator;
        self.meters
            .values_mut()
            .map(|m| m.reading_at(timestamp, offset, operator, &mut *rng))
            .collect()
    }

    /// Hourly readings from every meter for `hours` hours from `start`.
    ///
    /// # Errors
    ///
    /// - `MeterError::HorizonTooLong` if `hours` exceeds [`MAX_SIMULATION_HOURS`].
    /// - `MeterError::Validation` if a reading time leaves the supported range.
    pub fn simulate<R: Rng + ?Sized>(
        &mut self,
        start: Timestamp,
        hours: u32,
        rng: &mut R,
    ) -> Result<Vec<TradeRecord>, MeterError> {
        let too_long = MeterError::HorizonTooLong {
            hours,
            max: MAX_SIMULATION_HOURS,
        };
        if hours > MAX_SIMULATION_HOURS {
            return Err(too_long);
        }
        let capacity = usize::try_from(hours)
            .ok()
            .and_then(|h| self.meters.len().checked_mul(h))
            .ok_or(too_long)?;

        let start_ms = start.epoch_millis();
        let mut ledger = Vec::with_capacity(capacity);
        for hour in 0..hours {
            let at = Timestamp::from_epoch_millis(start_ms + i64::from(hour) * MILLIS_PER_HOUR)?;
            ledger.extend(self.readings_at(at, &mut *rng));
        }
        tracing::info!(
            meters = self.meters.len(),
            hours,
            records = ledger.len(),
            "simulated ledger"
        );
        Ok(ledger)
    }
}

/// Settlement-completion latency model: a uniform body with occasional
/// uniform tail spikes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyModel {
    pub base_min_ms: u64,
    pub base_max_ms: u64,
    /// Probability in `[0, 1]` of drawing from the spike band.
    pub spike_prob: f64,
    pub spike_min_ms: u64,
    pub spike_max_ms: u64,
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self {
            base_min_ms: 80,
            base_max_ms: 400,
            spike_prob: 0.05,
            spike_min_ms: 800,
            spike_max_ms: 2_500,
        }
    }
}

impl LatencyModel {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let (lo, hi) = if rng.gen::<f64>() < self.spike_prob {
            (self.spike_min_ms, self.spike_max_ms)
        } else {
            (self.base_min_ms, self.base_max_ms)
        };
        rng.gen_range(lo.min(hi)..=hi.max(lo))
    }
}

/// `count` latency samples from the default model.
///
/// # Errors
///
/// Returns `MeterError::TooManySamples` if `count` exceeds [`MAX_LATENCY_SAMPLES`].
pub fn simulate_latencies<R: Rng + ?Sized>(
    count: usize,
    rng: &mut R,
) -> Result<Vec<u64>, MeterError> {
    if count > MAX_LATENCY_SAMPLES {
        return Err(MeterError::TooManySamples {
            count,
            max: MAX_LATENCY_SAMPLES,
        });
    }
    let model = LatencyModel::default();
    Ok((0..count).map(|_| model.sample(&mut *rng)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsettle_core::CarbonTag;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn start() -> Timestamp {
        Timestamp::parse("2026-01-22T00:00:00Z").unwrap()
    }

    #[test]
    fn campus_demo_status() {
        let fleet = MeterFleet::campus_demo().unwrap();
        let status = fleet.status();
        assert_eq!(status.total_meters, 5);
        assert_eq!(status.producers, 2);
        assert_eq!(status.consumers, 3);
        assert_eq!(status.operator.as_str(), "CAMPUS-GRID");
    }

    #[test]
    fn same_seed_same_ledger() {
        let mut a = MeterFleet::campus_demo().unwrap();
        let mut b = MeterFleet::campus_demo().unwrap();
        let la = a.simulate(start(), 24, &mut StdRng::seed_from_u64(7)).unwrap();
        let lb = b.simulate(start(), 24, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(la.len(), 120);
        assert_eq!(la, lb);
    }

    #[test]
    fn readings_are_valid_and_unique() {
        let mut fleet = MeterFleet::campus_demo().unwrap();
        let ledger = fleet
            .simulate(start(), 48, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let mut digests = std::collections::BTreeSet::new();
        for r in &ledger {
            r.validate().unwrap();
            assert!(r.energy_kwh >= 0.0);
            assert!(digests.insert(r.reading_digest()));
        }
        let solar = fleet
            .get_meter(&MeterId::new("SOLAR-MAIN-001").unwrap())
            .unwrap();
        assert_eq!(solar.reading_count(), 48);
    }

    #[test]
    fn producers_sell_to_operator() {
        let mut fleet = MeterFleet::campus_demo().unwrap();
        let noon = Timestamp::parse("2026-01-22T12:00:00Z").unwrap();
        let readings = fleet.readings_at(noon, &mut StdRng::seed_from_u64(3));
        for r in readings {
            let cp = r.counterparty.unwrap();
            if r.carbon_tag == CarbonTag::Solar {
                assert_eq!(cp.buyer.as_str(), "CAMPUS-GRID");
                assert!(r.energy_kwh >= 4.0);
            } else {
                assert_eq!(cp.seller.as_str(), "CAMPUS-GRID");
            }
        }
    }

    #[test]
    fn utc_offset_shifts_profile_hour() {
        let mut fleet = MeterFleet::new(PartyId::new("OP").unwrap()).with_utc_offset(330);
        fleet
            .add_meter(
                MeterId::new("SOLAR-1").unwrap(),
                MeterKind::Solar,
                PartyId::new("OWNER").unwrap(),
            )
            .unwrap();
        // 06:30 UTC is 12:00 at +05:30, full sun.
        let at = Timestamp::parse("2026-01-22T06:30:00Z").unwrap();
        let r = &fleet.readings_at(at, &mut StdRng::seed_from_u64(0))[0];
        assert!(r.energy_kwh >= 4.0);
    }

    #[test]
    fn duplicate_and_operator_owned_meters_rejected() {
        let mut fleet = MeterFleet::campus_demo().unwrap();
        assert!(matches!(
            fleet.add_meter(
                MeterId::new("LAB-COMPUTER-01").unwrap(),
                MeterKind::Lab,
                PartyId::new("ENGINEERING").unwrap()
            ),
            Err(MeterError::DuplicateMeter(_))
        ));
        assert!(matches!(
            fleet.add_meter(
                MeterId::new("LAB-2").unwrap(),
                MeterKind::Lab,
                PartyId::new("CAMPUS-GRID").unwrap()
            ),
            Err(MeterError::OwnerIsOperator { .. })
        ));
    }

    #[test]
    fn latencies_within_model_bounds() {
        let model = LatencyModel::default();
        let samples = simulate_latencies(500, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(samples.len(), 500);
        assert!(samples
            .iter()
            .all(|&s| (model.base_min_ms..=model.spike_max_ms).contains(&s)));
    }

    #[test]
    fn oversized_requests_are_errors() {
        let mut fleet = MeterFleet::campus_demo().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            fleet.simulate(start(), u32::MAX, &mut rng),
            Err(MeterError::HorizonTooLong {
                hours: u32::MAX,
                max: MAX_SIMULATION_HOURS
            })
        );
        assert_eq!(fleet.status().meters[0].total_readings, 0);
        assert!(matches!(
            simulate_latencies(MAX_LATENCY_SAMPLES + 1, &mut rng),
            Err(MeterError::TooManySamples { .. })
        ));
    }

    #[test]
    fn hourly_steps_stay_aligned() {
        let mut fleet = MeterFleet::campus_demo().unwrap();
        let ledger = fleet
            .simulate(start(), 3, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let last = ledger.last().unwrap();
        assert_eq!(last.timestamp.to_iso8601(), "2026-01-22T02:00:00Z");
    }

    #[test]
    fn status_serializes() {
        let json = serde_json::to_value(MeterFleet::campus_demo().unwrap().status()).unwrap();
        assert_eq!(json["meters"][0]["kind"], "HOSTEL");
    }
}
