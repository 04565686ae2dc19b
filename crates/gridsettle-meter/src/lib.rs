//! # gridsettle-meter: Smart-Meter Simulator
//!
//! Stand-in for the upstream metering collaborator. Produces trade ledgers
//! and settlement latencies with realistic daily shapes so the rest of the
//! stack can be exercised end to end.
//!
//! - [`profile`]: per-kind hourly output shapes.
//! - [`simulator`]: meter fleets, seeded ledgers and latency samples.

pub mod profile;
pub mod simulator;

pub use profile::{MeterKind, MeterProfile};
pub use simulator::{
    simulate_latencies, FleetStatus, LatencyModel, MeterError, MeterFleet, MeterInfo,
    SimulatedMeter, MAX_LATENCY_SAMPLES, MAX_SIMULATION_HOURS,
};
