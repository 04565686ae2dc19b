//! # gridsettle-tariff: Tariff Configuration
//!
//! - **Config** ([`config`]): [`TariffConfig`], [`Currency`] and per-tag
//!   [`CarbonAdjustment`]s, with whole-config validation.
//! - **Periods** ([`period`]): PEAK / STANDARD / OFF_PEAK classification
//!   from configurable daily windows.
//! - **Loader** ([`loader`]): YAML/JSON file loading; every loaded tariff is
//!   validated.
//!
//! A tariff is immutable once built. Construct it once per run and pass it
//! by reference.

pub mod config;
pub mod loader;
pub mod period;

pub use config::{CarbonAdjustment, Currency, TariffConfig};
pub use loader::{load_tariff, parse_tariff_yaml, TariffLoadError};
pub use period::{ClockTime, TariffPeriod, TimeWindow};
