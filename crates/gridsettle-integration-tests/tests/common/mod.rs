//! Shared fixture loading.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gridsettle_core::TradeRecord;
use gridsettle_tariff::{load_tariff, TariffConfig};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
}

pub fn tariff() -> TariffConfig {
    load_tariff(&fixture("tariff.v1.yaml")).unwrap()
}

pub fn ledger() -> Vec<TradeRecord> {
    let content = std::fs::read_to_string(fixture("ledger.v1.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

pub fn latencies() -> Vec<u64> {
    let content = std::fs::read_to_string(fixture("latencies.v1.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}
