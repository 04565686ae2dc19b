//! # gridsettle-cli: Settlement Command Line
//!
//! Provides the `gridsettle` binary.
//!
//! ## Subcommands
//!
//! - `gridsettle tariff`: Load, validate and summarize a tariff.
//! - `gridsettle price`: Price a ledger, reporting rejected records.
//! - `gridsettle net`: Compute a netting plan for a ledger.
//! - `gridsettle report`: Aggregate report: energy, carbon, netting, latency.
//! - `gridsettle simulate`: Generate a deterministic demo ledger.
//!
//! ```bash
//! gridsettle simulate --hours 24 --seed 7 --out ledger.json --latencies-out latencies.json
//! gridsettle report --ledger ledger.json --tariff tariff.yaml --latencies latencies.json
//! ```
//!
//! Results are written as pretty JSON to stdout or `--out`; logs go to stderr.

pub mod config;
pub mod net;
pub mod price;
pub mod report;
pub mod simulate;
pub mod tariff;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridsettle_core::TradeRecord;
use serde::Serialize;

/// Resolve a path that may be relative to `base`.
///
/// Absolute paths are returned as-is; relative paths are joined onto `base`.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Read a ledger: a JSON array of trade records.
pub fn read_ledger(path: &Path) -> Result<Vec<TradeRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ledger: {}", path.display()))?;
    let records: Vec<TradeRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse ledger: {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded ledger");
    Ok(records)
}

/// Read latency samples: a JSON array of non-negative integer milliseconds.
pub fn read_latencies(path: &Path) -> Result<Vec<u64>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read latencies: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse latencies: {}", path.display()))
}

/// Write `value` as pretty JSON to `out`, or to stdout when `out` is `None`.
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let mut rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    rendered.push('\n');
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => {
            std::io::stdout()
                .lock()
                .write_all(rendered.as_bytes())
                .context("failed to write to stdout")?;
        }
    }
    Ok(())
}
