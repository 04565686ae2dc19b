//! Run configuration.
//!
//! An optional YAML file (`--config run.yaml`) supplies defaults for the
//! options most subcommands share:
//!
//! ```yaml
//! tariff: tariff.v1.yaml      # relative to this file
//! cycle_minutes: 60
//! netting_mode: bilateral
//! fail_fast: false
//! ```
//!
//! Precedence is flag > config file > built-in default. Relative paths in
//! the file resolve against the file's own directory; relative paths given
//! as flags resolve against the working directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridsettle_settlement::{BatchPolicy, NettingMode, SettlementCycle};
use gridsettle_tariff::{load_tariff, TariffConfig};
use serde::{Deserialize, Serialize};

/// Tariff file used when neither a flag nor the config names one.
pub const DEFAULT_TARIFF_PATH: &str = "tariff.yaml";

/// Contents of a run configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub tariff: Option<PathBuf>,
    #[serde(default)]
    pub cycle_minutes: Option<u32>,
    #[serde(default)]
    pub netting_mode: Option<NettingMode>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
}

/// A loaded run configuration and the directory it was read from.
#[derive(Debug, Clone)]
pub struct RunContext {
    config: RunConfig,
    base_dir: PathBuf,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            config: RunConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl RunContext {
    /// Load `path`, or fall back to built-in defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run config: {}", path.display()))?;
        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse run config: {}", path.display()))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(path = %path.display(), ?config, "loaded run config");
        Ok(Self { config, base_dir })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Tariff path from the flag, the config, or [`DEFAULT_TARIFF_PATH`].
    pub fn tariff_path(&self, flag: Option<&Path>) -> PathBuf {
        match (flag, &self.config.tariff) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(p)) => crate::resolve_path(p, &self.base_dir),
            (None, None) => PathBuf::from(DEFAULT_TARIFF_PATH),
        }
    }

    /// Load and validate the tariff selected by [`RunContext::tariff_path`].
    pub fn load_tariff(&self, flag: Option<&Path>) -> Result<TariffConfig> {
        let path = self.tariff_path(flag);
        load_tariff(&path).with_context(|| format!("cannot use tariff {}", path.display()))
    }

    pub fn cycle(&self, flag: Option<u32>) -> Result<SettlementCycle> {
        match flag.or(self.config.cycle_minutes) {
            Some(minutes) => SettlementCycle::new(minutes).context("invalid settlement cycle"),
            None => Ok(SettlementCycle::default()),
        }
    }

    pub fn mode(&self, flag: Option<NettingMode>) -> NettingMode {
        flag.or(self.config.netting_mode).unwrap_or_default()
    }

    /// `--fail-fast` only ever tightens the policy.
    pub fn policy(&self, fail_fast_flag: bool) -> BatchPolicy {
        if fail_fast_flag || self.config.fail_fast.unwrap_or(false) {
            BatchPolicy::FailFast
        } else {
            BatchPolicy::SkipInvalid
        }
    }
}
