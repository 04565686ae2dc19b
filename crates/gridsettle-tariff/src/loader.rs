//! Tariff file loading.
//!
//! Tariffs are authored as YAML (or JSON, selected by a `.json` extension)
//! and always validated before they are handed to pricing. A config that
//! fails validation never leaves this module.

use std::path::{Path, PathBuf};

use gridsettle_core::ConfigError;
use thiserror::Error;

use crate::config::TariffConfig;

/// Errors that can occur while loading a tariff file.
#[derive(Debug, Error)]
pub enum TariffLoadError {
    /// The tariff file does not exist.
    #[error("tariff file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// YAML parsing failed.
    #[error("failed to parse YAML tariff at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// JSON parsing failed.
    #[error("failed to parse JSON tariff at {path}: {source}")]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The file parsed but describes an unusable tariff.
    #[error("invalid tariff at {path}: {source}")]
    Invalid { path: PathBuf, source: ConfigError },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load and validate a tariff file.
pub fn load_tariff(path: &Path) -> Result<TariffConfig, TariffLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TariffLoadError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            TariffLoadError::Io(e)
        }
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let tariff: TariffConfig = if is_json {
        serde_json::from_str(&content).map_err(|e| TariffLoadError::JsonParse {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|e| TariffLoadError::YamlParse {
            path: path.to_path_buf(),
            source: e,
        })?
    };

    tariff.validate().map_err(|e| TariffLoadError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        path = %path.display(),
        currency = %tariff.currency,
        base_rate = tariff.base_rate,
        tags = tariff.carbon_factor.len(),
        "loaded tariff"
    );
    Ok(tariff)
}

/// Parse and validate a tariff from a YAML string.
pub fn parse_tariff_yaml(content: &str) -> Result<TariffConfig, TariffLoadError> {
    let path = PathBuf::from("<inline>");
    let tariff: TariffConfig =
        serde_yaml::from_str(content).map_err(|e| TariffLoadError::YamlParse {
            path: path.clone(),
            source: e,
        })?;
    tariff
        .validate()
        .map_err(|e| TariffLoadError::Invalid { path, source: e })?;
    Ok(tariff)
}
