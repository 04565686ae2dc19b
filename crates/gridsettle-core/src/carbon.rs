//! # Carbon Tags
//!
//! Classification of the generation source behind an energy trade. The four
//! standard sources have dedicated variants so every `match` over them is
//! exhaustive; any other tag a meter reports (for example `WIND`) is carried
//! as [`CarbonTag::Other`] and is priceable only if the tariff names it.
//!
//! Tags are case-insensitive on input and always stored uppercase, so
//! `"solar"` and `"SOLAR"` address the same tariff entry.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Generation-source classification of a trade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CarbonTag {
    /// On-site photovoltaic generation.
    Solar,
    /// Energy drawn from the public grid.
    Grid,
    /// Mixed on-site and grid supply.
    Hybrid,
    /// Discharge from on-site storage.
    Battery,
    /// Any other source tag, stored uppercase.
    Other(String),
}

impl CarbonTag {
    /// The four standard tags, in declaration order.
    pub fn standard() -> &'static [CarbonTag] {
        &[Self::Solar, Self::Grid, Self::Hybrid, Self::Battery]
    }

    /// Parse a tag, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCarbonTag`] if the trimmed value is
    /// empty or contains characters other than ASCII letters, digits and `_`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let upper = value.trim().to_ascii_uppercase();
        if upper.is_empty()
            || !upper
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ValidationError::InvalidCarbonTag(value.to_string()));
        }
        Ok(match upper.as_str() {
            "SOLAR" => Self::Solar,
            "GRID" => Self::Grid,
            "HYBRID" => Self::Hybrid,
            "BATTERY" => Self::Battery,
            _ => Self::Other(upper),
        })
    }

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Solar => "SOLAR",
            Self::Grid => "GRID",
            Self::Hybrid => "HYBRID",
            Self::Battery => "BATTERY",
            Self::Other(s) => s,
        }
    }

    /// Whether energy with this tag counts toward the renewable share.
    ///
    /// Solar generation and storage discharge count; grid and hybrid supply
    /// do not, and neither does any non-standard tag.
    pub fn is_renewable(&self) -> bool {
        matches!(self, Self::Solar | Self::Battery)
    }
}

impl TryFrom<String> for CarbonTag {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CarbonTag> for String {
    fn from(tag: CarbonTag) -> Self {
        tag.as_str().to_string()
    }
}

impl std::str::FromStr for CarbonTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CarbonTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
