//! # Identity Newtypes
//!
//! Validated identifiers for meters and trading parties. A [`MeterId`]
//! cannot be passed where a [`PartyId`] is expected, even though both wrap
//! the same string format.
//!
//! ## Validation
//!
//! - 1 to 64 characters.
//! - ASCII letters, digits, `-`, `_` and `.` only. This admits the meter
//!   fleet naming (`SOLAR-MAIN-001`) and hex wallet addresses (`0x7a3f...`).
//! - Surrounding whitespace is trimmed before validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum identifier length accepted by [`MeterId`] and [`PartyId`].
pub const MAX_ID_LEN: usize = 64;

fn is_valid_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_ID_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Identifier of a physical smart meter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeterId(String);

impl MeterId {
    /// Create a meter identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMeterId`] if the trimmed value is
    /// empty, longer than [`MAX_ID_LEN`], or contains disallowed characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim();
        if !is_valid_id(s) {
            return Err(ValidationError::InvalidMeterId(raw));
        }
        Ok(Self(s.to_string()))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MeterId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MeterId> for String {
    fn from(id: MeterId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MeterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a settlement party (prosumer, consumer, or grid operator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
    /// Create a party identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPartyId`] on malformed input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim();
        if !is_valid_id(s) {
            return Err(ValidationError::InvalidPartyId(raw));
        }
        Ok(Self(s.to_string()))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PartyId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartyId> for String {
    fn from(id: PartyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
