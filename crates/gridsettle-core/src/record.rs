//! # Metered Trade Records
//!
//! [`TradeRecord`] is the immutable input unit of settlement, supplied by the
//! metering/ledger collaborator. Records are never mutated after
//! construction; every derived value traces back to exactly one record via
//! its meter id, timestamp and [`ReadingDigest`].
//!
//! ## Reading digest
//!
//! Meters attach a replay-prevention hash to each reading. The digest here is
//! SHA-256 over `meter_id:energy_kwh:epoch_secs`, lowercase hex. It is an
//! identity for duplicate detection, not an authenticity proof.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::carbon::CarbonTag;
use crate::error::ValidationError;
use crate::identity::{MeterId, PartyId};
use crate::temporal::Timestamp;

/// The two sides of a trade: energy flows from `seller` to `buyer`, money
/// from `buyer` to `seller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counterparty {
    /// Party delivering the energy.
    pub seller: PartyId,
    /// Party receiving the energy.
    pub buyer: PartyId,
}

/// A single metered energy trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Physical meter that produced the reading.
    pub meter_id: MeterId,
    /// Energy transacted, in kWh.
    pub energy_kwh: f64,
    /// Generation-source classification.
    pub carbon_tag: CarbonTag,
    /// When the reading was taken.
    pub timestamp: Timestamp,
    /// Trading parties. Records without one are priced but never netted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
}

impl TradeRecord {
    /// Build a record without counterparties.
    pub fn new(
        meter_id: MeterId,
        energy_kwh: f64,
        carbon_tag: CarbonTag,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            meter_id,
            energy_kwh,
            carbon_tag,
            timestamp,
            counterparty: None,
        }
    }

    /// Attach the trading parties.
    pub fn with_counterparty(mut self, seller: PartyId, buyer: PartyId) -> Self {
        self.counterparty = Some(Counterparty { seller, buyer });
        self
    }

    /// Check the record-local invariants pricing depends on.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonFiniteEnergy`] for NaN or infinite energy.
    /// - [`ValidationError::NegativeEnergy`] for energy below zero.
    /// - [`ValidationError::SelfTrade`] when seller and buyer coincide.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.energy_kwh.is_finite() {
            return Err(ValidationError::NonFiniteEnergy {
                meter_id: self.meter_id.to_string(),
            });
        }
        if self.energy_kwh < 0.0 {
            return Err(ValidationError::NegativeEnergy {
                meter_id: self.meter_id.to_string(),
                energy_kwh: self.energy_kwh,
            });
        }
        if let Some(cp) = &self.counterparty {
            if cp.seller == cp.buyer {
                return Err(ValidationError::SelfTrade {
                    meter_id: self.meter_id.to_string(),
                    party: cp.seller.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Replay-detection digest of this reading.
    pub fn reading_digest(&self) -> ReadingDigest {
        let input = format!(
            "{}:{}:{}",
            self.meter_id,
            self.energy_kwh,
            self.timestamp.epoch_secs()
        );
        let hash = Sha256::digest(input.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        ReadingDigest(bytes)
    }
}

/// SHA-256 digest identifying one meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadingDigest([u8; 32]);

impl ReadingDigest {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ReadingDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ReadingDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ReadingDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() != 64 {
            return Err(serde::de::Error::custom(format!(
                "reading digest must be 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(serde::de::Error::custom)?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(serde::de::Error::custom)?;
        }
        Ok(Self(bytes))
    }
}
