//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines [`Timestamp`], a UTC timestamp truncated to seconds precision.
//! Meter readings arrive either as RFC 3339 strings or as epoch
//! milliseconds; both normalise to the same representation so that two
//! encodings of one instant price and net identically.
//!
//! Tariff periods are wall-clock concepts, so [`Timestamp::local_time`]
//! projects an instant into a fixed UTC offset. Settlement cycles are
//! epoch-aligned buckets, computed by [`Timestamp::floor_to_secs`].

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC timestamp, truncated to seconds.
///
/// Serializes as `YYYY-MM-DDTHH:MM:SSZ`. Deserialization accepts any RFC 3339
/// offset and converts to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the string is not
    /// valid RFC 3339.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s.trim())
            .map_err(|e| ValidationError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        let dt = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            ValidationError::InvalidTimestamp(format!("epoch seconds out of range: {secs}"))
        })?;
        Ok(Self(dt))
    }

    /// From Unix epoch milliseconds, the unit meters report in.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, ValidationError> {
        Self::from_epoch_secs(millis.div_euclid(1000))
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Unix epoch milliseconds; always a whole number of seconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Wall-clock time of day at a fixed offset from UTC.
    ///
    /// Offsets outside ±24h are clamped to UTC; tariff validation rejects
    /// them before pricing reaches this point.
    pub fn local_time(&self, utc_offset_minutes: i32) -> NaiveTime {
        match FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)) {
            Some(offset) => self.0.with_timezone(&offset).time(),
            None => self.0.time(),
        }
    }

    /// Start of the epoch-aligned bucket of `bucket_secs` containing this instant.
    pub fn floor_to_secs(&self, bucket_secs: i64) -> Self {
        if bucket_secs <= 0 {
            return *self;
        }
        let secs = self.epoch_secs();
        let floored = secs - secs.rem_euclid(bucket_secs);
        match DateTime::from_timestamp(floored, 0) {
            Some(dt) => Self(dt),
            None => *self,
        }
    }

    /// Render as ISO 8601 with Z suffix (e.g. `2026-01-22T12:06:58Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
