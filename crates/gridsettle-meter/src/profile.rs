//! Meter kinds and their load profiles.
//!
//! Each kind has a base hourly output, a uniform noise band and 24 hourly
//! shape factors (index = local hour). Solar arrays produce and are tagged
//! SOLAR; hostels and labs consume grid energy.

use gridsettle_core::CarbonTag;
use serde::{Deserialize, Serialize};

/// Kind of campus meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterKind {
    /// Rooftop or ground-mounted solar array.
    Solar,
    /// Student residence.
    Hostel,
    /// Laboratory or computer centre.
    Lab,
}

impl MeterKind {
    pub fn all() -> &'static [MeterKind] {
        &[Self::Solar, Self::Hostel, Self::Lab]
    }

    /// The load profile for this kind.
    pub fn profile(&self) -> &'static MeterProfile {
        match self {
            Self::Solar => &SOLAR,
            Self::Hostel => &HOSTEL,
            Self::Lab => &LAB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solar => "SOLAR",
            Self::Hostel => "HOSTEL",
            Self::Lab => "LAB",
        }
    }
}

impl std::fmt::Display for MeterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output shape of one meter kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterProfile {
    /// Tag applied to every reading.
    pub carbon_tag: CarbonTag,
    /// Producers sell to the grid operator; consumers buy from it.
    pub producer: bool,
    /// kWh per hour at factor 1.0.
    pub base_output_kwh: f64,
    /// Width of the uniform noise band, kWh.
    pub variance_kwh: f64,
    /// Shape factor per local hour.
    pub hourly_factors: [f64; 24],
}

impl MeterProfile {
    /// Expected output for `hour`, before noise. Hours wrap modulo 24.
    pub fn expected_kwh(&self, hour: u32) -> f64 {
        self.base_output_kwh * self.hourly_factors[(hour % 24) as usize]
    }

    /// Output for `hour` with `noise` in `[0, 1)` spread across the variance
    /// band, floored at zero and rounded to watt-hours.
    pub fn reading_kwh(&self, hour: u32, noise: f64) -> f64 {
        let kwh = (self.expected_kwh(hour) + (noise - 0.5) * self.variance_kwh).max(0.0);
        (kwh * 1000.0).round() / 1000.0
    }
}

static SOLAR: MeterProfile = MeterProfile {
    carbon_tag: CarbonTag::Solar,
    producer: true,
    base_output_kwh: 5.0,
    variance_kwh: 2.0,
    hourly_factors: [
        0.0, 0.0, 0.0, 0.0, 0.0, 0.1, //
        0.3, 0.5, 0.7, 0.9, 1.0, 1.0, //
        1.0, 1.0, 0.9, 0.7, 0.5, 0.3, //
        0.1, 0.0, 0.0, 0.0, 0.0, 0.0,
    ],
};

static HOSTEL: MeterProfile = MeterProfile {
    carbon_tag: CarbonTag::Grid,
    producer: false,
    base_output_kwh: 10.0,
    variance_kwh: 5.0,
    hourly_factors: [
        0.3, 0.2, 0.2, 0.2, 0.3, 0.5, //
        0.8, 0.9, 0.7, 0.4, 0.3, 0.4, //
        0.5, 0.5, 0.5, 0.6, 0.7, 0.8, //
        1.0, 1.2, 1.2, 1.0, 0.7, 0.5,
    ],
};

static LAB: MeterProfile = MeterProfile {
    carbon_tag: CarbonTag::Grid,
    producer: false,
    base_output_kwh: 15.0,
    variance_kwh: 3.0,
    hourly_factors: [
        0.1, 0.1, 0.1, 0.1, 0.1, 0.1, //
        0.2, 0.3, 0.8, 1.0, 1.0, 0.8, //
        0.4, 0.8, 1.0, 1.0, 0.9, 0.5, //
        0.2, 0.1, 0.1, 0.1, 0.1, 0.1,
    ],
};
