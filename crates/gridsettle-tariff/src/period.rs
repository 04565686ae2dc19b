//! # Time-of-Day Periods
//!
//! A tariff splits the day into PEAK, OFF_PEAK and STANDARD periods. Peak and
//! off-peak are configured as [`TimeWindow`]s; every instant outside both is
//! STANDARD.
//!
//! Windows are inclusive at the start and exclusive at the end, so an instant
//! exactly on a boundary belongs to the later period: 18:00:00 opens the
//! default peak window and 22:00:00 is already STANDARD. A window whose end
//! precedes its start wraps midnight (`22:00-06:00`).

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Pricing period derived from a reading's local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffPeriod {
    /// Evening demand peak.
    Peak,
    /// Neither peak nor off-peak.
    Standard,
    /// Overnight low-demand period.
    OffPeak,
}

impl TariffPeriod {
    /// All periods, in display order.
    pub fn all() -> &'static [TariffPeriod] {
        &[Self::Peak, Self::Standard, Self::OffPeak]
    }

    /// Uppercase name as it appears in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Peak => "PEAK",
            Self::Standard => "STANDARD",
            Self::OffPeak => "OFF_PEAK",
        }
    }
}

impl std::fmt::Display for TariffPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time at minute resolution, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// From hour and minute. Returns `None` outside `00:00..=23:59`.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(u16::from(hour) * 60 + u16::from(minute)))
        } else {
            None
        }
    }

    /// Minutes since midnight.
    pub fn minute_of_day(&self) -> u16 {
        self.0
    }

    /// Seconds since midnight.
    pub fn second_of_day(&self) -> u32 {
        u32::from(self.0) * 60
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour: u8 = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute: u8 = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
        Self::new(hour, minute).ok_or_else(|| format!("time out of range: {s:?}"))
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// A daily time window, `[start, end)`, wrapping midnight when `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First instant inside the window.
    pub start: ClockTime,
    /// First instant after the window.
    pub end: ClockTime,
}

impl TimeWindow {
    /// Build a window from `HH:MM` components.
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Default evening peak, 18:00-22:00.
    pub fn default_peak() -> Self {
        Self::new(ClockTime(18 * 60), ClockTime(22 * 60))
    }

    /// Default overnight off-peak, 00:00-06:00.
    pub fn default_off_peak() -> Self {
        Self::new(ClockTime(0), ClockTime(6 * 60))
    }

    /// True if start equals end; such a window selects nothing.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the window covers the given wall-clock time.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.contains_second(time.num_seconds_from_midnight())
    }

    fn contains_second(&self, second: u32) -> bool {
        let start = self.start.second_of_day();
        let end = self.end.second_of_day();
        if start < end {
            second >= start && second < end
        } else if start > end {
            second >= start || second < end
        } else {
            false
        }
    }

    /// Whether two windows share any minute of the day.
    ///
    /// Window edges sit on whole minutes, so sampling each minute is exact.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        (0..MINUTES_PER_DAY).any(|m| {
            let s = u32::from(m) * 60;
            self.contains_second(s) && other.contains_second(s)
        })
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Classify a local time against peak and off-peak windows.
pub fn classify(time: NaiveTime, peak: &TimeWindow, off_peak: &TimeWindow) -> TariffPeriod {
    if peak.contains(time) {
        TariffPeriod::Peak
    } else if off_peak.contains(time) {
        TariffPeriod::OffPeak
    } else {
        TariffPeriod::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn period(h: u32, m: u32, s: u32) -> TariffPeriod {
        classify(
            t(h, m, s),
            &TimeWindow::default_peak(),
            &TimeWindow::default_off_peak(),
        )
    }

    #[test]
    fn default_windows() {
        assert_eq!(period(12, 6, 58), TariffPeriod::Standard);
        assert_eq!(period(19, 30, 0), TariffPeriod::Peak);
        assert_eq!(period(3, 0, 0), TariffPeriod::OffPeak);
    }

    #[test]
    fn boundaries_belong_to_later_period() {
        assert_eq!(period(18, 0, 0), TariffPeriod::Peak);
        assert_eq!(period(17, 59, 59), TariffPeriod::Standard);
        assert_eq!(period(22, 0, 0), TariffPeriod::Standard);
        assert_eq!(period(21, 59, 59), TariffPeriod::Peak);
        assert_eq!(period(0, 0, 0), TariffPeriod::OffPeak);
        assert_eq!(period(6, 0, 0), TariffPeriod::Standard);
        assert_eq!(period(5, 59, 59), TariffPeriod::OffPeak);
    }

    #[test]
    fn wrapping_window() {
        let w: TimeWindow = serde_json::from_str(r#"{"start":"22:00","end":"06:00"}"#).unwrap();
        assert!(w.contains(t(23, 0, 0)));
        assert!(w.contains(t(0, 0, 0)));
        assert!(w.contains(t(5, 59, 59)));
        assert!(!w.contains(t(6, 0, 0)));
        assert!(!w.contains(t(21, 59, 59)));
    }

    #[test]
    fn empty_window_contains_nothing() {
        let w = TimeWindow::new(ClockTime(600), ClockTime(600));
        assert!(w.is_empty());
        assert!(!w.contains(t(10, 0, 0)));
    }

    #[test]
    fn overlap_detection() {
        let peak = TimeWindow::default_peak();
        assert!(!peak.overlaps(&TimeWindow::default_off_peak()));
        let late: TimeWindow = serde_json::from_str(r#"{"start":"21:00","end":"06:00"}"#).unwrap();
        assert!(peak.overlaps(&late));
        let adjacent: TimeWindow =
            serde_json::from_str(r#"{"start":"22:00","end":"06:00"}"#).unwrap();
        assert!(!peak.overlaps(&adjacent));
    }

    #[test]
    fn clock_time_parsing() {
        assert_eq!("07:05".parse::<ClockTime>().unwrap().minute_of_day(), 425);
        assert_eq!(ClockTime::new(7, 5).unwrap().to_string(), "07:05");
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("7".parse::<ClockTime>().is_err());
        assert!("ab:cd".parse::<ClockTime>().is_err());
    }

    #[test]
    fn period_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&TariffPeriod::OffPeak).unwrap(),
            "\"OFF_PEAK\""
        );
    }
}
