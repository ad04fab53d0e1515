//! Time primitives.
//!
//! All timestamps in the engine are plain integers — `unix_ms` for calls and
//! plan windows, `unix_sec` for candles — never wall-clock. Nothing in this
//! crate calls `SystemTime::now()` or `chrono::Utc::now()` on the replay hot
//! path; the only place real time enters is run metadata (`startedAt`).

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type UnixMs = i64;

/// Seconds since the Unix epoch.
pub type UnixSec = i64;

pub const MS_PER_SEC: i64 = 1_000;

#[inline]
pub fn ms_to_sec(ms: UnixMs) -> UnixSec {
    ms.div_euclid(MS_PER_SEC)
}

#[inline]
pub fn sec_to_ms(sec: UnixSec) -> UnixMs {
    sec * MS_PER_SEC
}

/// Supported candle intervals. A closed set — anything else is a
/// `ConfigurationError` at the Planner boundary (§4.C Failure modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Sec15,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl Interval {
    /// Number of seconds per bar for this interval.
    #[inline]
    pub fn seconds_per_bar(&self) -> i64 {
        match self {
            Interval::Sec15 => 15,
            Interval::OneMinute => 60,
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::OneHour => 3_600,
            Interval::FourHours => 14_400,
            Interval::OneDay => 86_400,
        }
    }

    /// Parse from the canonical string form used in configs/CLI (`"15s"`,
    /// `"1m"`, `"5m"`, `"15m"`, `"1H"`, `"4H"`, `"1D"`). Returns `None` for
    /// anything outside the closed set, which the caller turns into a
    /// `ConfigurationError`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "15s" => Some(Interval::Sec15),
            "1m" => Some(Interval::OneMinute),
            "5m" => Some(Interval::FiveMinutes),
            "15m" => Some(Interval::FifteenMinutes),
            "1H" => Some(Interval::OneHour),
            "4H" => Some(Interval::FourHours),
            "1D" => Some(Interval::OneDay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Sec15 => "15s",
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1H",
            Interval::FourHours => "4H",
            Interval::OneDay => "1D",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_per_bar() {
        assert_eq!(Interval::Sec15.seconds_per_bar(), 15);
        assert_eq!(Interval::OneMinute.seconds_per_bar(), 60);
        assert_eq!(Interval::OneDay.seconds_per_bar(), 86_400);
    }

    #[test]
    fn test_parse_round_trip() {
        for s in ["15s", "1m", "5m", "15m", "1H", "4H", "1D"] {
            let iv = Interval::parse(s).expect("known interval");
            assert_eq!(iv.as_str(), s);
        }
        assert!(Interval::parse("3m").is_none());
    }

    #[test]
    fn test_ms_sec_conversion() {
        assert_eq!(ms_to_sec(1_700_000_123), 1_700_000);
        assert_eq!(sec_to_ms(1_700_000), 1_700_000_000);
    }
}
