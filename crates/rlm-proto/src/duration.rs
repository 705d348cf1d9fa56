//! Package duration units and consumption-window arithmetic
//!
//! Billing packages express their entitlement length as a count of a named
//! unit (e.g. `30 MINUTE`, `2 DAY`). The unit table below is fixed: month and
//! year are calendar approximations (30 and 365 days) and must stay that way
//! so session timeouts agree with what the billing system sold.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Duration unit attached to a package's `duration` count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DurationUnit {
    /// 60 seconds
    Minute,
    /// 3600 seconds
    Hour,
    /// 86400 seconds
    Day,
    /// 604800 seconds
    Week,
    /// 30 days (approximate)
    Month,
    /// 365 days (approximate)
    Year,
}

/// Error returned when a duration unit string is not recognized
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid duration unit: {0}")]
pub struct InvalidDurationUnit(pub String);

impl DurationUnit {
    /// Seconds in one unit
    pub fn seconds(self) -> u64 {
        match self {
            DurationUnit::Minute => 60,
            DurationUnit::Hour => 3_600,
            DurationUnit::Day => 86_400,
            DurationUnit::Week => 604_800,
            DurationUnit::Month => 30 * 86_400,
            DurationUnit::Year => 365 * 86_400,
        }
    }

    /// Canonical uppercase name as stored by the billing system
    pub fn as_str(self) -> &'static str {
        match self {
            DurationUnit::Minute => "MINUTE",
            DurationUnit::Hour => "HOUR",
            DurationUnit::Day => "DAY",
            DurationUnit::Week => "WEEK",
            DurationUnit::Month => "MONTH",
            DurationUnit::Year => "YEAR",
        }
    }
}

impl std::str::FromStr for DurationUnit {
    type Err = InvalidDurationUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MINUTE" => Ok(DurationUnit::Minute),
            "HOUR" => Ok(DurationUnit::Hour),
            "DAY" => Ok(DurationUnit::Day),
            "WEEK" => Ok(DurationUnit::Week),
            "MONTH" => Ok(DurationUnit::Month),
            "YEAR" => Ok(DurationUnit::Year),
            other => Err(InvalidDurationUnit(other.to_string())),
        }
    }
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total seconds in a window of `count` units
pub fn window_seconds(count: u32, unit: DurationUnit) -> u64 {
    u64::from(count) * unit.seconds()
}

/// Total milliseconds in a window of `count` units
///
/// Voucher consumption windows are compared against millisecond-precision
/// timestamps, so remaining-time math happens in milliseconds.
pub fn window_millis(count: u32, unit: DurationUnit) -> i64 {
    window_seconds(count, unit) as i64 * 1_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_unit_seconds_table() {
        assert_eq!(DurationUnit::Minute.seconds(), 60);
        assert_eq!(DurationUnit::Hour.seconds(), 3_600);
        assert_eq!(DurationUnit::Day.seconds(), 86_400);
        assert_eq!(DurationUnit::Week.seconds(), 604_800);
        assert_eq!(DurationUnit::Month.seconds(), 2_592_000);
        assert_eq!(DurationUnit::Year.seconds(), 31_536_000);
    }

    #[test]
    fn test_window_seconds() {
        // Scenarios the NAS-facing session timeout is derived from
        assert_eq!(window_seconds(2, DurationUnit::Day), 172_800);
        assert_eq!(window_seconds(1, DurationUnit::Hour), 3_600);
        assert_eq!(window_seconds(30, DurationUnit::Minute), 1_800);
    }

    #[test]
    fn test_window_millis() {
        assert_eq!(window_millis(30, DurationUnit::Minute), 1_800_000);
        assert_eq!(window_millis(1, DurationUnit::Month), 2_592_000_000);
    }

    #[test]
    fn test_from_str_roundtrip() {
        for unit in [
            DurationUnit::Minute,
            DurationUnit::Hour,
            DurationUnit::Day,
            DurationUnit::Week,
            DurationUnit::Month,
            DurationUnit::Year,
        ] {
            assert_eq!(DurationUnit::from_str(unit.as_str()), Ok(unit));
        }

        assert!(DurationUnit::from_str("FORTNIGHT").is_err());
        // Lowercase is not accepted; the billing system stores uppercase
        assert!(DurationUnit::from_str("minute").is_err());
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&DurationUnit::Week).unwrap();
        assert_eq!(json, "\"WEEK\"");

        let unit: DurationUnit = serde_json::from_str("\"MONTH\"").unwrap();
        assert_eq!(unit, DurationUnit::Month);
    }
}
