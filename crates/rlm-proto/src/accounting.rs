//! Accounting status types
//!
//! The gateway transliterates Acct-Status-Type into the strings the RADIUS
//! server uses in its own dictionaries. Only the session-scoped values take
//! part in usage tracking; anything else (NAS reboots announce
//! `Accounting-On` / `Accounting-Off`) is acknowledged without touching
//! session state.
//!
//! # Example
//!
//! ```rust
//! use rlm_proto::accounting::AcctStatusType;
//!
//! let status: AcctStatusType = "Interim-Update".parse().unwrap();
//! assert_eq!(status, AcctStatusType::InterimUpdate);
//! assert!(!status.is_terminal());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Session-scoped accounting status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcctStatusType {
    /// Session has begun
    Start,
    /// Periodic usage snapshot for a running session
    InterimUpdate,
    /// Session has ended, counters are final
    Stop,
}

impl AcctStatusType {
    /// Dictionary string for this status type
    pub fn as_str(&self) -> &'static str {
        match self {
            AcctStatusType::Start => "Start",
            AcctStatusType::InterimUpdate => "Interim-Update",
            AcctStatusType::Stop => "Stop",
        }
    }

    /// Whether this status closes the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcctStatusType::Stop)
    }
}

impl fmt::Display for AcctStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Acct-Status-Type value outside the session-scoped set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unhandled Acct-Status-Type: {0:?}")]
pub struct UnhandledStatusType(pub String);

impl FromStr for AcctStatusType {
    type Err = UnhandledStatusType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Start" => Ok(AcctStatusType::Start),
            "Interim-Update" => Ok(AcctStatusType::InterimUpdate),
            "Stop" => Ok(AcctStatusType::Stop),
            other => Err(UnhandledStatusType(other.to_string())),
        }
    }
}
