//! RLM REST dialect types
//!
//! This crate provides the request and reply types spoken between a RADIUS
//! server's REST module and the decision backend. The module expands RADIUS
//! attributes into flat JSON/form bodies on the way in; on the way out it
//! expects a flat `namespace:Name` attribute object, where `control:` keys
//! steer the RADIUS server and `reply:` keys are forwarded to the NAS.
//!
//! # Features
//!
//! - Typed request bodies for all six gateway stages
//! - Accept/reject decision shapes with the `control:Auth-Type` convention
//! - Package duration arithmetic (MINUTE through YEAR)
//! - RouterOS `Mikrotik-Rate-Limit` string construction
//!
//! # Example
//!
//! ```rust
//! use rlm_proto::{keys, AttributeMap, Decision};
//!
//! let mut attrs = AttributeMap::new();
//! attrs.set_str(keys::FRAMED_POOL, "pppoe-pool");
//! attrs.set_u64(keys::SESSION_TIMEOUT, 2_592_000);
//!
//! let wire = Decision::Accept(attrs).into_attributes();
//! assert_eq!(wire.get_u64(keys::SESSION_TIMEOUT), Some(2_592_000));
//! ```

pub mod accounting;
pub mod attributes;
pub mod duration;
pub mod ratelimit;
pub mod request;
pub mod response;

pub use accounting::{AcctStatusType, UnhandledStatusType};
pub use attributes::{keys, AttributeMap};
pub use duration::{window_millis, window_seconds, DurationUnit, InvalidDurationUnit};
pub use ratelimit::{mbps_to_bps, Burst, RateLimit};
pub use request::{
    AccountingRequest, AuthenticateRequest, AuthorizeRequest, CheckSimulRequest, PostAuthRequest,
    PreacctRequest,
};
pub use response::Decision;
