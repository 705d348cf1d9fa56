//! Reply/control attribute maps
//!
//! The gateway consumes decisions as a flat JSON object whose keys carry a
//! namespace prefix: `control:` items steer the RADIUS server itself
//! (authentication directives), `reply:` items are forwarded to the NAS in
//! the Access-Accept. Values are strings or integers; the NAS coerces as
//! needed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute key names understood by the gateway
pub mod keys {
    /// Authentication directive: `Accept`, `Reject`, or a module name (`PAP`)
    pub const AUTH_TYPE: &str = "control:Auth-Type";
    /// Stored password handed to the RADIUS server for PAP/CHAP verification
    pub const CLEARTEXT_PASSWORD: &str = "control:Cleartext-Password";

    /// Human-readable text shown on reject
    pub const REPLY_MESSAGE: &str = "reply:Reply-Message";
    /// Maximum session length in seconds
    pub const SESSION_TIMEOUT: &str = "reply:Session-Timeout";
    /// Idle disconnect in seconds
    pub const IDLE_TIMEOUT: &str = "reply:Idle-Timeout";
    /// RouterOS bandwidth cap string
    pub const RATE_LIMIT: &str = "reply:Mikrotik-Rate-Limit";
    /// Address pool the NAS should allocate the framed IP from
    pub const FRAMED_POOL: &str = "reply:Framed-Pool";
    /// Link framing, `PPP` for both access methods here
    pub const FRAMED_PROTOCOL: &str = "reply:Framed-Protocol";
    /// RADIUS service type, `Framed-User` for hotspot logins
    pub const SERVICE_TYPE: &str = "reply:Service-Type";
    /// RouterOS user profile applied to hotspot sessions
    pub const HOTSPOT_GROUP: &str = "reply:Mikrotik-Group";
    /// Concurrent device cap for a hotspot account
    pub const HOTSPOT_MAX_SESSIONS: &str = "reply:Mikrotik-Hotspot-Max-Sessions";
}

/// Flat `namespace:Name` → value map returned to the gateway
///
/// Keys are kept sorted so serialized responses are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, Value>);

impl AttributeMap {
    pub fn new() -> Self {
        AttributeMap(BTreeMap::new())
    }

    /// Set a string-valued attribute
    pub fn set_str(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), Value::String(value.into()));
    }

    /// Set an integer-valued attribute
    pub fn set_u64(&mut self, key: &str, value: u64) {
        self.0.insert(key.to_string(), Value::from(value));
    }

    /// Look up an attribute value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a string attribute, `None` when absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up an integer attribute, `None` when absent or not an integer
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}
