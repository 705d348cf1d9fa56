//! Decision shapes returned to the gateway
//!
//! Both outcomes are HTTP 200: an accept is the bare attribute map, a reject
//! is a map that steers the RADIUS server with `control:Auth-Type = Reject`.
//! Internal failures are not expressed here; the HTTP layer returns 500 and
//! the gateway applies its own module-failure policy.

use crate::attributes::{keys, AttributeMap};

/// Outcome of an authorize, authenticate, preacct or checksimul call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Grant access, forwarding the contained attributes
    Accept(AttributeMap),
    /// Deny access with an optional human-readable reason
    Reject { message: Option<String> },
}

impl Decision {
    /// Accept with no attributes, the shape accounting and post-auth return
    pub fn accept_empty() -> Self {
        Decision::Accept(AttributeMap::new())
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Decision::Reject {
            message: Some(message.into()),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept(_))
    }

    /// Flatten into the wire attribute map
    pub fn into_attributes(self) -> AttributeMap {
        match self {
            Decision::Accept(attrs) => attrs,
            Decision::Reject { message } => {
                let mut attrs = AttributeMap::new();
                attrs.set_str(keys::AUTH_TYPE, "Reject");
                if let Some(message) = message {
                    attrs.set_str(keys::REPLY_MESSAGE, message);
                }
                attrs
            }
        }
    }
}
