//! Reply attribute construction
//!
//! Pure translation of a granted entitlement into the flat attribute map
//! the gateway hands to the NAS. No I/O, no mutation; everything here is
//! derived from state the evaluator already resolved.

use crate::evaluator::Entitlement;
use crate::subscriber::CredentialKind;
use rlm_proto::{keys, AttributeMap};

/// Idle disconnect, seconds, fixed for every accept
pub const IDLE_TIMEOUT_SECONDS: u64 = 1800;

/// Hotspot user profile assigned on the NAS
const HOTSPOT_GROUP: &str = "default";

/// Build the accept attribute set for an entitlement
///
/// PPPoE gets PPP framing plus the package address pool; hotspot gets the
/// captive-portal profile, PAP auth and the device cap. Session-Timeout is
/// the full package window for customers but the shrinking remainder for
/// vouchers, so a re-authentication mid-window never restarts the clock.
pub fn build_accept_attributes(entitlement: &Entitlement) -> AttributeMap {
    let mut attributes = AttributeMap::new();

    if let Some(password) = entitlement.cleartext_password() {
        attributes.set_str(keys::CLEARTEXT_PASSWORD, password);
    }

    if let Some(package) = entitlement.package() {
        attributes.set_str(keys::RATE_LIMIT, package.rate_limit().to_string());

        match entitlement.remaining_millis {
            Some(remaining) => {
                attributes.set_u64(keys::SESSION_TIMEOUT, (remaining / 1000).max(0) as u64);
            }
            None => {
                attributes.set_u64(keys::SESSION_TIMEOUT, package.window_seconds());
            }
        }
    }

    attributes.set_u64(keys::IDLE_TIMEOUT, IDLE_TIMEOUT_SECONDS);

    match entitlement.kind {
        CredentialKind::Pppoe => {
            attributes.set_str(keys::FRAMED_PROTOCOL, "PPP");
            if let Some(pool) = entitlement.package().and_then(|p| p.address_pool.as_deref()) {
                attributes.set_str(keys::FRAMED_POOL, pool);
            }
        }
        CredentialKind::Hotspot => {
            attributes.set_str(keys::HOTSPOT_GROUP, HOTSPOT_GROUP);
            attributes.set_str(keys::AUTH_TYPE, "PAP");
            attributes.set_str(keys::SERVICE_TYPE, "Framed-User");
            attributes.set_str(keys::FRAMED_PROTOCOL, "PPP");
            if let Some(max) = entitlement.package().and_then(|p| p.max_devices) {
                attributes.set_u64(keys::HOTSPOT_MAX_SESSIONS, u64::from(max));
            }
        }
    }

    attributes
}
