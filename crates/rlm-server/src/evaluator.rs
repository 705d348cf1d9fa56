//! Entitlement evaluation
//!
//! Decides whether a presented identifier may get network access right now.
//! Resolution order: customer credential pairs first, then voucher codes.
//! Customers are time-unlimited until explicit expiry or deactivation;
//! vouchers carry a consumption window anchored at first use plus an
//! absolute purchase-time deadline, and both checks must pass.
//!
//! The one mutation here: a voucher whose window has run out is flipped to
//! EXPIRED so later attempts fail the cheaper status check.

use crate::directory::{DirectoryError, SubscriberDirectory};
use crate::subscriber::{
    CredentialKind, CustomerRecord, CustomerStatus, Package, Subscriber, VoucherRecord,
    VoucherStatus,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UserNotFound,
    AccountInactive,
    AccountExpired,
    VoucherNotActive,
    VoucherExpired,
    VoucherDurationExpired,
    InvalidVoucherCode,
    InvalidCredentials,
    SessionAlreadyActive,
    MaxDeviceLimitReached,
    VoucherAlreadyUsed,
    InternalError,
}

impl RejectReason {
    /// Stable machine-readable code, used in logs and audit records
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::UserNotFound => "USER_NOT_FOUND",
            RejectReason::AccountInactive => "ACCOUNT_INACTIVE",
            RejectReason::AccountExpired => "ACCOUNT_EXPIRED",
            RejectReason::VoucherNotActive => "VOUCHER_NOT_ACTIVE",
            RejectReason::VoucherExpired => "VOUCHER_EXPIRED",
            RejectReason::VoucherDurationExpired => "VOUCHER_DURATION_EXPIRED",
            RejectReason::InvalidVoucherCode => "INVALID_VOUCHER_CODE",
            RejectReason::InvalidCredentials => "INVALID_CREDENTIALS",
            RejectReason::SessionAlreadyActive => "SESSION_ALREADY_ACTIVE",
            RejectReason::MaxDeviceLimitReached => "MAX_DEVICE_LIMIT_REACHED",
            RejectReason::VoucherAlreadyUsed => "VOUCHER_ALREADY_USED",
            RejectReason::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Human-readable text placed in `reply:Reply-Message`
    ///
    /// The NAS only acts on the Reject signal; this is for captive-portal
    /// display and operator eyes. Never includes internal detail.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::UserNotFound => "User not found",
            RejectReason::AccountInactive => "Account is not active",
            RejectReason::AccountExpired => "Account has expired",
            RejectReason::VoucherNotActive => "Voucher is not active",
            RejectReason::VoucherExpired => "Voucher has expired",
            RejectReason::VoucherDurationExpired => "Voucher duration has been used up",
            RejectReason::InvalidVoucherCode => "Invalid voucher code",
            RejectReason::InvalidCredentials => "Invalid username or password",
            RejectReason::SessionAlreadyActive => "Session already active",
            RejectReason::MaxDeviceLimitReached => "Maximum device limit reached",
            RejectReason::VoucherAlreadyUsed => "Voucher has already been used",
            RejectReason::InternalError => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A granted entitlement: the resolved subscriber, which credential pair
/// matched, and the remaining consumption window for vouchers
#[derive(Debug, Clone)]
pub struct Entitlement {
    pub subscriber: Subscriber,
    pub kind: CredentialKind,
    /// `None` for customers (no ceiling), `Some` for vouchers
    pub remaining_millis: Option<i64>,
}

impl Entitlement {
    pub fn package(&self) -> Option<&Package> {
        match &self.subscriber {
            Subscriber::Customer(c) => c.package.as_ref(),
            Subscriber::Voucher(v) => Some(&v.package),
        }
    }

    /// Password the NAS should validate the connection against
    pub fn cleartext_password(&self) -> Option<&str> {
        match &self.subscriber {
            Subscriber::Customer(c) => c.password_for(self.kind),
            Subscriber::Voucher(v) => Some(v.code.as_str()),
        }
    }

    /// Strict credential check for the authenticate phase
    ///
    /// Voucher mismatches get their own reason so the portal can tell a
    /// mistyped code apart from a wrong account password.
    pub fn verify_password(&self, presented: Option<&str>) -> Result<(), RejectReason> {
        match &self.subscriber {
            Subscriber::Customer(c) => match (c.password_for(self.kind), presented) {
                (Some(stored), Some(given)) if stored == given => Ok(()),
                _ => Err(RejectReason::InvalidCredentials),
            },
            Subscriber::Voucher(v) => match presented {
                Some(given) if given == v.code => Ok(()),
                _ => Err(RejectReason::InvalidVoucherCode),
            },
        }
    }
}

/// Outcome of an entitlement evaluation
#[derive(Debug, Clone)]
pub enum Evaluation {
    Accept(Entitlement),
    Reject(RejectReason),
}

impl Evaluation {
    pub fn is_accept(&self) -> bool {
        matches!(self, Evaluation::Accept(_))
    }
}

/// Evaluates identifiers against the subscriber directory
pub struct Evaluator {
    directory: Arc<dyn SubscriberDirectory>,
}

impl Evaluator {
    pub fn new(directory: Arc<dyn SubscriberDirectory>) -> Self {
        Evaluator { directory }
    }

    /// Decide access for `username` as of `now`
    ///
    /// Directory faults surface as `Err`; the caller maps them to the
    /// fail-closed or fail-open policy of its protocol phase.
    pub async fn evaluate(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, DirectoryError> {
        let Some(subscriber) = self.directory.find_by_username(username).await? else {
            return Ok(Evaluation::Reject(RejectReason::UserNotFound));
        };

        match subscriber {
            Subscriber::Customer(customer) => Ok(evaluate_customer(customer, username, now)),
            Subscriber::Voucher(voucher) => Ok(self.evaluate_voucher(voucher, now).await),
        }
    }

    async fn evaluate_voucher(&self, voucher: VoucherRecord, now: DateTime<Utc>) -> Evaluation {
        if voucher.status != VoucherStatus::Active {
            return Evaluation::Reject(RejectReason::VoucherNotActive);
        }

        if let Some(expires_at) = voucher.expires_at {
            if now > expires_at {
                return Evaluation::Reject(RejectReason::VoucherExpired);
            }
        }

        let window_millis = voucher.package.window_millis();
        let remaining = match voucher.last_used_at {
            Some(anchor) => {
                let elapsed = now.signed_duration_since(anchor).num_milliseconds();
                window_millis - elapsed
            }
            // Unanchored: full window available, anchoring happens on the
            // first accounting Start, not here
            None => window_millis,
        };

        if remaining <= 0 {
            // The reject stands even if the status write fails; the next
            // attempt re-derives the same outcome from the anchor.
            if let Err(e) = self
                .directory
                .set_voucher_status(&voucher.code, VoucherStatus::Expired)
                .await
            {
                warn!(voucher = %voucher.code, error = %e, "failed to mark voucher expired");
            } else {
                info!(voucher = %voucher.code, "voucher consumption window exhausted");
            }
            return Evaluation::Reject(RejectReason::VoucherDurationExpired);
        }

        Evaluation::Accept(Entitlement {
            subscriber: Subscriber::Voucher(voucher),
            kind: CredentialKind::Hotspot,
            remaining_millis: Some(remaining),
        })
    }
}

fn evaluate_customer(customer: CustomerRecord, username: &str, now: DateTime<Utc>) -> Evaluation {
    if customer.status != CustomerStatus::Active {
        return Evaluation::Reject(RejectReason::AccountInactive);
    }

    if let Some(expiry) = customer.expiry_date {
        if now > expiry {
            return Evaluation::Reject(RejectReason::AccountExpired);
        }
    }

    // The directory matched this record by one of its credential pairs, so
    // a miss here means the record changed between lookup and evaluation
    let Some(kind) = customer.credential_kind(username) else {
        return Evaluation::Reject(RejectReason::UserNotFound);
    };

    Evaluation::Accept(Entitlement {
        subscriber: Subscriber::Customer(customer),
        kind,
        remaining_millis: None,
    })
}
