//! Subscriber records served by the directory
//!
//! Two kinds of subscriber exist: registered customers managed by the
//! billing system (fixed-line PPPoE and/or hotspot credentials) and prepaid
//! vouchers (single-use codes sold at the counter). Both carry a package
//! describing the entitlement shape. Records are read-mostly here; only the
//! voucher consumption anchor and status transitions are written by this
//! service.

use chrono::{DateTime, Utc};
use rlm_proto::{window_millis, window_seconds, DurationUnit, RateLimit};
use serde::{Deserialize, Serialize};

/// Registered-customer lifecycle status, owned by the billing system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Expired,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "ACTIVE",
            CustomerStatus::Inactive => "INACTIVE",
            CustomerStatus::Expired => "EXPIRED",
        }
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CustomerStatus::Active),
            "INACTIVE" => Ok(CustomerStatus::Inactive),
            "EXPIRED" => Ok(CustomerStatus::Expired),
            other => Err(format!("unknown customer status: {other}")),
        }
    }
}

/// Voucher lifecycle status
///
/// PENDING→ACTIVE happens on payment confirmation (external). ACTIVE→EXPIRED
/// and ACTIVE→USED are the only transitions this service performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoucherStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Used,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Pending => "PENDING",
            VoucherStatus::Active => "ACTIVE",
            VoucherStatus::Expired => "EXPIRED",
            VoucherStatus::Cancelled => "CANCELLED",
            VoucherStatus::Used => "USED",
        }
    }
}

impl std::str::FromStr for VoucherStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(VoucherStatus::Pending),
            "ACTIVE" => Ok(VoucherStatus::Active),
            "EXPIRED" => Ok(VoucherStatus::Expired),
            "CANCELLED" => Ok(VoucherStatus::Cancelled),
            "USED" => Ok(VoucherStatus::Used),
            other => Err(format!("unknown voucher status: {other}")),
        }
    }
}

/// Entitlement shape assigned to a customer or voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Downstream cap in Mbps
    pub download_mbps: u32,
    /// Upstream cap in Mbps
    pub upload_mbps: u32,
    /// Consumption window length, `duration` counts of `duration_unit`
    pub duration: u32,
    pub duration_unit: DurationUnit,
    #[serde(default)]
    pub burst_download_mbps: Option<u32>,
    #[serde(default)]
    pub burst_upload_mbps: Option<u32>,
    #[serde(default)]
    pub burst_threshold_download_mbps: Option<u32>,
    #[serde(default)]
    pub burst_threshold_upload_mbps: Option<u32>,
    #[serde(default)]
    pub burst_seconds: Option<u32>,
    /// Address pool handed to the NAS, PPPoE only
    #[serde(default)]
    pub address_pool: Option<String>,
    /// Concurrent device cap, hotspot only
    #[serde(default)]
    pub max_devices: Option<u32>,
}

impl Package {
    /// Consumption window in whole seconds
    pub fn window_seconds(&self) -> u64 {
        window_seconds(self.duration, self.duration_unit)
    }

    /// Consumption window in milliseconds, for elapsed-time comparison
    pub fn window_millis(&self) -> i64 {
        window_millis(self.duration, self.duration_unit)
    }

    /// Bandwidth cap with burst parameters filled in where the package sets them
    pub fn rate_limit(&self) -> RateLimit {
        let base = RateLimit::from_mbps(self.upload_mbps, self.download_mbps);
        match (self.burst_upload_mbps, self.burst_download_mbps) {
            (Some(up), Some(down)) => base.with_burst_mbps(
                up,
                down,
                self.burst_threshold_upload_mbps,
                self.burst_threshold_download_mbps,
                self.burst_seconds,
            ),
            _ => base,
        }
    }
}

/// Which credential pair a presented username matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Pppoe,
    Hotspot,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Pppoe => "pppoe",
            CredentialKind::Hotspot => "hotspot",
        }
    }
}

impl std::str::FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pppoe" => Ok(CredentialKind::Pppoe),
            "hotspot" => Ok(CredentialKind::Hotspot),
            other => Err(format!("unknown credential kind: {other}")),
        }
    }
}

/// Registered customer with up to two independent credential pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub status: CustomerStatus,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pppoe_username: Option<String>,
    #[serde(default)]
    pub pppoe_password: Option<String>,
    #[serde(default)]
    pub hotspot_username: Option<String>,
    #[serde(default)]
    pub hotspot_password: Option<String>,
    #[serde(default)]
    pub package: Option<Package>,
}

impl CustomerRecord {
    /// Which credential pair the presented username belongs to, if any
    pub fn credential_kind(&self, username: &str) -> Option<CredentialKind> {
        if self.pppoe_username.as_deref() == Some(username) {
            Some(CredentialKind::Pppoe)
        } else if self.hotspot_username.as_deref() == Some(username) {
            Some(CredentialKind::Hotspot)
        } else {
            None
        }
    }

    /// Stored password for a credential pair
    pub fn password_for(&self, kind: CredentialKind) -> Option<&str> {
        match kind {
            CredentialKind::Pppoe => self.pppoe_password.as_deref(),
            CredentialKind::Hotspot => self.hotspot_password.as_deref(),
        }
    }
}

/// Prepaid voucher, the code doubles as username and password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherRecord {
    pub code: String,
    pub status: VoucherStatus,
    /// Absolute deadline set at purchase time, independent of first use
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Consumption window anchor, null until first accounting Start
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub package: Package,
}

/// Subscriber resolved from a presented username
#[derive(Debug, Clone, PartialEq)]
pub enum Subscriber {
    Customer(CustomerRecord),
    Voucher(VoucherRecord),
}

impl Subscriber {
    pub fn username(&self) -> &str {
        match self {
            Subscriber::Customer(c) => c.id.as_str(),
            Subscriber::Voucher(v) => v.code.as_str(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_credential_kind_resolution() {
        let record = customer("cust-1");
        assert_eq!(
            record.credential_kind("cust-1@ppp"),
            Some(CredentialKind::Pppoe)
        );
        assert_eq!(
            record.credential_kind("cust-1@hs"),
            Some(CredentialKind::Hotspot)
        );
        assert_eq!(record.credential_kind("someone-else"), None);
    }

    #[test]
    fn test_password_for_pair() {
        let record = customer("cust-1");
        assert_eq!(
            record.password_for(CredentialKind::Pppoe),
            Some("ppp-secret")
        );
        assert_eq!(
            record.password_for(CredentialKind::Hotspot),
            Some("hs-secret")
        );

        let mut bare = record.clone();
        bare.hotspot_password = None;
        assert_eq!(bare.password_for(CredentialKind::Hotspot), None);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&CustomerStatus::Inactive).unwrap(),
            "\"INACTIVE\""
        );
        assert_eq!(
            serde_json::from_str::<VoucherStatus>("\"USED\"").unwrap(),
            VoucherStatus::Used
        );
        assert_eq!(VoucherStatus::Cancelled.as_str(), "CANCELLED");
    }

    #[test]
    fn test_package_window() {
        let package = hotspot_package(1);
        assert_eq!(package.window_seconds(), 1800);
        assert_eq!(package.window_millis(), 1_800_000);
    }

    #[test]
    fn test_package_rate_limit_with_burst_defaults() {
        let mut package = hotspot_package(1);
        package.burst_download_mbps = Some(20);
        package.burst_upload_mbps = Some(10);

        let limit = package.rate_limit();
        assert_eq!(
            limit.to_string(),
            "5000000/10000000 10000000/20000000 4000000/8000000 8/8"
        );
    }

    #[test]
    fn test_package_ignores_partial_burst() {
        let mut package = hotspot_package(1);
        package.burst_download_mbps = Some(20);
        // Upload burst unset, so no burst group at all
        assert_eq!(package.rate_limit().to_string(), "5000000/10000000");
    }
}
