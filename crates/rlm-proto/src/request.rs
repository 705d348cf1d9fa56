//! Request bodies posted by the RADIUS-to-REST gateway
//!
//! The gateway expands RADIUS attributes into either a JSON object or a
//! form-urlencoded body depending on how the module is configured. Numeric
//! attributes arrive as JSON numbers in one mode and as decimal strings in
//! the other, so the counter fields accept both.

use crate::accounting::{AcctStatusType, UnhandledStatusType};
use serde::{Deserialize, Deserializer};

/// Access-Request attributes relayed at the authorize stage
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub nas_ip_address: Option<String>,
    #[serde(default, deserialize_with = "opt_u32_lenient")]
    pub nas_port: Option<u32>,
}

/// Credential pair checked at the authenticate stage
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Pre-accounting lookup, sent before any accounting packet is processed
#[derive(Debug, Clone, Deserialize)]
pub struct PreacctRequest {
    pub username: String,
    #[serde(default)]
    pub nas_ip_address: Option<String>,
}

/// Accounting-Request attributes for Start, Interim-Update and Stop packets
///
/// Octet counters are 32-bit on the wire; the matching gigawords field
/// counts how many times the 32-bit counter wrapped.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountingRequest {
    pub username: String,
    /// Raw Acct-Status-Type string, parse with [`AccountingRequest::status_type`]
    pub acct_status_type: String,
    #[serde(default)]
    pub acct_session_id: Option<String>,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_input_octets: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_output_octets: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_input_packets: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_output_packets: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_input_gigawords: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_output_gigawords: u64,
    /// Session length so far in seconds
    #[serde(default, deserialize_with = "u64_lenient")]
    pub acct_session_time: u64,
    #[serde(default)]
    pub nas_ip_address: Option<String>,
    #[serde(default, deserialize_with = "opt_u32_lenient")]
    pub nas_port: Option<u32>,
    #[serde(default)]
    pub framed_ip_address: Option<String>,
    #[serde(default)]
    pub calling_station_id: Option<String>,
    #[serde(default)]
    pub called_station_id: Option<String>,
    #[serde(default)]
    pub acct_terminate_cause: Option<String>,
    #[serde(default)]
    pub acct_authentic: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub framed_protocol: Option<String>,
    #[serde(default, deserialize_with = "opt_u32_lenient")]
    pub framed_mtu: Option<u32>,
    #[serde(default)]
    pub connect_info: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl AccountingRequest {
    /// Parse the Acct-Status-Type field into the session-scoped set
    pub fn status_type(&self) -> Result<AcctStatusType, UnhandledStatusType> {
        self.acct_status_type.parse()
    }
}

/// Simultaneous-use check for a username
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSimulRequest {
    pub username: String,
}

/// Post-auth notification carrying the final decision text
#[derive(Debug, Clone, Deserialize)]
pub struct PostAuthRequest {
    pub username: String,
    #[serde(default)]
    pub reply_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

fn u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) if s.is_empty() => Ok(0),
        NumOrStr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn opt_u32_lenient<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(
            u32::try_from(n).map_err(serde::de::Error::custom)?,
        )),
        Some(NumOrStr::Str(s)) if s.is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting_from_json_numbers() {
        let req: AccountingRequest = serde_json::from_str(
            r#"{
                "username": "alice@example.net",
                "acct_status_type": "Interim-Update",
                "acct_session_id": "81700fa2d3a1",
                "acct_input_octets": 1048576,
                "acct_output_octets": 8388608,
                "acct_session_time": 120,
                "nas_port": 15728737
            }"#,
        )
        .unwrap();

        assert_eq!(req.status_type().unwrap(), AcctStatusType::InterimUpdate);
        assert_eq!(req.acct_input_octets, 1_048_576);
        assert_eq!(req.acct_output_octets, 8_388_608);
        assert_eq!(req.acct_session_time, 120);
        assert_eq!(req.nas_port, Some(15_728_737));
        assert_eq!(req.acct_input_gigawords, 0);
    }

    #[test]
    fn test_accounting_from_string_counters() {
        let req: AccountingRequest = serde_json::from_str(
            r#"{
                "username": "WX7K2M",
                "acct_status_type": "Stop",
                "acct_input_octets": "4294967296",
                "acct_output_octets": "",
                "acct_input_gigawords": "1",
                "acct_terminate_cause": "User-Request"
            }"#,
        )
        .unwrap();

        assert_eq!(req.acct_input_octets, 4_294_967_296);
        assert_eq!(req.acct_output_octets, 0);
        assert_eq!(req.acct_input_gigawords, 1);
        assert_eq!(req.acct_terminate_cause.as_deref(), Some("User-Request"));
    }

    #[test]
    fn test_accounting_from_form_body() {
        let req: AccountingRequest = serde_urlencoded::from_str(
            "username=alice%40example.net&acct_status_type=Start&acct_session_id=s1\
             &acct_input_octets=0&nas_port=2",
        )
        .unwrap();

        assert_eq!(req.status_type().unwrap(), AcctStatusType::Start);
        assert_eq!(req.acct_session_id.as_deref(), Some("s1"));
        assert_eq!(req.nas_port, Some(2));
    }

    #[test]
    fn test_unknown_status_type_is_kept_raw() {
        let req: AccountingRequest = serde_json::from_str(
            r#"{"username": "nas", "acct_status_type": "Accounting-On"}"#,
        )
        .unwrap();
        assert!(req.status_type().is_err());
    }

    #[test]
    fn test_authorize_minimal_body() {
        let req: AuthorizeRequest =
            serde_json::from_str(r#"{"username": "alice@example.net"}"#).unwrap();
        assert_eq!(req.username, "alice@example.net");
        assert!(req.password.is_none());
        assert!(req.nas_port.is_none());
    }

    #[test]
    fn test_missing_username_fails() {
        assert!(serde_json::from_str::<AuthorizeRequest>(r#"{"password": "pw"}"#).is_err());
        assert!(serde_json::from_str::<AccountingRequest>(
            r#"{"acct_status_type": "Start"}"#
        )
        .is_err());
    }
}
