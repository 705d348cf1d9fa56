//! Audit logging for access decisions
//!
//! JSON-lines records of every accept, reject and accounting event, for
//! billing disputes and abuse forensics. Separate from the tracing output:
//! this file is the durable trail, tracing is operator diagnostics.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Authorize accepted with attributes
    AuthorizeAccept,
    /// Authorize rejected
    AuthorizeReject,
    /// Authenticate credential check passed
    AuthenticateAccept,
    /// Authenticate credential check failed
    AuthenticateReject,
    /// Pre-accounting gate rejected a customer
    PreacctReject,
    /// Accounting Start processed
    AcctStart,
    /// Accounting Interim-Update processed
    AcctInterimUpdate,
    /// Accounting Stop processed
    AcctStop,
    /// Simultaneous-use check rejected
    CheckSimulReject,
    /// Post-authentication acknowledgment
    PostAuth,
    /// Server started
    ServerStart,
    /// Server stopped
    ServerStop,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Timestamp (Unix epoch seconds)
    pub timestamp: u64,
    /// ISO 8601 formatted timestamp
    pub timestamp_iso: String,
    /// Event type
    pub event_type: AuditEventType,
    /// Presented username or voucher code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// NAS the request came through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nas_ip: Option<String>,
    /// Accounting session id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Reject reason code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// What the ledger did with an accounting event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Server version
    pub server_version: String,
}

impl AuditEntry {
    /// Create a new audit entry stamped with the current time
    pub fn new(event_type: AuditEventType) -> Self {
        let now = Utc::now();

        AuditEntry {
            timestamp: now.timestamp().max(0) as u64,
            timestamp_iso: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            event_type,
            username: None,
            nas_ip: None,
            session_id: None,
            reason: None,
            outcome: None,
            details: None,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_nas_ip(mut self, nas_ip: impl Into<String>) -> Self {
        self.nas_ip = Some(nas_ip.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Audit logger
///
/// Writes one JSON object per line. A logger constructed without a path is
/// a no-op, so call sites never need to branch on configuration.
pub struct AuditLogger {
    file_path: Option<String>,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl AuditLogger {
    pub fn new(file_path: Option<String>) -> std::io::Result<Self> {
        let file = if let Some(ref path) = file_path {
            let f = OpenOptions::new().create(true).append(true).open(path)?;
            Some(Arc::new(Mutex::new(f)))
        } else {
            None
        };

        Ok(AuditLogger { file_path, file })
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditEntry) {
        if let Some(ref file) = self.file {
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    let mut f = file.lock().await;
                    if let Err(e) = writeln!(f, "{}", json) {
                        error!("Failed to write audit log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize audit entry: {}", e);
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_audit_entry_creation() {
        let entry = AuditEntry::new(AuditEventType::AuthorizeAccept)
            .with_username("cust-1@ppp")
            .with_nas_ip("10.0.0.1")
            .with_session_id("8100015d");

        assert_eq!(entry.username, Some("cust-1@ppp".to_string()));
        assert_eq!(entry.nas_ip, Some("10.0.0.1".to_string()));
        assert_eq!(entry.session_id, Some("8100015d".to_string()));
        assert!(entry.reason.is_none());
    }

    #[test]
    fn test_audit_entry_serialization() {
        let entry = AuditEntry::new(AuditEventType::AuthorizeReject)
            .with_username("ABC123")
            .with_reason("VOUCHER_DURATION_EXPIRED");

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("authorize_reject"));
        assert!(json.contains("ABC123"));
        assert!(json.contains("VOUCHER_DURATION_EXPIRED"));
        // unset optional fields stay out of the record
        assert!(!json.contains("nas_ip"));
    }

    #[tokio::test]
    async fn test_audit_logger_writes_lines() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let logger = AuditLogger::new(Some(path.clone())).unwrap();
        assert!(logger.is_enabled());

        logger
            .log(AuditEntry::new(AuditEventType::AcctStop)
                .with_username("cust-1@ppp")
                .with_outcome("applied"))
            .await;
        logger
            .log(AuditEntry::new(AuditEventType::AcctStop)
                .with_username("cust-1@ppp")
                .with_outcome("duplicate-ignored"))
            .await;

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("acct_stop"));
        assert!(contents.contains("duplicate-ignored"));
    }

    #[test]
    fn test_audit_logger_disabled() {
        let logger = AuditLogger::new(None).unwrap();
        assert!(!logger.is_enabled());
    }
}
