//! Session ledger
//!
//! One `Connection` row per registered customer, created by the first
//! accounting event and never deleted. The row carries the live session's
//! identifiers and counters plus lifetime cumulative totals. Vouchers are
//! not tracked here; their only accounting state is the consumption-window
//! anchor kept by the directory.
//!
//! Transitions are pure functions on `Connection` so the dedup rules can be
//! tested without a datastore. Lifetime totals grow in exactly one place:
//! a Stop whose session id still matches the live session. Duplicate and
//! stale Stops are ignored, which keeps NAS retries from double-billing.

pub mod postgres;

pub use postgres::PostgresLedger;

use crate::subscriber::CredentialKind;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rlm_proto::AccountingRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from ledger backends
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt connection row for {0}: {1}")]
    Corrupt(String, String),
}

/// Whether the customer currently has a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Online,
    Offline,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Online => "ONLINE",
            SessionStatus::Offline => "OFFLINE",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(SessionStatus::Online),
            "OFFLINE" => Ok(SessionStatus::Offline),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// What a transition did with an accounting event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event mutated the row
    Applied,
    /// Repeat delivery for a session already in that state
    DuplicateIgnored,
    /// Event references a session that is no longer the live one
    StaleIgnored,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::DuplicateIgnored => "duplicate-ignored",
            ApplyOutcome::StaleIgnored => "stale-ignored",
        };
        f.write_str(s)
    }
}

/// Session fields carried by one accounting event
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub kind: CredentialKind,
    pub session_id: Option<String>,
    pub nas_ip_address: Option<String>,
    pub nas_port: Option<u32>,
    pub framed_ip_address: Option<String>,
    pub calling_station_id: Option<String>,
    pub called_station_id: Option<String>,
    pub framed_protocol: Option<String>,
    pub service_type: Option<String>,
    pub connect_info: Option<String>,
    pub terminate_cause: Option<String>,
    pub input_octets: u64,
    pub output_octets: u64,
    pub input_packets: u64,
    pub output_packets: u64,
    /// 32-bit octet-counter overflow counts
    pub input_gigawords: u64,
    pub output_gigawords: u64,
    pub session_seconds: u64,
}

impl SessionUpdate {
    pub fn from_request(request: &AccountingRequest, kind: CredentialKind) -> Self {
        SessionUpdate {
            kind,
            session_id: request.acct_session_id.clone(),
            nas_ip_address: request.nas_ip_address.clone(),
            nas_port: request.nas_port,
            framed_ip_address: request.framed_ip_address.clone(),
            calling_station_id: request.calling_station_id.clone(),
            called_station_id: request.called_station_id.clone(),
            framed_protocol: request.framed_protocol.clone(),
            service_type: request.service_type.clone(),
            connect_info: request.connect_info.clone(),
            terminate_cause: request.acct_terminate_cause.clone(),
            input_octets: request.acct_input_octets,
            output_octets: request.acct_output_octets,
            input_packets: request.acct_input_packets,
            output_packets: request.acct_output_packets,
            input_gigawords: request.acct_input_gigawords,
            output_gigawords: request.acct_output_gigawords,
            session_seconds: request.acct_session_time,
        }
    }
}

/// Lifetime usage summary for one customer
///
/// Byte totals fold the gigaword overflow counters back in, so they are
/// true 64-bit counts even when the NAS wrapped its 32-bit octet counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub session_seconds: u64,
    pub sessions: u64,
}

/// Per-customer connection row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub customer_id: String,
    pub session_status: SessionStatus,
    /// Which credential pair the live session authenticated with
    pub connection_kind: CredentialKind,
    pub current_session_id: Option<String>,
    pub nas_ip_address: Option<String>,
    pub nas_port: Option<u32>,
    pub framed_ip_address: Option<String>,
    pub calling_station_id: Option<String>,
    pub called_station_id: Option<String>,
    pub framed_protocol: Option<String>,
    pub service_type: Option<String>,
    pub connect_info: Option<String>,
    /// Cause reported by the most recent Stop
    pub terminate_cause: Option<String>,
    pub current_input_octets: u64,
    pub current_output_octets: u64,
    pub current_input_packets: u64,
    pub current_output_packets: u64,
    pub current_input_gigawords: u64,
    pub current_output_gigawords: u64,
    pub current_session_seconds: u64,
    pub total_input_octets: u64,
    pub total_output_octets: u64,
    pub total_input_packets: u64,
    pub total_output_packets: u64,
    pub total_input_gigawords: u64,
    pub total_output_gigawords: u64,
    pub total_session_seconds: u64,
    pub total_sessions: u64,
    pub current_session_start_time: Option<DateTime<Utc>>,
    pub last_session_stop_time: Option<DateTime<Utc>>,
    pub last_update_time: DateTime<Utc>,
}

impl Connection {
    pub fn new(customer_id: &str, kind: CredentialKind, now: DateTime<Utc>) -> Self {
        Connection {
            customer_id: customer_id.to_string(),
            session_status: SessionStatus::Offline,
            connection_kind: kind,
            current_session_id: None,
            nas_ip_address: None,
            nas_port: None,
            framed_ip_address: None,
            calling_station_id: None,
            called_station_id: None,
            framed_protocol: None,
            service_type: None,
            connect_info: None,
            terminate_cause: None,
            current_input_octets: 0,
            current_output_octets: 0,
            current_input_packets: 0,
            current_output_packets: 0,
            current_input_gigawords: 0,
            current_output_gigawords: 0,
            current_session_seconds: 0,
            total_input_octets: 0,
            total_output_octets: 0,
            total_input_packets: 0,
            total_output_packets: 0,
            total_input_gigawords: 0,
            total_output_gigawords: 0,
            total_session_seconds: 0,
            total_sessions: 0,
            current_session_start_time: None,
            last_session_stop_time: None,
            last_update_time: now,
        }
    }

    fn set_session_identity(&mut self, update: &SessionUpdate) {
        self.connection_kind = update.kind;
        self.current_session_id = update.session_id.clone();
        self.nas_ip_address = update.nas_ip_address.clone();
        self.nas_port = update.nas_port;
        self.framed_ip_address = update.framed_ip_address.clone();
        self.calling_station_id = update.calling_station_id.clone();
        self.called_station_id = update.called_station_id.clone();
        self.framed_protocol = update.framed_protocol.clone();
        self.service_type = update.service_type.clone();
        self.connect_info = update.connect_info.clone();
    }

    fn set_current_counters(&mut self, update: &SessionUpdate) {
        self.current_input_octets = update.input_octets;
        self.current_output_octets = update.output_octets;
        self.current_input_packets = update.input_packets;
        self.current_output_packets = update.output_packets;
        self.current_input_gigawords = update.input_gigawords;
        self.current_output_gigawords = update.output_gigawords;
        self.current_session_seconds = update.session_seconds;
    }

    /// Begin a fresh session: new identity, reset counters, count the session
    pub fn apply_start(&mut self, update: &SessionUpdate, now: DateTime<Utc>) -> ApplyOutcome {
        // NAS retry of a Start we already took
        if self.session_status == SessionStatus::Online
            && update.session_id.is_some()
            && self.current_session_id == update.session_id
        {
            return ApplyOutcome::DuplicateIgnored;
        }

        self.session_status = SessionStatus::Online;
        self.set_session_identity(update);
        self.set_current_counters(update);
        self.terminate_cause = None;
        self.total_sessions += 1;
        self.current_session_start_time = Some(now);
        self.last_update_time = now;
        ApplyOutcome::Applied
    }

    /// Refresh the live session's counters; no lifetime accumulation
    ///
    /// An interim whose session already stopped is ignored rather than
    /// resurrecting the row. An interim for a session this row has never
    /// seen adopts it (covers a missed Start), without counting a session.
    pub fn apply_interim(&mut self, update: &SessionUpdate, now: DateTime<Utc>) -> ApplyOutcome {
        if self.session_status == SessionStatus::Offline
            && update.session_id.is_some()
            && self.current_session_id == update.session_id
        {
            return ApplyOutcome::StaleIgnored;
        }

        let adopted = self.session_status == SessionStatus::Offline
            || self.current_session_id != update.session_id;
        if adopted {
            self.session_status = SessionStatus::Online;
            self.set_session_identity(update);
            self.terminate_cause = None;
            // Reconstruct the start from the reported elapsed time
            self.current_session_start_time =
                Some(now - Duration::seconds(update.session_seconds as i64));
        }

        self.set_current_counters(update);
        self.last_update_time = now;
        ApplyOutcome::Applied
    }

    /// End the live session and fold its final counters into the lifetime
    /// totals. This is the only transition that grows the totals, and only
    /// when the Stop's session id still matches the live session.
    pub fn apply_stop(&mut self, update: &SessionUpdate, now: DateTime<Utc>) -> ApplyOutcome {
        if self.current_session_id != update.session_id {
            return ApplyOutcome::StaleIgnored;
        }
        if self.session_status == SessionStatus::Offline {
            return ApplyOutcome::DuplicateIgnored;
        }

        self.set_current_counters(update);
        self.terminate_cause = update.terminate_cause.clone();

        self.total_input_octets += update.input_octets;
        self.total_output_octets += update.output_octets;
        self.total_input_packets += update.input_packets;
        self.total_output_packets += update.output_packets;
        self.total_input_gigawords += update.input_gigawords;
        self.total_output_gigawords += update.output_gigawords;
        self.total_session_seconds += update.session_seconds;

        self.session_status = SessionStatus::Offline;
        self.last_session_stop_time = Some(now);
        self.last_update_time = now;
        ApplyOutcome::Applied
    }

    /// Lifetime totals with gigaword overflow folded in
    pub fn usage_totals(&self) -> UsageTotals {
        UsageTotals {
            input_bytes: self.total_input_octets + (self.total_input_gigawords << 32),
            output_bytes: self.total_output_octets + (self.total_output_gigawords << 32),
            session_seconds: self.total_session_seconds,
            sessions: self.total_sessions,
        }
    }
}

/// Storage for connection rows
///
/// Backends apply the same transition rules as the pure functions above;
/// the Postgres backend expresses them as conditional single-row updates.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn record_start(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError>;

    async fn record_interim(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError>;

    async fn record_stop(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError>;

    async fn connection(&self, customer_id: &str) -> Result<Option<Connection>, LedgerError>;

    /// Backend health check for the readiness probe
    async fn ping(&self) -> Result<(), LedgerError>;
}

/// In-memory ledger for development and tests
pub struct MemoryLedger {
    connections: Arc<DashMap<String, Connection>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger {
            connections: Arc::new(DashMap::new()),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionLedger for MemoryLedger {
    async fn record_start(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError> {
        let mut entry = self
            .connections
            .entry(customer_id.to_string())
            .or_insert_with(|| Connection::new(customer_id, update.kind, now));
        Ok(entry.apply_start(update, now))
    }

    async fn record_interim(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError> {
        let mut entry = self
            .connections
            .entry(customer_id.to_string())
            .or_insert_with(|| Connection::new(customer_id, update.kind, now));
        Ok(entry.apply_interim(update, now))
    }

    async fn record_stop(
        &self,
        customer_id: &str,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, LedgerError> {
        // No row means no session this Stop could settle
        match self.connections.get_mut(customer_id) {
            Some(mut entry) => Ok(entry.apply_stop(update, now)),
            None => Ok(ApplyOutcome::StaleIgnored),
        }
    }

    async fn connection(&self, customer_id: &str) -> Result<Option<Connection>, LedgerError> {
        Ok(self.connections.get(customer_id).map(|e| e.clone()))
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
