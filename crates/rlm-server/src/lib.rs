//! RLM REST backend server
//!
//! This crate provides the decision backend behind a RADIUS server's REST
//! module, built on top of the `rlm-proto` dialect types. It resolves
//! usernames against a subscriber directory (registered PPPoE/hotspot
//! customers and prepaid vouchers), evaluates entitlements, and tracks
//! session state and usage totals.
//!
//! # Features
//!
//! - Async HTTP endpoints with Tokio and axum
//! - Pluggable directory and ledger backends (in-memory or PostgreSQL)
//! - JSON configuration
//! - Append-only audit logging
//!
//! # Example
//!
//! ```rust,no_run
//! use rlm_server::{AppState, AuditLogger, MemoryDirectory, MemoryLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = Arc::new(MemoryDirectory::new());
//!     let ledger = Arc::new(MemoryLedger::new());
//!     let audit = Arc::new(AuditLogger::new(None)?);
//!
//!     let state = AppState::new(directory, ledger, audit);
//!     rlm_server::serve(state, "0.0.0.0:8080".parse()?).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod directory;
pub mod evaluator;
pub mod ledger;
pub mod reply;
pub mod server;
pub mod subscriber;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use config::{Config, ConfigError};
pub use directory::{DirectoryError, MemoryDirectory, PostgresDirectory, SubscriberDirectory};
pub use evaluator::{Entitlement, Evaluation, Evaluator, RejectReason};
pub use ledger::{
    ApplyOutcome, Connection, LedgerError, MemoryLedger, PostgresLedger, SessionLedger,
    SessionStatus, SessionUpdate, UsageTotals,
};
pub use reply::build_accept_attributes;
pub use server::{create_router, serve, AppState, ServerError};
pub use subscriber::{
    CredentialKind, CustomerRecord, CustomerStatus, Package, Subscriber, VoucherRecord,
    VoucherStatus,
};
