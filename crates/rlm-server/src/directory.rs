//! Subscriber directory abstraction
//!
//! The directory resolves presented usernames to subscriber records and
//! carries the only two writes this service performs against subscriber
//! data: the voucher consumption anchor and voucher status transitions.
//!
//! Two implementations exist:
//!
//! - **MemoryDirectory**: seeded from configuration, single-server use
//! - **PostgresDirectory**: shared billing database
//!
//! Lookups are read-mostly; customer records are owned by the billing
//! system and never written here.

pub mod postgres;

pub use postgres::PostgresDirectory;

use crate::subscriber::{CustomerRecord, Subscriber, VoucherRecord, VoucherStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from directory operations
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record for {0}: {1}")]
    Corrupt(String, String),
}

/// Subscriber lookup and voucher bookkeeping
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Resolve a presented username
    ///
    /// Checked against registered-customer PPPoE and hotspot usernames
    /// first, then against voucher codes. `Ok(None)` when nothing matches.
    async fn find_by_username(&self, username: &str) -> Result<Option<Subscriber>, DirectoryError>;

    /// Set a voucher's consumption anchor if still unset
    ///
    /// The check-then-set is atomic per voucher: under concurrent calls
    /// exactly one returns `true`, every other call leaves the stored
    /// anchor untouched and returns `false`.
    async fn anchor_voucher(&self, code: &str, at: DateTime<Utc>)
        -> Result<bool, DirectoryError>;

    /// Transition a voucher to a new status
    async fn set_voucher_status(
        &self,
        code: &str,
        status: VoucherStatus,
    ) -> Result<(), DirectoryError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), DirectoryError>;
}

/// In-memory directory seeded from configuration
///
/// Uses `tokio::sync::RwLock` for concurrent access from handler tasks.
/// Customer lists stay small enough that lookup is a linear scan over both
/// credential pairs.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    customers: Arc<RwLock<Vec<CustomerRecord>>>,
    vouchers: Arc<RwLock<HashMap<String, VoucherRecord>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_customer(&self, record: CustomerRecord) {
        let mut customers = self.customers.write().await;
        customers.push(record);
    }

    pub async fn add_voucher(&self, record: VoucherRecord) {
        let mut vouchers = self.vouchers.write().await;
        vouchers.insert(record.code.clone(), record);
    }

    /// Snapshot a voucher record by code
    pub async fn voucher(&self, code: &str) -> Option<VoucherRecord> {
        let vouchers = self.vouchers.read().await;
        vouchers.get(code).cloned()
    }

    pub async fn customer_count(&self) -> usize {
        let customers = self.customers.read().await;
        customers.len()
    }

    pub async fn voucher_count(&self) -> usize {
        let vouchers = self.vouchers.read().await;
        vouchers.len()
    }
}

#[async_trait]
impl SubscriberDirectory for MemoryDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<Subscriber>, DirectoryError> {
        {
            let customers = self.customers.read().await;
            if let Some(record) = customers
                .iter()
                .find(|c| c.credential_kind(username).is_some())
            {
                return Ok(Some(Subscriber::Customer(record.clone())));
            }
        }

        let vouchers = self.vouchers.read().await;
        Ok(vouchers
            .get(username)
            .map(|v| Subscriber::Voucher(v.clone())))
    }

    async fn anchor_voucher(
        &self,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DirectoryError> {
        let mut vouchers = self.vouchers.write().await;
        match vouchers.get_mut(code) {
            Some(voucher) if voucher.last_used_at.is_none() => {
                voucher.last_used_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_voucher_status(
        &self,
        code: &str,
        status: VoucherStatus,
    ) -> Result<(), DirectoryError> {
        let mut vouchers = self.vouchers.write().await;
        if let Some(voucher) = vouchers.get_mut(code) {
            voucher.status = status;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::test_fixtures::{customer, voucher};
    use crate::subscriber::CredentialKind;

    #[tokio::test]
    async fn test_lookup_order_customers_before_vouchers() {
        let directory = MemoryDirectory::new();
        directory.add_customer(customer("cust-1")).await;
        directory.add_voucher(voucher("WX7K2M", Utc::now())).await;

        match directory.find_by_username("cust-1@ppp").await.unwrap() {
            Some(Subscriber::Customer(record)) => {
                assert_eq!(
                    record.credential_kind("cust-1@ppp"),
                    Some(CredentialKind::Pppoe)
                );
            }
            other => panic!("expected customer, got {other:?}"),
        }

        match directory.find_by_username("WX7K2M").await.unwrap() {
            Some(Subscriber::Voucher(record)) => assert_eq!(record.code, "WX7K2M"),
            other => panic!("expected voucher, got {other:?}"),
        }

        assert!(directory.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anchor_sets_once() {
        let directory = MemoryDirectory::new();
        let now = Utc::now();
        directory.add_voucher(voucher("WX7K2M", now)).await;

        assert!(directory.anchor_voucher("WX7K2M", now).await.unwrap());
        let anchored = directory.voucher("WX7K2M").await.unwrap();
        assert_eq!(anchored.last_used_at, Some(now));

        // Second start must not move the anchor
        let later = now + chrono::Duration::minutes(5);
        assert!(!directory.anchor_voucher("WX7K2M", later).await.unwrap());
        let unchanged = directory.voucher("WX7K2M").await.unwrap();
        assert_eq!(unchanged.last_used_at, Some(now));
    }

    #[tokio::test]
    async fn test_anchor_unknown_code() {
        let directory = MemoryDirectory::new();
        assert!(!directory.anchor_voucher("MISSING", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_transition() {
        let directory = MemoryDirectory::new();
        directory.add_voucher(voucher("WX7K2M", Utc::now())).await;

        directory
            .set_voucher_status("WX7K2M", VoucherStatus::Expired)
            .await
            .unwrap();
        assert_eq!(
            directory.voucher("WX7K2M").await.unwrap().status,
            VoucherStatus::Expired
        );
    }
}
