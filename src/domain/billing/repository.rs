//! Ledger repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{BillingCheckpoint, CostEntry};
use crate::domain::DomainResult;

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn append_entry(&self, entry: CostEntry) -> DomainResult<()>;

    /// Entries with `timestamp > since`, ascending.
    async fn entries_since(
        &self,
        transaction_id: i32,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<CostEntry>>;

    async fn entries(&self, transaction_id: i32) -> DomainResult<Vec<CostEntry>>;

    async fn checkpoint(&self, transaction_id: i32) -> DomainResult<Option<BillingCheckpoint>>;
    async fn save_checkpoint(&self, checkpoint: BillingCheckpoint) -> DomainResult<()>;
    async fn delete_checkpoint(&self, transaction_id: i32) -> DomainResult<()>;
}
