//! Transaction repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::ChargingTransaction;
use crate::domain::metering::ConnectorRef;
use crate::domain::DomainResult;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn save(&self, transaction: ChargingTransaction) -> DomainResult<()>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargingTransaction>>;

    /// Open transactions for an account, across all connectors.
    async fn find_open_by_id_tag(&self, id_tag: &str) -> DomainResult<Vec<ChargingTransaction>>;

    async fn find_open_for_connector(
        &self,
        connector: &ConnectorRef,
    ) -> DomainResult<Option<ChargingTransaction>>;

    async fn find_open(&self) -> DomainResult<Vec<ChargingTransaction>>;

    async fn stop(
        &self,
        id: i32,
        stopped_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<()>;

    async fn next_id(&self) -> i32;
}
