//! Meter reading and telemetry repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::model::{ConnectorRef, MeterSample, TelemetryRecord};
use crate::domain::DomainResult;

/// Cumulative energy readings per connector, as used by the polling path.
#[async_trait]
pub trait MeterReadingRepository: Send + Sync {
    async fn append(&self, sample: MeterSample) -> DomainResult<()>;

    /// Most recent reading taken at or before `at`.
    async fn latest_at_or_before(
        &self,
        connector: &ConnectorRef,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<MeterSample>>;

    /// Readings with `from < timestamp <= to`, ascending.
    async fn readings_between(
        &self,
        connector: &ConnectorRef,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterSample>>;
}

/// Running per-transaction telemetry rows written by the streaming path.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn insert(&self, record: TelemetryRecord) -> DomainResult<()>;

    /// Write tax and total onto the most recent row of the transaction.
    async fn update_latest_cost(
        &self,
        transaction_id: i32,
        tax_amount: Decimal,
        total_amount: Decimal,
    ) -> DomainResult<()>;

    /// Last energy value recorded on the connector by the latest
    /// transaction with an id below `transaction_id`.
    async fn last_energy_of_previous_transaction(
        &self,
        connector: &ConnectorRef,
        transaction_id: i32,
    ) -> DomainResult<Option<Decimal>>;
}
