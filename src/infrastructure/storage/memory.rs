//! In-memory repositories for development and testing

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::domain::{
    BillingCheckpoint, ChargingTransaction, ConnectorRef, CostEntry, DomainError, DomainResult,
    LedgerRepository, MeterReadingRepository, MeterSample, RepositoryProvider, TelemetryRecord,
    TelemetryRepository, TransactionRepository,
};

/// DashMap-backed implementation of every repository.
pub struct InMemoryStorage {
    transactions: DashMap<i32, ChargingTransaction>,
    meter_samples: DashMap<ConnectorRef, Vec<MeterSample>>,
    telemetry: DashMap<i32, Vec<TelemetryRecord>>,
    cost_entries: DashMap<i32, Vec<CostEntry>>,
    checkpoints: DashMap<i32, BillingCheckpoint>,
    transaction_counter: AtomicI32,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            meter_samples: DashMap::new(),
            telemetry: DashMap::new(),
            cost_entries: DashMap::new(),
            checkpoints: DashMap::new(),
            transaction_counter: AtomicI32::new(1),
        }
    }

    /// Telemetry rows written for a transaction, oldest first.
    pub fn telemetry_rows(&self, transaction_id: i32) -> Vec<TelemetryRecord> {
        self.telemetry
            .get(&transaction_id)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryStorage {
    fn transactions(&self) -> &dyn TransactionRepository {
        self
    }

    fn meter_readings(&self) -> &dyn MeterReadingRepository {
        self
    }

    fn telemetry(&self) -> &dyn TelemetryRepository {
        self
    }

    fn ledger(&self) -> &dyn LedgerRepository {
        self
    }
}

fn transaction_not_found(id: i32) -> DomainError {
    DomainError::NotFound {
        entity: "Transaction",
        field: "id",
        value: id.to_string(),
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStorage {
    async fn save(&self, transaction: ChargingTransaction) -> DomainResult<()> {
        self.transaction_counter
            .fetch_max(transaction.id + 1, Ordering::SeqCst);
        self.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargingTransaction>> {
        Ok(self.transactions.get(&id).map(|t| t.clone()))
    }

    async fn find_open_by_id_tag(&self, id_tag: &str) -> DomainResult<Vec<ChargingTransaction>> {
        let mut open: Vec<ChargingTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.is_open() && t.id_tag == id_tag)
            .map(|t| t.clone())
            .collect();
        open.sort_by_key(|t| t.id);
        Ok(open)
    }

    async fn find_open_for_connector(
        &self,
        connector: &ConnectorRef,
    ) -> DomainResult<Option<ChargingTransaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.is_open() && &t.connector == connector)
            .max_by_key(|t| t.started_at)
            .map(|t| t.clone()))
    }

    async fn find_open(&self) -> DomainResult<Vec<ChargingTransaction>> {
        let mut open: Vec<ChargingTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.is_open())
            .map(|t| t.clone())
            .collect();
        open.sort_by_key(|t| t.id);
        Ok(open)
    }

    async fn stop(
        &self,
        id: i32,
        stopped_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<()> {
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| transaction_not_found(id))?;
        tx.stop(stopped_at, reason);
        Ok(())
    }

    async fn next_id(&self) -> i32 {
        self.transaction_counter.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl MeterReadingRepository for InMemoryStorage {
    async fn append(&self, sample: MeterSample) -> DomainResult<()> {
        self.meter_samples
            .entry(sample.connector.clone())
            .or_default()
            .push(sample);
        Ok(())
    }

    async fn latest_at_or_before(
        &self,
        connector: &ConnectorRef,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<MeterSample>> {
        Ok(self.meter_samples.get(connector).and_then(|samples| {
            samples
                .iter()
                .filter(|s| s.timestamp <= at)
                .max_by_key(|s| s.timestamp)
                .cloned()
        }))
    }

    async fn readings_between(
        &self,
        connector: &ConnectorRef,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterSample>> {
        let mut readings: Vec<MeterSample> = self
            .meter_samples
            .get(connector)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp > from && s.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        readings.sort_by_key(|s| s.timestamp);
        Ok(readings)
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryStorage {
    async fn insert(&self, record: TelemetryRecord) -> DomainResult<()> {
        self.telemetry
            .entry(record.transaction_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn update_latest_cost(
        &self,
        transaction_id: i32,
        tax_amount: Decimal,
        total_amount: Decimal,
    ) -> DomainResult<()> {
        let mut rows = self
            .telemetry
            .get_mut(&transaction_id)
            .ok_or_else(|| transaction_not_found(transaction_id))?;
        let latest = rows
            .iter_mut()
            .max_by_key(|r| r.timestamp)
            .ok_or_else(|| transaction_not_found(transaction_id))?;
        latest.tax_amount = Some(tax_amount);
        latest.total_amount = Some(total_amount);
        Ok(())
    }

    async fn last_energy_of_previous_transaction(
        &self,
        connector: &ConnectorRef,
        transaction_id: i32,
    ) -> DomainResult<Option<Decimal>> {
        let latest = self
            .telemetry
            .iter()
            .filter(|entry| *entry.key() < transaction_id)
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| &r.connector == connector)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .max_by_key(|r| r.timestamp);
        Ok(latest.map(|r| r.energy_wh))
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStorage {
    async fn append_entry(&self, entry: CostEntry) -> DomainResult<()> {
        self.cost_entries
            .entry(entry.transaction_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn entries_since(
        &self,
        transaction_id: i32,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<CostEntry>> {
        Ok(self
            .entries(transaction_id)
            .await?
            .into_iter()
            .filter(|e| e.timestamp > since)
            .collect())
    }

    async fn entries(&self, transaction_id: i32) -> DomainResult<Vec<CostEntry>> {
        let mut entries = self
            .cost_entries
            .get(&transaction_id)
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn checkpoint(&self, transaction_id: i32) -> DomainResult<Option<BillingCheckpoint>> {
        Ok(self.checkpoints.get(&transaction_id).map(|c| c.clone()))
    }

    async fn save_checkpoint(&self, checkpoint: BillingCheckpoint) -> DomainResult<()> {
        self.checkpoints.insert(checkpoint.transaction_id, checkpoint);
        Ok(())
    }

    async fn delete_checkpoint(&self, transaction_id: i32) -> DomainResult<()> {
        self.checkpoints.remove(&transaction_id);
        Ok(())
    }
}
