//! Session cost ledger
//!
//! Append-only cost rows plus one checkpoint per open transaction. The
//! checkpoint marks the last reading the polling path has billed up to and
//! only ever moves forward.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{
    BillingCheckpoint, Charge, CostEntry, DomainError, DomainResult, RepositoryProvider,
    TariffWindow,
};

pub struct SessionCostLedger {
    repos: Arc<dyn RepositoryProvider>,
}

impl SessionCostLedger {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    pub async fn checkpoint(&self, transaction_id: i32) -> DomainResult<Option<BillingCheckpoint>> {
        self.repos.ledger().checkpoint(transaction_id).await
    }

    /// Price one interval at `window` and record it.
    ///
    /// The checkpoint is written before the cost row: a failure between the
    /// two loses a row rather than billing the interval twice.
    pub async fn bill_interval(
        &self,
        transaction_id: i32,
        interval_end: DateTime<Utc>,
        energy_at_end_wh: Decimal,
        energy_kwh: Decimal,
        window: &TariffWindow,
    ) -> DomainResult<CostEntry> {
        if let Some(current) = self.checkpoint(transaction_id).await? {
            if interval_end <= current.last_billed_at {
                return Err(DomainError::Conflict(format!(
                    "interval ending {} already billed for transaction {}",
                    interval_end, transaction_id
                )));
            }
        }

        let charge = Charge::compute(energy_kwh, window.unit_rate, window.tax_rate_percent);
        let entry = CostEntry {
            transaction_id,
            timestamp: interval_end,
            energy_kwh,
            tax_amount: charge.tax_amount,
            total_amount: charge.total,
        };

        let ledger = self.repos.ledger();
        ledger
            .save_checkpoint(BillingCheckpoint::new(transaction_id, interval_end, energy_at_end_wh))
            .await?;
        ledger.append_entry(entry.clone()).await?;

        metrics::counter!("billing_intervals_total").increment(1);
        debug!(
            transaction_id,
            energy_kwh = %energy_kwh,
            total = %entry.total_amount,
            "Interval billed"
        );
        Ok(entry)
    }

    /// Move the checkpoint without billing. Returns `false` when `at` is not
    /// after the current checkpoint.
    pub async fn advance_checkpoint(
        &self,
        transaction_id: i32,
        at: DateTime<Utc>,
        energy_wh: Decimal,
    ) -> DomainResult<bool> {
        if let Some(current) = self.checkpoint(transaction_id).await? {
            if at <= current.last_billed_at {
                return Ok(false);
            }
        }
        self.repos
            .ledger()
            .save_checkpoint(BillingCheckpoint::new(transaction_id, at, energy_wh))
            .await?;
        Ok(true)
    }

    /// Sum of totals billed after `since`.
    pub async fn cost_since_checkpoint(
        &self,
        transaction_id: i32,
        since: DateTime<Utc>,
    ) -> DomainResult<Decimal> {
        let entries = self.repos.ledger().entries_since(transaction_id, since).await?;
        Ok(entries.iter().map(|e| e.total_amount).sum())
    }

    pub async fn total_cost(&self, transaction_id: i32) -> DomainResult<Decimal> {
        let entries = self.repos.ledger().entries(transaction_id).await?;
        Ok(entries.iter().map(|e| e.total_amount).sum())
    }

    /// Discard the checkpoint of a finished transaction. Cost rows stay.
    pub async fn close(&self, transaction_id: i32) -> DomainResult<()> {
        self.repos.ledger().delete_checkpoint(transaction_id).await
    }
}
