//! Transaction start/stop bookkeeping
//!
//! Keeps the billing state of a transaction in step with what the charger
//! reports: the start reading seeds the polling path, and a stop closes the
//! checkpoint, drops per-transaction caches, and consumes the server-side
//! stop reason.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info};

use super::ledger::SessionCostLedger;
use super::polling_guard::PollingWalletGuard;
use super::stop_reason::StopReasonStore;
use super::streaming_guard::LastEnergyCache;
use super::wallet_stop::WalletStopDispatcher;
use crate::domain::{
    ChargingTransaction, ConnectorRef, DomainError, DomainResult, MeterSample, RepositoryProvider,
};
use crate::notifications::{Event, SharedEventBus, TransactionStartedEvent, TransactionStoppedEvent};

pub struct SessionLifecycle {
    repos: Arc<dyn RepositoryProvider>,
    ledger: Arc<SessionCostLedger>,
    stop_reasons: Arc<StopReasonStore>,
    last_energy: Arc<LastEnergyCache>,
    stopper: Arc<WalletStopDispatcher>,
    polling: Option<Arc<PollingWalletGuard>>,
    events: SharedEventBus,
}

impl SessionLifecycle {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        ledger: Arc<SessionCostLedger>,
        stop_reasons: Arc<StopReasonStore>,
        last_energy: Arc<LastEnergyCache>,
        stopper: Arc<WalletStopDispatcher>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            ledger,
            stop_reasons,
            last_energy,
            stopper,
            polling: None,
            events,
        }
    }

    pub fn with_polling_guard(mut self, guard: Arc<PollingWalletGuard>) -> Self {
        self.polling = Some(guard);
        self
    }

    /// Open a transaction and record its start reading.
    pub async fn transaction_started(
        &self,
        connector: ConnectorRef,
        id_tag: &str,
        started_at: DateTime<Utc>,
        meter_start_wh: Decimal,
    ) -> DomainResult<ChargingTransaction> {
        let id = self.repos.transactions().next_id().await;
        let tx = ChargingTransaction::new(id, connector.clone(), id_tag, started_at);
        self.repos.transactions().save(tx.clone()).await?;
        self.repos
            .meter_readings()
            .append(MeterSample::new(connector.clone(), started_at, meter_start_wh))
            .await?;

        info!(transaction_id = id, connector = %connector, id_tag, "Transaction started");
        self.events.publish(Event::TransactionStarted(TransactionStartedEvent {
            charge_point_id: connector.charge_box_id.clone(),
            connector_id: connector.connector_id,
            transaction_id: id,
            id_tag: id_tag.to_string(),
            timestamp: started_at,
        }));
        Ok(tx)
    }

    /// Close a transaction. A reason recorded by the engine wins over the
    /// one the charger reported; the engine's reason is returned.
    pub async fn transaction_stopped(
        &self,
        transaction_id: i32,
        stopped_at: DateTime<Utc>,
        meter_stop_wh: Option<Decimal>,
        reported_reason: Option<String>,
    ) -> DomainResult<Option<String>> {
        let tx = self
            .repos
            .transactions()
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Transaction",
                field: "id",
                value: transaction_id.to_string(),
            })?;

        let server_reason = self.stop_reasons.take(transaction_id);
        let reason = server_reason.clone().or(reported_reason);

        self.repos
            .transactions()
            .stop(transaction_id, stopped_at, reason.clone())
            .await?;

        if let Some(wh) = meter_stop_wh {
            if let Err(e) = self
                .repos
                .meter_readings()
                .append(MeterSample::new(tx.connector.clone(), stopped_at, wh))
                .await
            {
                error!(transaction_id, error = %e, "Stop reading not recorded");
            }
        }
        if let Err(e) = self.ledger.close(transaction_id).await {
            error!(transaction_id, error = %e, "Checkpoint not discarded");
        }
        self.last_energy.remove(&transaction_id);
        self.stopper.forget(transaction_id);
        if let Some(polling) = &self.polling {
            polling.forget(transaction_id);
        }

        info!(transaction_id, reason = ?reason, "Transaction stopped");
        self.events.publish(Event::TransactionStopped(TransactionStoppedEvent {
            charge_point_id: tx.connector.charge_box_id,
            transaction_id,
            reason,
            timestamp: stopped_at,
        }));
        Ok(server_reason)
    }
}
