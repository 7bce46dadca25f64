//! Polling wallet guard
//!
//! Periodically prices what every open transaction of an account consumed
//! since its checkpoint, then compares the sum against one account-level
//! balance. When what would remain drops to the floor, every open
//! transaction of the account is stopped.
//!
//! ```text
//! open txs ──► per tx (concurrent):  tariffs ─► seed ─► readings ─► deltas
//!                                       │                              │
//!                                       └──── price by interval start ◄┘
//!                                                      │
//!                                              SessionCostLedger
//!          Σ partial costs ─► balance - Σ ≤ floor ? stop all : continue
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::ledger::SessionCostLedger;
use super::wallet_stop::{StopDispatch, WalletStopDispatcher};
use crate::application::ports::{TariffProvider, WalletProvider};
use crate::domain::{
    Charge, ChargingTransaction, DomainError, DomainResult, EnergySeed, MeterDeltaAccumulator,
    RepositoryProvider, TariffClock,
};
use crate::notifications::{Event, IntervalBilledEvent, SharedEventBus};

/// Default minimum balance that must remain after pending costs.
pub const DEFAULT_FLOOR_THRESHOLD: Decimal = dec!(30);

#[derive(Debug, Clone)]
pub struct PollingGuardConfig {
    pub floor_threshold: Decimal,
    pub clock: TariffClock,
}

impl Default for PollingGuardConfig {
    fn default() -> Self {
        Self {
            floor_threshold: DEFAULT_FLOOR_THRESHOLD,
            clock: TariffClock::from_offset_minutes(330),
        }
    }
}

/// What one evaluation of an account decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollingOutcome {
    /// No open transactions
    Idle,
    /// Costs were billed but the balance could not be read; no decision
    WalletUnavailable { total_cost: Decimal },
    WithinBudget {
        balance: Decimal,
        total_cost: Decimal,
        remaining: Decimal,
    },
    Stopped {
        balance: Decimal,
        total_cost: Decimal,
        remaining: Decimal,
        /// Transactions a stop was dispatched for in this evaluation
        transactions: Vec<i32>,
    },
}

pub struct PollingWalletGuard {
    repos: Arc<dyn RepositoryProvider>,
    ledger: Arc<SessionCostLedger>,
    tariffs: Arc<dyn TariffProvider>,
    wallet: Arc<dyn WalletProvider>,
    stopper: Arc<WalletStopDispatcher>,
    events: SharedEventBus,
    config: PollingGuardConfig,
    /// Serializes evaluations of the same transaction across ticks
    tx_locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl PollingWalletGuard {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        ledger: Arc<SessionCostLedger>,
        tariffs: Arc<dyn TariffProvider>,
        wallet: Arc<dyn WalletProvider>,
        stopper: Arc<WalletStopDispatcher>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            ledger,
            tariffs,
            wallet,
            stopper,
            events,
            config: PollingGuardConfig::default(),
            tx_locks: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: PollingGuardConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate every account that has an open transaction.
    pub async fn evaluate_all(&self) -> DomainResult<Vec<(String, PollingOutcome)>> {
        let open = self.repos.transactions().find_open().await?;
        let mut id_tags: Vec<String> = open.into_iter().map(|tx| tx.id_tag).collect();
        id_tags.sort();
        id_tags.dedup();

        let mut outcomes = Vec::with_capacity(id_tags.len());
        for id_tag in id_tags {
            match self.evaluate(&id_tag).await {
                Ok(outcome) => outcomes.push((id_tag, outcome)),
                Err(e) => warn!(id_tag = id_tag.as_str(), error = %e, "Wallet evaluation failed"),
            }
        }
        Ok(outcomes)
    }

    pub async fn evaluate(&self, id_tag: &str) -> DomainResult<PollingOutcome> {
        self.evaluate_at(id_tag, Utc::now()).await
    }

    /// Evaluate an account with readings up to `now`.
    pub async fn evaluate_at(&self, id_tag: &str, now: DateTime<Utc>) -> DomainResult<PollingOutcome> {
        let started = Instant::now();
        let open = self.repos.transactions().find_open_by_id_tag(id_tag).await?;
        if open.is_empty() {
            return Ok(PollingOutcome::Idle);
        }

        let partials = join_all(open.iter().map(|tx| self.bill_transaction(tx, now))).await;

        let mut total_cost = Decimal::ZERO;
        for (tx, partial) in open.iter().zip(partials) {
            match partial {
                Ok(Some(cost)) => total_cost += cost,
                Ok(None) => {}
                Err(e) => {
                    warn!(transaction_id = tx.id, error = %e, "Skipping transaction this cycle")
                }
            }
        }

        let balance = match self.wallet.balance(id_tag).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(id_tag, error = %e, "Wallet balance unavailable, no decision this cycle");
                return Ok(PollingOutcome::WalletUnavailable { total_cost });
            }
        };

        let remaining = balance - total_cost;
        let outcome = if remaining <= self.config.floor_threshold {
            info!(
                id_tag,
                balance = %balance,
                total_cost = %total_cost,
                remaining = %remaining,
                open = open.len(),
                "Balance at floor, stopping all open transactions"
            );
            let mut stopped = Vec::new();
            for tx in &open {
                if self.stopper.stop(tx, balance, total_cost, "polling").await == StopDispatch::Sent {
                    stopped.push(tx.id);
                }
            }
            PollingOutcome::Stopped {
                balance,
                total_cost,
                remaining,
                transactions: stopped,
            }
        } else {
            debug!(id_tag, balance = %balance, total_cost = %total_cost, "Within budget");
            PollingOutcome::WithinBudget {
                balance,
                total_cost,
                remaining,
            }
        };

        metrics::histogram!("wallet_guard_evaluation_seconds", "guard" => "polling")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Bill everything read since the checkpoint. `None` means the
    /// transaction was skipped this cycle.
    async fn bill_transaction(
        &self,
        tx: &ChargingTransaction,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Decimal>> {
        let lock = self
            .tx_locks
            .entry(tx.id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = lock.lock().await;

        let windows = match self.tariffs.tariffs(&tx.connector.charge_box_id).await {
            Ok(windows) if !windows.is_empty() => windows,
            Ok(_) => {
                warn!(transaction_id = tx.id, charger = %tx.connector, "No tariff windows, skipping");
                return Ok(None);
            }
            Err(e) => {
                warn!(transaction_id = tx.id, charger = %tx.connector, error = %e, "Tariff fetch failed, skipping");
                return Ok(None);
            }
        };

        let seed = self.seed(tx).await?;
        let readings = self
            .repos
            .meter_readings()
            .readings_between(&tx.connector, seed.at, now)
            .await?;

        let mut partial = Decimal::ZERO;
        for delta in MeterDeltaAccumulator::deltas(seed, &readings) {
            let window = if delta.is_billable() {
                self.config.clock.resolve(delta.from, &windows)
            } else {
                None
            };

            let Some(window) = window else {
                if let Err(e) = self
                    .ledger
                    .advance_checkpoint(tx.id, delta.to, delta.end_wh)
                    .await
                {
                    error!(transaction_id = tx.id, error = %e, "Checkpoint write failed");
                }
                continue;
            };

            let kwh = delta.billable_kwh();
            match self
                .ledger
                .bill_interval(tx.id, delta.to, delta.end_wh, kwh, window)
                .await
            {
                Ok(entry) => {
                    partial += entry.total_amount;
                    self.events.publish(Event::IntervalBilled(IntervalBilledEvent {
                        transaction_id: tx.id,
                        energy_kwh: entry.energy_kwh,
                        total_amount: entry.total_amount,
                        interval_end: entry.timestamp,
                    }));
                }
                Err(DomainError::Conflict(reason)) => {
                    warn!(transaction_id = tx.id, reason = %reason, "Interval already billed, skipped");
                }
                Err(e) => {
                    error!(transaction_id = tx.id, error = %e, "Ledger write failed");
                    partial += Charge::compute(kwh, window.unit_rate, window.tax_rate_percent).total;
                }
            }
        }

        Ok(Some(partial))
    }

    /// Checkpoint if one exists, else the last reading on the connector at
    /// or before the transaction started, else zero. A fresh seed is
    /// persisted as the first checkpoint.
    async fn seed(&self, tx: &ChargingTransaction) -> DomainResult<EnergySeed> {
        if let Some(cp) = self.ledger.checkpoint(tx.id).await? {
            return Ok(EnergySeed::new(cp.last_billed_at, cp.last_billed_energy_wh));
        }

        let seed = match self
            .repos
            .meter_readings()
            .latest_at_or_before(&tx.connector, tx.started_at)
            .await?
        {
            Some(previous) => EnergySeed::from(&previous),
            None => EnergySeed::zero(tx.started_at),
        };
        self.ledger
            .advance_checkpoint(tx.id, seed.at, seed.energy_wh)
            .await?;
        debug!(transaction_id = tx.id, seed_wh = %seed.energy_wh, "Checkpoint seeded");
        Ok(seed)
    }

    /// Drop the per-transaction lock once a transaction has ended.
    pub fn forget(&self, transaction_id: i32) {
        self.tx_locks.remove(&transaction_id);
    }
}

/// Interval between polling ticks.
pub fn poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
