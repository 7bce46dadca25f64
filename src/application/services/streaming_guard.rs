//! Streaming wallet guard
//!
//! Runs on every telemetry batch of a transaction. Prices the energy drawn
//! since the transaction's baseline at the account's flat rate and stops
//! the transaction once that cost exceeds the balance.
//!
//! The baseline is the last energy value the previous transaction on the
//! same connector recorded. It is looked up once per transaction and kept
//! in the injected cache; later batches never re-query it.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::wallet_stop::WalletStopDispatcher;
use crate::application::ports::WalletProvider;
use crate::domain::{
    Charge, ConnectorRef, DomainError, DomainResult, MeterReading, RepositoryProvider, TelemetryRecord,
};
use crate::shared::cache::ComputeOnceCache;

pub const DEFAULT_FLAT_TAX_PERCENT: Decimal = dec!(18);

/// Baseline energy per transaction id.
pub type LastEnergyCache = ComputeOnceCache<i32, Decimal>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StreamingOutcome {
    /// Transaction or wallet unknown; nothing was priced
    Skipped,
    Priced { balance: Decimal, cost: Decimal },
    Stopped { balance: Decimal, cost: Decimal },
}

pub struct StreamingWalletGuard {
    repos: Arc<dyn RepositoryProvider>,
    wallet: Arc<dyn WalletProvider>,
    stopper: Arc<WalletStopDispatcher>,
    last_energy: Arc<LastEnergyCache>,
    tax_percent: Decimal,
}

impl StreamingWalletGuard {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        wallet: Arc<dyn WalletProvider>,
        stopper: Arc<WalletStopDispatcher>,
        last_energy: Arc<LastEnergyCache>,
    ) -> Self {
        Self {
            repos,
            wallet,
            stopper,
            last_energy,
            tax_percent: DEFAULT_FLAT_TAX_PERCENT,
        }
    }

    pub fn with_tax_percent(mut self, tax_percent: Decimal) -> Self {
        self.tax_percent = tax_percent;
        self
    }

    pub async fn evaluate(
        &self,
        readings: &[MeterReading],
        transaction_id: i32,
        connector: &ConnectorRef,
    ) -> DomainResult<StreamingOutcome> {
        let started = Instant::now();

        let Some(tx) = self.repos.transactions().find_by_id(transaction_id).await? else {
            warn!(transaction_id, connector = %connector, "Telemetry for unknown transaction");
            return Ok(StreamingOutcome::Skipped);
        };

        let snapshot = match self.wallet.wallet_and_rate(&tx.id_tag).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(transaction_id, id_tag = tx.id_tag.as_str(), error = %e, "Wallet unavailable, skipping batch");
                return Ok(StreamingOutcome::Skipped);
            }
        };

        let baseline = self.baseline(connector, transaction_id).await?;

        let telemetry = self.repos.telemetry();
        let mut record = TelemetryRecord::new(transaction_id, connector.clone(), tx.id_tag.as_str());
        let mut outcome = StreamingOutcome::Priced {
            balance: snapshot.balance,
            cost: Decimal::ZERO,
        };

        for reading in readings {
            record.timestamp = reading.timestamp;
            for value in &reading.values {
                if let Err(e) = record.apply(value) {
                    warn!(transaction_id, measurand = ?value.measurand, error = %e, "Discarding measurand");
                }
            }
            if let Err(e) = telemetry.insert(record.clone()).await {
                error!(transaction_id, error = %e, "Telemetry write failed");
            }

            let delta_wh = (record.energy_wh - baseline).max(Decimal::ZERO);
            let charge = Charge::compute(
                delta_wh / Decimal::ONE_THOUSAND,
                snapshot.unit_rate,
                self.tax_percent,
            );
            if let Err(e) = telemetry
                .update_latest_cost(transaction_id, charge.tax_amount, charge.total)
                .await
            {
                error!(transaction_id, error = %e, "Telemetry cost write failed");
            }
            debug!(transaction_id, delta_wh = %delta_wh, cost = %charge.total, "Telemetry priced");

            if charge.total > snapshot.balance {
                info!(
                    transaction_id,
                    id_tag = tx.id_tag.as_str(),
                    cost = %charge.total,
                    balance = %snapshot.balance,
                    "Cost exceeds balance, stopping transaction"
                );
                self.stopper
                    .stop(&tx, snapshot.balance, charge.total, "streaming")
                    .await;
                outcome = StreamingOutcome::Stopped {
                    balance: snapshot.balance,
                    cost: charge.total,
                };
                break;
            }
            outcome = StreamingOutcome::Priced {
                balance: snapshot.balance,
                cost: charge.total,
            };
        }

        metrics::histogram!("wallet_guard_evaluation_seconds", "guard" => "streaming")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn baseline(&self, connector: &ConnectorRef, transaction_id: i32) -> DomainResult<Decimal> {
        let repos = Arc::clone(&self.repos);
        self.last_energy
            .get_or_try_init(transaction_id, || async move {
                let previous = repos
                    .telemetry()
                    .last_energy_of_previous_transaction(connector, transaction_id)
                    .await?;
                debug!(transaction_id, previous = ?previous, "Energy baseline seeded");
                Ok::<_, DomainError>(previous.unwrap_or(Decimal::ZERO))
            })
            .await
    }

    pub fn forget(&self, transaction_id: i32) {
        self.last_energy.remove(&transaction_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::session::SessionCommandFacade;
    use crate::application::services::stop_reason::{StopReasonStore, STOP_BY_SERVER};
    use crate::application::services::testing::{
        FakeReachability, FakeWallet, RecordingCommands, RecordingNotifier,
    };
    use crate::domain::{ChargingTransaction, Measurand, SampledReading};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::create_event_bus;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::time::Duration as StdDuration;

    struct Harness {
        guard: StreamingWalletGuard,
        storage: Arc<InMemoryStorage>,
        commands: Arc<RecordingCommands>,
        wallet: Arc<FakeWallet>,
        reasons: Arc<StopReasonStore>,
        cache: Arc<LastEnergyCache>,
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn conn() -> ConnectorRef {
        ConnectorRef::new("CP001", 1)
    }

    fn harness(balance: Decimal) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let commands = Arc::new(RecordingCommands::default());
        let wallet = Arc::new(FakeWallet::new(balance, dec!(8)));
        let reasons = Arc::new(StopReasonStore::new());
        let cache = Arc::new(LastEnergyCache::new());
        let facade = Arc::new(SessionCommandFacade::new(
            commands.clone(),
            Arc::new(FakeReachability::default()),
            Arc::new(RecordingNotifier::default()),
        ));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade,
            reasons.clone(),
            create_event_bus(),
            StdDuration::from_secs(60),
        ));
        let guard = StreamingWalletGuard::new(storage.clone(), wallet.clone(), stopper, cache.clone());
        Harness {
            guard,
            storage,
            commands,
            wallet,
            reasons,
            cache,
        }
    }

    fn energy(minute: i64, wh: &str) -> MeterReading {
        MeterReading {
            timestamp: at(minute),
            values: vec![SampledReading::new(Measurand::EnergyActiveImportRegister, wh).with_unit("Wh")],
        }
    }

    /// Previous transaction 1 left the register at 1000 Wh; transaction 2 is open.
    async fn with_predecessor(h: &Harness) {
        let mut previous = TelemetryRecord::new(1, conn(), "TAG");
        previous.timestamp = at(0);
        previous.energy_wh = dec!(1000);
        h.storage.telemetry().insert(previous).await.unwrap();
        h.storage
            .transactions()
            .save(ChargingTransaction::new(2, conn(), "TAG", at(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn prices_energy_since_predecessor_with_flat_tax() {
        let h = harness(dec!(10));
        with_predecessor(&h).await;

        let outcome = h.guard.evaluate(&[energy(2, "1500")], 2, &conn()).await.unwrap();

        assert_eq!(outcome, StreamingOutcome::Priced { balance: dec!(10), cost: dec!(4.72) });
        let rows = h.storage.telemetry_rows(2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].energy_wh, dec!(1500));
        assert_eq!(rows[0].tax_amount, Some(dec!(0.72)));
        assert_eq!(rows[0].total_amount, Some(dec!(4.72)));
        assert!(h.commands.stops().is_empty());
    }

    #[tokio::test]
    async fn cost_above_balance_stops_only_that_transaction() {
        let h = harness(dec!(4));
        with_predecessor(&h).await;
        h.storage
            .transactions()
            .save(ChargingTransaction::new(3, ConnectorRef::new("CP001", 2), "TAG", at(1)))
            .await
            .unwrap();

        let outcome = h
            .guard
            .evaluate(&[energy(2, "1500"), energy(3, "1600")], 2, &conn())
            .await
            .unwrap();

        assert_eq!(outcome, StreamingOutcome::Stopped { balance: dec!(4), cost: dec!(4.72) });
        assert_eq!(h.commands.stops(), vec![("CP001".to_string(), 2)]);
        assert_eq!(h.reasons.take(2).as_deref(), Some(STOP_BY_SERVER));
        // The rest of the batch is not processed.
        assert_eq!(h.storage.telemetry_rows(2).len(), 1);
    }

    #[tokio::test]
    async fn baseline_is_looked_up_once_per_transaction() {
        let h = harness(dec!(100));
        with_predecessor(&h).await;
        h.guard.evaluate(&[energy(2, "1500")], 2, &conn()).await.unwrap();

        // A later row from the "previous" transaction must not shift the baseline.
        let mut late = TelemetryRecord::new(1, conn(), "TAG");
        late.timestamp = at(3);
        late.energy_wh = dec!(1400);
        h.storage.telemetry().insert(late).await.unwrap();

        let outcome = h.guard.evaluate(&[energy(4, "2000")], 2, &conn()).await.unwrap();
        assert_eq!(outcome, StreamingOutcome::Priced { balance: dec!(100), cost: dec!(9.44) });
        assert_eq!(h.cache.get(&2), Some(dec!(1000)));
    }

    #[tokio::test]
    async fn no_predecessor_means_zero_baseline() {
        let h = harness(dec!(100));
        h.storage
            .transactions()
            .save(ChargingTransaction::new(1, conn(), "TAG", at(0)))
            .await
            .unwrap();

        let outcome = h.guard.evaluate(&[energy(1, "0.5")], 1, &conn()).await;
        assert!(matches!(outcome, Ok(StreamingOutcome::Priced { .. })));
        assert_eq!(h.cache.get(&1), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn register_below_baseline_costs_nothing() {
        let h = harness(dec!(1));
        with_predecessor(&h).await;
        let outcome = h.guard.evaluate(&[energy(2, "200")], 2, &conn()).await.unwrap();
        assert_eq!(outcome, StreamingOutcome::Priced { balance: dec!(1), cost: Decimal::ZERO });
    }

    #[tokio::test]
    async fn malformed_measurand_keeps_the_rest() {
        let h = harness(dec!(100));
        with_predecessor(&h).await;
        let reading = MeterReading {
            timestamp: at(2),
            values: vec![
                SampledReading::new(Measurand::Voltage, "n/a"),
                SampledReading::new(Measurand::SoC, "55"),
                SampledReading::new(Measurand::EnergyActiveImportRegister, "1.5").with_unit("kWh"),
            ],
        };

        h.guard.evaluate(&[reading], 2, &conn()).await.unwrap();

        let row = &h.storage.telemetry_rows(2)[0];
        assert_eq!(row.voltage, Decimal::ZERO);
        assert_eq!(row.soc, dec!(55));
        assert_eq!(row.total_amount, Some(dec!(4.72)));
    }

    #[tokio::test]
    async fn wallet_outage_skips_batch() {
        let h = harness(dec!(100));
        with_predecessor(&h).await;
        h.wallet.set_unavailable(true);

        let outcome = h.guard.evaluate(&[energy(2, "1500")], 2, &conn()).await.unwrap();

        assert_eq!(outcome, StreamingOutcome::Skipped);
        assert!(h.storage.telemetry_rows(2).is_empty());
    }

    #[tokio::test]
    async fn unknown_transaction_is_skipped() {
        let h = harness(dec!(100));
        let outcome = h.guard.evaluate(&[energy(2, "1500")], 99, &conn()).await.unwrap();
        assert_eq!(outcome, StreamingOutcome::Skipped);
        assert_eq!(h.wallet.calls(), 0);
    }
}
