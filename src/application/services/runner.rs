//! Background runners
//!
//! Fixed-period tasks that drive the polling wallet guard and the charging
//! scheduler until shutdown. Overlapping work is tolerated: the guard
//! serializes per transaction and the scheduler fires each boundary once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::polling_guard::PollingWalletGuard;
use super::scheduled_charging::ScheduledChargingService;
use super::stop_reason::StopReasonStore;
use super::streaming_guard::LastEnergyCache;
use crate::application::ports::ScheduleProvider;
use crate::shared::ShutdownSignal;

/// Periodically runs [`PollingWalletGuard::evaluate_all`] and evicts
/// expired cache entries.
pub struct WalletGuardRunner {
    guard: Arc<PollingWalletGuard>,
    stop_reasons: Arc<StopReasonStore>,
    last_energy: Arc<LastEnergyCache>,
    interval: Duration,
}

impl WalletGuardRunner {
    pub fn new(
        guard: Arc<PollingWalletGuard>,
        stop_reasons: Arc<StopReasonStore>,
        last_energy: Arc<LastEnergyCache>,
        interval: Duration,
    ) -> Self {
        Self {
            guard,
            stop_reasons,
            last_energy,
            interval,
        }
    }

    pub fn start(&self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        let guard = self.guard.clone();
        let stop_reasons = self.stop_reasons.clone();
        let last_energy = self.last_energy.clone();
        let period = self.interval;

        tokio::spawn(async move {
            info!("💰 Wallet guard started (interval: {}s)", period.as_secs());
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match guard.evaluate_all().await {
                            Ok(outcomes) => debug!("Wallet guard evaluated {} accounts", outcomes.len()),
                            Err(e) => warn!("Wallet guard cycle failed: {}", e),
                        }
                        let evicted = stop_reasons.evict_expired() + last_energy.evict_expired();
                        if evicted > 0 {
                            debug!("Evicted {} expired billing cache entries", evicted);
                        }
                    }
                    _ = shutdown.notified().wait() => {
                        info!("💰 Wallet guard shutting down");
                        break;
                    }
                }
            }

            info!("💰 Wallet guard stopped");
        })
    }
}

/// Ticks the charging scheduler against the schedule provider.
pub struct ScheduleRunner {
    service: Arc<ScheduledChargingService>,
    provider: Arc<dyn ScheduleProvider>,
    interval: Duration,
}

impl ScheduleRunner {
    pub fn new(
        service: Arc<ScheduledChargingService>,
        provider: Arc<dyn ScheduleProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            provider,
            interval,
        }
    }

    pub fn start(&self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        let service = self.service.clone();
        let provider = self.provider.clone();
        let period = self.interval;

        tokio::spawn(async move {
            info!("📅 Schedule runner started (interval: {}s)", period.as_secs());
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let actions = service.run_once(provider.as_ref(), Utc::now()).await;
                        if !actions.is_empty() {
                            debug!("Scheduler took {} actions", actions.len());
                        }
                    }
                    _ = shutdown.notified().wait() => {
                        info!("📅 Schedule runner shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ledger::SessionCostLedger;
    use crate::application::services::session::SessionCommandFacade;
    use crate::application::services::testing::{
        FakeReachability, FakeTariffs, FakeWallet, RecordingCommands, RecordingNotifier,
    };
    use crate::application::services::wallet_stop::WalletStopDispatcher;
    use crate::domain::{ChargingTransaction, ConnectorRef, RepositoryProvider};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::create_event_bus;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn wallet_guard_runner_ticks_until_shutdown() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .transactions()
            .save(ChargingTransaction::new(1, ConnectorRef::new("CP001", 1), "TAG", Utc::now()))
            .await
            .unwrap();
        let wallet = Arc::new(FakeWallet::new(dec!(500), dec!(8)));
        let events = create_event_bus();
        let reasons = Arc::new(StopReasonStore::new());
        let facade = Arc::new(SessionCommandFacade::new(
            Arc::new(RecordingCommands::default()),
            Arc::new(FakeReachability::default()),
            Arc::new(RecordingNotifier::default()),
        ));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade,
            reasons.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let guard = Arc::new(PollingWalletGuard::new(
            storage.clone(),
            Arc::new(SessionCostLedger::new(storage.clone())),
            Arc::new(FakeTariffs::default()),
            wallet.clone(),
            stopper,
            events,
        ));

        let runner = WalletGuardRunner::new(
            guard,
            reasons,
            Arc::new(LastEnergyCache::new()),
            Duration::from_millis(10),
        );
        let shutdown = ShutdownSignal::new();
        let handle = runner.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner did not stop")
            .unwrap();

        assert!(wallet.calls() >= 1);
    }
}
