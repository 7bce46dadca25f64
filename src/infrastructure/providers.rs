//! Static tariff, wallet, and schedule providers
//!
//! Back the outbound provider ports with tables loaded from configuration,
//! for standalone runs and local testing against real chargers.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::application::ports::{ScheduleProvider, TariffProvider, WalletProvider};
use crate::domain::{ChargingSchedule, TariffWindow, WalletSnapshot};
use crate::shared::errors::ProviderError;

/// Tariff windows per charge box, with an optional fallback table.
#[derive(Default)]
pub struct StaticTariffProvider {
    by_charger: HashMap<String, Vec<TariffWindow>>,
    fallback: Option<Vec<TariffWindow>>,
}

impl StaticTariffProvider {
    pub fn new(by_charger: HashMap<String, Vec<TariffWindow>>) -> Self {
        Self {
            by_charger,
            fallback: None,
        }
    }

    /// Windows used for chargers without their own table.
    pub fn with_fallback(mut self, windows: Vec<TariffWindow>) -> Self {
        if !windows.is_empty() {
            self.fallback = Some(windows);
        }
        self
    }
}

#[async_trait]
impl TariffProvider for StaticTariffProvider {
    async fn tariffs(&self, charge_box_id: &str) -> Result<Vec<TariffWindow>, ProviderError> {
        self.by_charger
            .get(charge_box_id)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("tariff for {}", charge_box_id)))
    }
}

/// Prepaid wallets keyed by id tag.
///
/// Balances can be adjusted at runtime; the guards read them fresh on every
/// evaluation.
#[derive(Default)]
pub struct StaticWalletProvider {
    wallets: DashMap<String, WalletSnapshot>,
}

impl StaticWalletProvider {
    pub fn new(wallets: impl IntoIterator<Item = (String, WalletSnapshot)>) -> Self {
        Self {
            wallets: wallets.into_iter().collect(),
        }
    }

    pub fn set_balance(&self, id_tag: &str, balance: Decimal) -> bool {
        match self.wallets.get_mut(id_tag) {
            Some(mut wallet) => {
                wallet.balance = balance;
                true
            }
            None => false,
        }
    }

    fn snapshot(&self, id_tag: &str) -> Result<WalletSnapshot, ProviderError> {
        self.wallets
            .get(id_tag)
            .map(|w| *w)
            .ok_or_else(|| ProviderError::NotFound(format!("wallet for {}", id_tag)))
    }
}

#[async_trait]
impl WalletProvider for StaticWalletProvider {
    async fn balance(&self, id_tag: &str) -> Result<Decimal, ProviderError> {
        self.snapshot(id_tag).map(|w| w.balance)
    }

    async fn wallet_and_rate(&self, id_tag: &str) -> Result<WalletSnapshot, ProviderError> {
        self.snapshot(id_tag)
    }
}

/// Booked charging schedules, replaceable as a whole.
#[derive(Default)]
pub struct StaticScheduleProvider {
    schedules: RwLock<Vec<ChargingSchedule>>,
}

impl StaticScheduleProvider {
    pub fn new(schedules: Vec<ChargingSchedule>) -> Self {
        Self {
            schedules: RwLock::new(schedules),
        }
    }

    pub async fn replace(&self, schedules: Vec<ChargingSchedule>) {
        debug!(count = schedules.len(), "Replacing charging schedules");
        *self.schedules.write().await = schedules;
    }
}

#[async_trait]
impl ScheduleProvider for StaticScheduleProvider {
    async fn schedules(&self) -> Result<Vec<ChargingSchedule>, ProviderError> {
        Ok(self.schedules.read().await.clone())
    }
}
