//! Recording fakes for the outbound ports, shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::commands::CommandError;
use crate::application::ports::{
    ChargePointCommandPort, CommandStatus, ConnectorStatus, ReachabilityPort, RegistrationStatus,
    TariffProvider, UserNotifier, WalletProvider,
};
use crate::domain::{TariffWindow, WalletSnapshot};
use crate::shared::errors::ProviderError;

#[derive(Default)]
pub struct FakeReachability {
    registrations: HashMap<String, RegistrationStatus>,
    online: HashSet<String>,
    connectors: HashMap<(String, u32), ConnectorStatus>,
}

impl FakeReachability {
    pub fn accepted(mut self, charge_box_id: &str) -> Self {
        self.registrations
            .insert(charge_box_id.to_string(), RegistrationStatus::Accepted);
        self
    }

    pub fn online(mut self, charge_box_id: &str) -> Self {
        self.online.insert(charge_box_id.to_string());
        self
    }

    pub fn with_connector(mut self, charge_box_id: &str, connector_id: u32, status: ConnectorStatus) -> Self {
        self.connectors
            .insert((charge_box_id.to_string(), connector_id), status);
        self
    }
}

#[async_trait]
impl ReachabilityPort for FakeReachability {
    async fn registration_status(&self, charge_box_id: &str) -> RegistrationStatus {
        self.registrations
            .get(charge_box_id)
            .copied()
            .unwrap_or(RegistrationStatus::Unknown)
    }

    async fn is_online(&self, charge_box_id: &str) -> bool {
        self.online.contains(charge_box_id)
    }

    async fn connector_status(&self, charge_box_id: &str, connector_id: u32) -> Option<ConnectorStatus> {
        self.connectors
            .get(&(charge_box_id.to_string(), connector_id))
            .copied()
    }
}

#[derive(Default)]
pub struct RecordingCommands {
    starts: Mutex<Vec<(String, String, Option<u32>)>>,
    stops: Mutex<Vec<(String, i32)>>,
    fail_stops: AtomicBool,
}

impl RecordingCommands {
    pub fn starts(&self) -> Vec<(String, String, Option<u32>)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<(String, i32)> {
        self.stops.lock().unwrap().clone()
    }

    pub fn stopped_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.stops().into_iter().map(|(_, id)| id).collect();
        ids.sort();
        ids
    }

    pub fn fail_stops(&self) {
        self.fail_stops.store(true, Ordering::SeqCst);
    }

    pub fn succeed_stops(&self) {
        self.fail_stops.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChargePointCommandPort for RecordingCommands {
    async fn remote_start_transaction(
        &self,
        charge_box_id: &str,
        id_tag: &str,
        connector_id: Option<u32>,
    ) -> Result<CommandStatus, CommandError> {
        self.starts
            .lock()
            .unwrap()
            .push((charge_box_id.to_string(), id_tag.to_string(), connector_id));
        Ok(CommandStatus::Accepted)
    }

    async fn remote_stop_transaction(
        &self,
        charge_box_id: &str,
        transaction_id: i32,
    ) -> Result<CommandStatus, CommandError> {
        self.stops
            .lock()
            .unwrap()
            .push((charge_box_id.to_string(), transaction_id));
        if self.fail_stops.load(Ordering::SeqCst) {
            return Err(CommandError::Timeout);
        }
        Ok(CommandStatus::Accepted)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserNotifier for RecordingNotifier {
    async fn notify(&self, id_tag: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((id_tag.to_string(), message.to_string()));
    }
}

#[derive(Default)]
pub struct FakeTariffs {
    tariffs: Mutex<HashMap<String, Vec<TariffWindow>>>,
    calls: AtomicUsize,
}

impl FakeTariffs {
    pub fn with(self, charge_box_id: &str, windows: Vec<TariffWindow>) -> Self {
        self.tariffs
            .lock()
            .unwrap()
            .insert(charge_box_id.to_string(), windows);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TariffProvider for FakeTariffs {
    async fn tariffs(&self, charge_box_id: &str) -> Result<Vec<TariffWindow>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tariffs
            .lock()
            .unwrap()
            .get(charge_box_id)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(charge_box_id.to_string()))
    }
}

pub struct FakeWallet {
    balance: Mutex<Decimal>,
    unit_rate: Decimal,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl FakeWallet {
    pub fn new(balance: Decimal, unit_rate: Decimal) -> Self {
        Self {
            balance: Mutex::new(balance),
            unit_rate,
            unavailable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<Decimal, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("wallet".into()));
        }
        Ok(*self.balance.lock().unwrap())
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn balance(&self, _id_tag: &str) -> Result<Decimal, ProviderError> {
        self.check()
    }

    async fn wallet_and_rate(&self, _id_tag: &str) -> Result<WalletSnapshot, ProviderError> {
        Ok(WalletSnapshot::new(self.check()?, self.unit_rate))
    }
}
