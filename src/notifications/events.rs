//! Billing engine events
//!
//! Published on the [`EventBus`](super::EventBus) for subscribers such as a
//! push gateway or an operator dashboard.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    ChargePointConnected(ChargePointConnectedEvent),
    ChargePointDisconnected(ChargePointDisconnectedEvent),
    ConnectorStatusChanged(ConnectorStatusChangedEvent),
    TransactionStarted(TransactionStartedEvent),
    TransactionStopped(TransactionStoppedEvent),
    MeterValuesReceived(MeterValuesEvent),
    /// A polling interval was priced and written to the ledger
    IntervalBilled(IntervalBilledEvent),
    /// A wallet guard decided to stop a transaction
    WalletGuardStop(WalletGuardStopEvent),
    /// Message addressed to the account holder
    UserAlert(UserAlertEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ChargePointConnected(_) => "charge_point_connected",
            Event::ChargePointDisconnected(_) => "charge_point_disconnected",
            Event::ConnectorStatusChanged(_) => "connector_status_changed",
            Event::TransactionStarted(_) => "transaction_started",
            Event::TransactionStopped(_) => "transaction_stopped",
            Event::MeterValuesReceived(_) => "meter_values_received",
            Event::IntervalBilled(_) => "interval_billed",
            Event::WalletGuardStop(_) => "wallet_guard_stop",
            Event::UserAlert(_) => "user_alert",
        }
    }

    pub fn charge_point_id(&self) -> Option<&str> {
        match self {
            Event::ChargePointConnected(e) => Some(&e.charge_point_id),
            Event::ChargePointDisconnected(e) => Some(&e.charge_point_id),
            Event::ConnectorStatusChanged(e) => Some(&e.charge_point_id),
            Event::TransactionStarted(e) => Some(&e.charge_point_id),
            Event::TransactionStopped(e) => Some(&e.charge_point_id),
            Event::MeterValuesReceived(e) => Some(&e.charge_point_id),
            Event::WalletGuardStop(e) => Some(&e.charge_point_id),
            Event::IntervalBilled(_) | Event::UserAlert(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointConnectedEvent {
    pub charge_point_id: String,
    pub timestamp: DateTime<Utc>,
    pub remote_addr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointDisconnectedEvent {
    pub charge_point_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorStatusChangedEvent {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStartedEvent {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub transaction_id: i32,
    pub id_tag: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStoppedEvent {
    pub charge_point_id: String,
    pub transaction_id: i32,
    /// Server-side reason if the stop was requested by the billing engine
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterValuesEvent {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub transaction_id: Option<i32>,
    pub energy_wh: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalBilledEvent {
    pub transaction_id: i32,
    pub energy_kwh: Decimal,
    pub total_amount: Decimal,
    pub interval_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletGuardStopEvent {
    pub charge_point_id: String,
    pub transaction_id: i32,
    pub id_tag: String,
    pub balance: Decimal,
    pub cost: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAlertEvent {
    pub id_tag: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Envelope with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
