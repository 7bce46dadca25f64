//! Outbound ports: everything the billing engine consumes from outside
//!
//! Tariff and wallet data come from external providers, commands travel to
//! charge points over whatever transport implements
//! [`ChargePointCommandPort`], and user-facing messages leave through
//! [`UserNotifier`].

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::commands::CommandError;
use crate::domain::{ChargingSchedule, TariffWindow, WalletSnapshot};
use crate::shared::errors::ProviderError;

// ── Pricing and wallet data ────────────────────────────────────

#[async_trait]
pub trait TariffProvider: Send + Sync {
    /// Ordered tariff windows configured for a charger.
    async fn tariffs(&self, charge_box_id: &str) -> Result<Vec<TariffWindow>, ProviderError>;
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Account-level prepaid balance.
    async fn balance(&self, id_tag: &str) -> Result<Decimal, ProviderError>;

    /// Balance together with the flat per-kWh rate used by streaming billing.
    async fn wallet_and_rate(&self, id_tag: &str) -> Result<WalletSnapshot, ProviderError>;
}

#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Charging schedules currently booked.
    async fn schedules(&self) -> Result<Vec<ChargingSchedule>, ProviderError>;
}

// ── Charge point commands ──────────────────────────────────────

/// Response status of a charge point command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Accepted,
    Rejected,
    Unknown(String),
}

impl CommandStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "Accepted" => Self::Accepted,
            "Rejected" => Self::Rejected,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "Accepted"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}

#[async_trait]
pub trait ChargePointCommandPort: Send + Sync {
    async fn remote_start_transaction(
        &self,
        charge_box_id: &str,
        id_tag: &str,
        connector_id: Option<u32>,
    ) -> Result<CommandStatus, CommandError>;

    async fn remote_stop_transaction(
        &self,
        charge_box_id: &str,
        transaction_id: i32,
    ) -> Result<CommandStatus, CommandError>;
}

// ── Reachability ───────────────────────────────────────────────

/// Registration outcome of the charger's last boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Accepted,
    Pending,
    Rejected,
    Unknown,
}

/// Last reported status of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

#[async_trait]
pub trait ReachabilityPort: Send + Sync {
    async fn registration_status(&self, charge_box_id: &str) -> RegistrationStatus;
    async fn is_online(&self, charge_box_id: &str) -> bool;
    async fn connector_status(&self, charge_box_id: &str, connector_id: u32)
        -> Option<ConnectorStatus>;
}

// ── User notifications ─────────────────────────────────────────

#[async_trait]
pub trait UserNotifier: Send + Sync {
    async fn notify(&self, id_tag: &str, message: &str);
}
