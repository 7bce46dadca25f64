//! Domain layer: entities, value types, and repository interfaces.

pub mod billing;
pub mod metering;
pub mod repositories;
pub mod schedule;
pub mod tariff;
pub mod transaction;

pub use billing::{BillingCheckpoint, Charge, CostEntry, LedgerRepository, WalletSnapshot};
pub use metering::{
    ConnectorRef, EnergyDelta, EnergySeed, Measurand, MeterDeltaAccumulator, MeterReading,
    MeterReadingRepository, MeterSample, SampledReading, TelemetryRecord, TelemetryRepository,
};
pub use repositories::{DomainResult, RepositoryProvider};
pub use schedule::ChargingSchedule;
pub use tariff::{TariffClock, TariffWindow};
pub use transaction::{ChargingTransaction, TransactionRepository};

pub use crate::shared::errors::DomainError;
