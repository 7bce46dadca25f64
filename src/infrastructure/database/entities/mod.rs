//! Database entities module

pub mod billing_checkpoint;
pub mod charging_transaction;
pub mod cost_entry;
pub mod meter_value;
pub mod transaction_telemetry;

pub use billing_checkpoint::Entity as BillingCheckpoint;
pub use charging_transaction::Entity as ChargingTransaction;
pub use cost_entry::Entity as CostEntry;
pub use meter_value::Entity as MeterValue;
pub use transaction_telemetry::Entity as TransactionTelemetry;
