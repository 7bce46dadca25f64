//! Billing aggregate
//!
//! Charges, cost ledger entries, checkpoints, and wallet snapshots.

pub mod model;
pub mod repository;

pub use model::{BillingCheckpoint, Charge, CostEntry, WalletSnapshot};
pub use repository::LedgerRepository;
