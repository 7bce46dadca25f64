//! Billing ledger types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Price of an amount of energy at a unit rate plus percentage tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Charge {
    pub energy_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl Charge {
    pub const ZERO: Charge = Charge {
        energy_cost: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        total: Decimal::ZERO,
    };

    /// `cost = kwh * rate`, `tax = cost * pct / 100`, `total = cost + tax`.
    /// Non-positive energy is never charged.
    pub fn compute(energy_kwh: Decimal, unit_rate: Decimal, tax_rate_percent: Decimal) -> Self {
        if energy_kwh <= Decimal::ZERO {
            return Self::ZERO;
        }
        let energy_cost = energy_kwh * unit_rate;
        let tax_amount = energy_cost * tax_rate_percent / Decimal::ONE_HUNDRED;
        Self {
            energy_cost,
            tax_amount,
            total: energy_cost + tax_amount,
        }
    }
}

/// Where the polling path last stopped billing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingCheckpoint {
    pub transaction_id: i32,
    pub last_billed_at: DateTime<Utc>,
    pub last_billed_energy_wh: Decimal,
}

impl BillingCheckpoint {
    pub fn new(transaction_id: i32, last_billed_at: DateTime<Utc>, last_billed_energy_wh: Decimal) -> Self {
        Self {
            transaction_id,
            last_billed_at,
            last_billed_energy_wh,
        }
    }
}

/// One billed interval. Rows are append-only and never overlap per
/// transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEntry {
    pub transaction_id: i32,
    /// End of the billed interval
    pub timestamp: DateTime<Utc>,
    pub energy_kwh: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Balance and flat unit rate for an account, read fresh per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    pub balance: Decimal,
    pub unit_rate: Decimal,
}

impl WalletSnapshot {
    pub fn new(balance: Decimal, unit_rate: Decimal) -> Self {
        Self { balance, unit_rate }
    }
}
