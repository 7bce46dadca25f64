//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_transactions;
mod m20240601_000002_create_connector_meter_values;
mod m20240601_000003_create_transaction_telemetry;
mod m20240601_000004_create_cost_entries;
mod m20240601_000005_create_billing_checkpoints;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_transactions::Migration),
            Box::new(m20240601_000002_create_connector_meter_values::Migration),
            Box::new(m20240601_000003_create_transaction_telemetry::Migration),
            Box::new(m20240601_000004_create_cost_entries::Migration),
            Box::new(m20240601_000005_create_billing_checkpoints::Migration),
        ]
    }
}
