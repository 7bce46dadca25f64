//! Create billing_checkpoints table

use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_transactions::Transactions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BillingCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillingCheckpoints::TransactionId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BillingCheckpoints::LastBilledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingCheckpoints::LastBilledEnergyWh)
                            .decimal_len(20, 4)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_billing_checkpoints_transaction")
                            .from(BillingCheckpoints::Table, BillingCheckpoints::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BillingCheckpoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BillingCheckpoints {
    Table,
    TransactionId,
    LastBilledAt,
    LastBilledEnergyWh,
}
