//! Create cost_entries table

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
                    .table(CostEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CostEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CostEntries::TransactionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CostEntries::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CostEntries::EnergyKwh)
                            .decimal_len(20, 6)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CostEntries::TaxAmount)
                            .decimal_len(20, 6)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CostEntries::TotalAmount)
                            .decimal_len(20, 6)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cost_entries_transaction")
                            .from(CostEntries::Table, CostEntries::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cost_entries_transaction_time")
                    .table(CostEntries::Table)
                    .col(CostEntries::TransactionId)
                    .col(CostEntries::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CostEntries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CostEntries {
    Table,
    Id,
    TransactionId,
    Timestamp,
    EnergyKwh,
    TaxAmount,
    TotalAmount,
}
