//! Create transactions table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::ChargeBoxId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::ConnectorId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::IdTag).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::StoppedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::StopReason).string())
                    .to_owned(),
            )
            .await?;

        // Open transactions per account, scanned on every polling tick
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_id_tag")
                    .table(Transactions::Table)
                    .col(Transactions::IdTag)
                    .col(Transactions::StoppedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_connector")
                    .table(Transactions::Table)
                    .col(Transactions::ChargeBoxId)
                    .col(Transactions::ConnectorId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    ChargeBoxId,
    ConnectorId,
    IdTag,
    StartedAt,
    StoppedAt,
    StopReason,
}
