//! Create transaction_telemetry table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransactionTelemetry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionTelemetry::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::TransactionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::ChargeBoxId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::ConnectorId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionTelemetry::IdTag).string().not_null())
                    .col(
                        ColumnDef::new(TransactionTelemetry::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::Voltage)
                            .decimal_len(20, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::PowerW)
                            .decimal_len(20, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::EnergyWh)
                            .decimal_len(20, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::Soc)
                            .decimal_len(20, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TransactionTelemetry::OfferedPowerW)
                            .decimal_len(20, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(TransactionTelemetry::TaxAmount).decimal_len(20, 6))
                    .col(ColumnDef::new(TransactionTelemetry::TotalAmount).decimal_len(20, 6))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_telemetry_transaction")
                    .table(TransactionTelemetry::Table)
                    .col(TransactionTelemetry::TransactionId)
                    .to_owned(),
            )
            .await?;

        // Previous-transaction energy lookup on a connector
        manager
            .create_index(
                Index::create()
                    .name("idx_telemetry_connector")
                    .table(TransactionTelemetry::Table)
                    .col(TransactionTelemetry::ChargeBoxId)
                    .col(TransactionTelemetry::ConnectorId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransactionTelemetry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TransactionTelemetry {
    Table,
    Id,
    TransactionId,
    ChargeBoxId,
    ConnectorId,
    IdTag,
    Timestamp,
    Voltage,
    PowerW,
    EnergyWh,
    Soc,
    OfferedPowerW,
    TaxAmount,
    TotalAmount,
}
