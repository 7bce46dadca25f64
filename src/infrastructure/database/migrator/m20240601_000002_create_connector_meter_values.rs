//! Create connector_meter_values table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectorMeterValues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectorMeterValues::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConnectorMeterValues::ChargeBoxId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectorMeterValues::ConnectorId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectorMeterValues::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectorMeterValues::EnergyWh)
                            .decimal_len(20, 4)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meter_values_connector_time")
                    .table(ConnectorMeterValues::Table)
                    .col(ConnectorMeterValues::ChargeBoxId)
                    .col(ConnectorMeterValues::ConnectorId)
                    .col(ConnectorMeterValues::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConnectorMeterValues::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ConnectorMeterValues {
    Table,
    Id,
    ChargeBoxId,
    ConnectorId,
    Timestamp,
    EnergyWh,
}
