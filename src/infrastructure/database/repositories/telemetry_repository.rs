//! SeaORM implementation of TelemetryRepository

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, NotSet,
    QueryFilter, QueryOrder, Set,
};

use super::db_err;
use crate::domain::{ConnectorRef, DomainError, DomainResult, TelemetryRecord, TelemetryRepository};
use crate::infrastructure::database::entities::transaction_telemetry;

pub struct SeaOrmTelemetryRepository {
    db: DatabaseConnection,
}

impl SeaOrmTelemetryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TelemetryRepository for SeaOrmTelemetryRepository {
    async fn insert(&self, record: TelemetryRecord) -> DomainResult<()> {
        let model = transaction_telemetry::ActiveModel {
            id: NotSet,
            transaction_id: Set(record.transaction_id),
            charge_box_id: Set(record.connector.charge_box_id),
            connector_id: Set(record.connector.connector_id as i32),
            id_tag: Set(record.id_tag),
            timestamp: Set(record.timestamp),
            voltage: Set(record.voltage),
            power_w: Set(record.power_w),
            energy_wh: Set(record.energy_wh),
            soc: Set(record.soc),
            offered_power_w: Set(record.offered_power_w),
            tax_amount: Set(record.tax_amount),
            total_amount: Set(record.total_amount),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn update_latest_cost(
        &self,
        transaction_id: i32,
        tax_amount: Decimal,
        total_amount: Decimal,
    ) -> DomainResult<()> {
        let latest = transaction_telemetry::Entity::find()
            .filter(transaction_telemetry::Column::TransactionId.eq(transaction_id))
            .order_by_desc(transaction_telemetry::Column::Timestamp)
            .order_by_desc(transaction_telemetry::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(latest) = latest else {
            return Err(DomainError::NotFound {
                entity: "TransactionTelemetry",
                field: "transaction_id",
                value: transaction_id.to_string(),
            });
        };

        debug!(
            "Telemetry row {} of transaction {}: tax={} total={}",
            latest.id, transaction_id, tax_amount, total_amount
        );
        let mut model = latest.into_active_model();
        model.tax_amount = Set(Some(tax_amount));
        model.total_amount = Set(Some(total_amount));
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn last_energy_of_previous_transaction(
        &self,
        connector: &ConnectorRef,
        transaction_id: i32,
    ) -> DomainResult<Option<Decimal>> {
        let latest = transaction_telemetry::Entity::find()
            .filter(
                transaction_telemetry::Column::ChargeBoxId.eq(connector.charge_box_id.as_str()),
            )
            .filter(transaction_telemetry::Column::ConnectorId.eq(connector.connector_id as i32))
            .filter(transaction_telemetry::Column::TransactionId.lt(transaction_id))
            .order_by_desc(transaction_telemetry::Column::Timestamp)
            .order_by_desc(transaction_telemetry::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(latest.map(|row| row.energy_wh))
    }
}
