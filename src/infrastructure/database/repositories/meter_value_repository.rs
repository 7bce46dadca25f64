//! SeaORM implementation of MeterReadingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    NotSet, Set,
};

use super::db_err;
use crate::domain::{ConnectorRef, DomainResult, MeterReadingRepository, MeterSample};
use crate::infrastructure::database::entities::meter_value;

pub struct SeaOrmMeterValueRepository {
    db: DatabaseConnection,
}

impl SeaOrmMeterValueRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn for_connector(connector: &ConnectorRef) -> sea_orm::Select<meter_value::Entity> {
        meter_value::Entity::find()
            .filter(meter_value::Column::ChargeBoxId.eq(connector.charge_box_id.as_str()))
            .filter(meter_value::Column::ConnectorId.eq(connector.connector_id as i32))
    }
}

fn model_to_domain(m: meter_value::Model) -> MeterSample {
    MeterSample::new(
        ConnectorRef::new(m.charge_box_id, m.connector_id as u32),
        m.timestamp,
        m.energy_wh,
    )
}

#[async_trait]
impl MeterReadingRepository for SeaOrmMeterValueRepository {
    async fn append(&self, sample: MeterSample) -> DomainResult<()> {
        let model = meter_value::ActiveModel {
            id: NotSet,
            charge_box_id: Set(sample.connector.charge_box_id),
            connector_id: Set(sample.connector.connector_id as i32),
            timestamp: Set(sample.timestamp),
            energy_wh: Set(sample.energy_wh),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn latest_at_or_before(
        &self,
        connector: &ConnectorRef,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<MeterSample>> {
        let model = Self::for_connector(connector)
            .filter(meter_value::Column::Timestamp.lte(at))
            .order_by_desc(meter_value::Column::Timestamp)
            .order_by_desc(meter_value::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn readings_between(
        &self,
        connector: &ConnectorRef,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterSample>> {
        let models = Self::for_connector(connector)
            .filter(meter_value::Column::Timestamp.gt(from))
            .filter(meter_value::Column::Timestamp.lte(to))
            .order_by_asc(meter_value::Column::Timestamp)
            .order_by_asc(meter_value::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
