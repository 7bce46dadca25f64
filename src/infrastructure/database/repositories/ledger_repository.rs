//! SeaORM implementation of LedgerRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};

use super::db_err;
use crate::domain::{BillingCheckpoint, CostEntry, DomainResult, LedgerRepository};
use crate::infrastructure::database::entities::{billing_checkpoint, cost_entry};

pub struct SeaOrmLedgerRepository {
    db: DatabaseConnection,
}

impl SeaOrmLedgerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn entry_to_domain(m: cost_entry::Model) -> CostEntry {
    CostEntry {
        transaction_id: m.transaction_id,
        timestamp: m.timestamp,
        energy_kwh: m.energy_kwh,
        tax_amount: m.tax_amount,
        total_amount: m.total_amount,
    }
}

fn checkpoint_to_domain(m: billing_checkpoint::Model) -> BillingCheckpoint {
    BillingCheckpoint::new(m.transaction_id, m.last_billed_at, m.last_billed_energy_wh)
}

#[async_trait]
impl LedgerRepository for SeaOrmLedgerRepository {
    async fn append_entry(&self, entry: CostEntry) -> DomainResult<()> {
        debug!(
            "Cost entry for transaction {}: {} kWh, total {}",
            entry.transaction_id, entry.energy_kwh, entry.total_amount
        );
        let model = cost_entry::ActiveModel {
            id: NotSet,
            transaction_id: Set(entry.transaction_id),
            timestamp: Set(entry.timestamp),
            energy_kwh: Set(entry.energy_kwh),
            tax_amount: Set(entry.tax_amount),
            total_amount: Set(entry.total_amount),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn entries_since(
        &self,
        transaction_id: i32,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<CostEntry>> {
        let models = cost_entry::Entity::find()
            .filter(cost_entry::Column::TransactionId.eq(transaction_id))
            .filter(cost_entry::Column::Timestamp.gt(since))
            .order_by_asc(cost_entry::Column::Timestamp)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(entry_to_domain).collect())
    }

    async fn entries(&self, transaction_id: i32) -> DomainResult<Vec<CostEntry>> {
        let models = cost_entry::Entity::find()
            .filter(cost_entry::Column::TransactionId.eq(transaction_id))
            .order_by_asc(cost_entry::Column::Timestamp)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(entry_to_domain).collect())
    }

    async fn checkpoint(&self, transaction_id: i32) -> DomainResult<Option<BillingCheckpoint>> {
        let model = billing_checkpoint::Entity::find_by_id(transaction_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(checkpoint_to_domain))
    }

    async fn save_checkpoint(&self, checkpoint: BillingCheckpoint) -> DomainResult<()> {
        let model = billing_checkpoint::ActiveModel {
            transaction_id: Set(checkpoint.transaction_id),
            last_billed_at: Set(checkpoint.last_billed_at),
            last_billed_energy_wh: Set(checkpoint.last_billed_energy_wh),
        };
        billing_checkpoint::Entity::insert(model)
            .on_conflict(
                OnConflict::column(billing_checkpoint::Column::TransactionId)
                    .update_columns([
                        billing_checkpoint::Column::LastBilledAt,
                        billing_checkpoint::Column::LastBilledEnergyWh,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_checkpoint(&self, transaction_id: i32) -> DomainResult<()> {
        billing_checkpoint::Entity::delete_by_id(transaction_id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
