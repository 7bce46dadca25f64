//! SeaORM implementation of TransactionRepository

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

use super::db_err;
use crate::domain::{ChargingTransaction, ConnectorRef, DomainError, DomainResult, TransactionRepository};
use crate::infrastructure::database::entities::charging_transaction;

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
    /// Lower bound for the next id handed out by this process
    counter: AtomicI32,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            counter: AtomicI32::new(1),
        }
    }

    async fn max_id(&self) -> DomainResult<i32> {
        let latest = charging_transaction::Entity::find()
            .order_by_desc(charging_transaction::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(latest.map(|t| t.id).unwrap_or(0))
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(t: charging_transaction::Model) -> ChargingTransaction {
    ChargingTransaction {
        id: t.id,
        connector: ConnectorRef::new(t.charge_box_id, t.connector_id as u32),
        id_tag: t.id_tag,
        started_at: t.started_at,
        stopped_at: t.stopped_at,
        stop_reason: t.stop_reason,
    }
}

fn domain_to_active(tx: ChargingTransaction) -> charging_transaction::ActiveModel {
    charging_transaction::ActiveModel {
        id: Set(tx.id),
        charge_box_id: Set(tx.connector.charge_box_id),
        connector_id: Set(tx.connector.connector_id as i32),
        id_tag: Set(tx.id_tag),
        started_at: Set(tx.started_at),
        stopped_at: Set(tx.stopped_at),
        stop_reason: Set(tx.stop_reason),
    }
}

fn is_open_filter() -> sea_orm::sea_query::SimpleExpr {
    charging_transaction::Column::StoppedAt.is_null()
}

// ── TransactionRepository impl ──────────────────────────────────

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn save(&self, transaction: ChargingTransaction) -> DomainResult<()> {
        debug!("Saving transaction: {}", transaction.id);
        self.counter.fetch_max(transaction.id + 1, Ordering::SeqCst);

        charging_transaction::Entity::insert(domain_to_active(transaction))
            .on_conflict(
                OnConflict::column(charging_transaction::Column::Id)
                    .update_columns([
                        charging_transaction::Column::StoppedAt,
                        charging_transaction::Column::StopReason,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargingTransaction>> {
        let model = charging_transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_open_by_id_tag(&self, id_tag: &str) -> DomainResult<Vec<ChargingTransaction>> {
        let models = charging_transaction::Entity::find()
            .filter(charging_transaction::Column::IdTag.eq(id_tag))
            .filter(is_open_filter())
            .order_by_asc(charging_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_open_for_connector(
        &self,
        connector: &ConnectorRef,
    ) -> DomainResult<Option<ChargingTransaction>> {
        let model = charging_transaction::Entity::find()
            .filter(charging_transaction::Column::ChargeBoxId.eq(connector.charge_box_id.as_str()))
            .filter(charging_transaction::Column::ConnectorId.eq(connector.connector_id as i32))
            .filter(is_open_filter())
            .order_by_desc(charging_transaction::Column::StartedAt)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_open(&self) -> DomainResult<Vec<ChargingTransaction>> {
        let models = charging_transaction::Entity::find()
            .filter(is_open_filter())
            .order_by_asc(charging_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn stop(
        &self,
        id: i32,
        stopped_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<()> {
        debug!("Stopping transaction: {} (reason: {:?})", id, reason);
        let existing = charging_transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Transaction",
                field: "id",
                value: id.to_string(),
            });
        };

        let mut model = existing.into_active_model();
        model.stopped_at = Set(Some(stopped_at));
        model.stop_reason = Set(reason);
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn next_id(&self) -> i32 {
        match self.max_id().await {
            Ok(max) => {
                self.counter.fetch_max(max + 1, Ordering::SeqCst);
            }
            Err(e) => warn!("Could not read max transaction id, using local counter: {}", e),
        }
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}
