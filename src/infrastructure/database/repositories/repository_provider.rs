//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::{
    LedgerRepository, MeterReadingRepository, RepositoryProvider, TelemetryRepository,
    TransactionRepository,
};

use super::ledger_repository::SeaOrmLedgerRepository;
use super::meter_value_repository::SeaOrmMeterValueRepository;
use super::telemetry_repository::SeaOrmTelemetryRepository;
use super::transaction_repository::SeaOrmTransactionRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let open = repos.transactions().find_open_by_id_tag("TAG-001").await?;
/// let checkpoint = repos.ledger().checkpoint(open[0].id).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    transactions: SeaOrmTransactionRepository,
    meter_readings: SeaOrmMeterValueRepository,
    telemetry: SeaOrmTelemetryRepository,
    ledger: SeaOrmLedgerRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            meter_readings: SeaOrmMeterValueRepository::new(db.clone()),
            telemetry: SeaOrmTelemetryRepository::new(db.clone()),
            ledger: SeaOrmLedgerRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn meter_readings(&self) -> &dyn MeterReadingRepository {
        &self.meter_readings
    }

    fn telemetry(&self) -> &dyn TelemetryRepository {
        &self.telemetry
    }

    fn ledger(&self) -> &dyn LedgerRepository {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChargingTransaction, ConnectorRef};
    use crate::infrastructure::database::{init_database, DatabaseConfig};
    use chrono::{Duration, TimeZone, Utc};

    async fn provider() -> SeaOrmRepositoryProvider {
        let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        SeaOrmRepositoryProvider::new(db)
    }

    #[tokio::test]
    async fn transactions_open_and_stop() {
        let repos = provider().await;
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let conn = ConnectorRef::new("CP001", 1);

        let first = repos.transactions().next_id().await;
        repos
            .transactions()
            .save(ChargingTransaction::new(first, conn.clone(), "TAG", started))
            .await
            .unwrap();
        let second = repos.transactions().next_id().await;
        assert_eq!(second, first + 1);
        repos
            .transactions()
            .save(ChargingTransaction::new(
                second,
                ConnectorRef::new("CP002", 1),
                "TAG",
                started + Duration::minutes(1),
            ))
            .await
            .unwrap();

        let open = repos.transactions().find_open_by_id_tag("TAG").await.unwrap();
        assert_eq!(open.iter().map(|t| t.id).collect::<Vec<_>>(), vec![first, second]);

        repos
            .transactions()
            .stop(first, started + Duration::minutes(30), Some("StopByServer".into()))
            .await
            .unwrap();
        assert!(repos
            .transactions()
            .find_open_for_connector(&conn)
            .await
            .unwrap()
            .is_none());
        let stopped = repos.transactions().find_by_id(first).await.unwrap().unwrap();
        assert_eq!(stopped.stop_reason.as_deref(), Some("StopByServer"));

        assert!(repos.transactions().stop(999, started, None).await.is_err());
    }
}
