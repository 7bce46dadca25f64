//! Telemetry ingress
//!
//! Turns OCPP 1.6 `MeterValue` batches into domain readings, records the
//! energy register per connector for the polling guard, and hands the batch
//! to the streaming guard when it belongs to a transaction.

use std::sync::Arc;

use rust_ocpp::v1_6::types::MeterValue;
use serde::Serialize;
use tracing::{debug, error};

use super::streaming_guard::{StreamingOutcome, StreamingWalletGuard};
use crate::domain::{
    ConnectorRef, DomainResult, Measurand, MeterReading, MeterSample, RepositoryProvider,
    SampledReading,
};
use crate::notifications::{Event, MeterValuesEvent, SharedEventBus};

const DEFAULT_MEASURAND: &str = "Energy.Active.Import.Register";

/// Wire name of a serde-renamed OCPP enum value.
fn wire_name<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}

/// Convert OCPP meter values to domain readings. A sampled value without a
/// measurand is the energy register, as OCPP defines.
pub fn readings_from_ocpp(meter_values: &[MeterValue]) -> Vec<MeterReading> {
    meter_values
        .iter()
        .map(|mv| MeterReading {
            timestamp: mv.timestamp,
            values: mv
                .sampled_value
                .iter()
                .map(|sv| {
                    let measurand = sv
                        .measurand
                        .as_ref()
                        .and_then(wire_name)
                        .unwrap_or_else(|| DEFAULT_MEASURAND.to_string());
                    SampledReading {
                        measurand: Measurand::from_ocpp_name(&measurand),
                        value: sv.value.clone(),
                        unit: sv.unit.as_ref().and_then(wire_name),
                    }
                })
                .collect(),
        })
        .collect()
}

pub struct TelemetryIngress {
    repos: Arc<dyn RepositoryProvider>,
    streaming: Arc<StreamingWalletGuard>,
    events: SharedEventBus,
}

impl TelemetryIngress {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        streaming: Arc<StreamingWalletGuard>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            streaming,
            events,
        }
    }

    /// Record a batch. When the charger omits the transaction id, the open
    /// transaction on the connector is used.
    pub async fn ingest(
        &self,
        connector: ConnectorRef,
        transaction_id: Option<i32>,
        meter_values: &[MeterValue],
    ) -> DomainResult<Option<StreamingOutcome>> {
        let readings = readings_from_ocpp(meter_values);

        let mut last_energy = None;
        for reading in &readings {
            if let Some(wh) = reading.energy_wh() {
                if let Err(e) = self
                    .repos
                    .meter_readings()
                    .append(MeterSample::new(connector.clone(), reading.timestamp, wh))
                    .await
                {
                    error!(connector = %connector, error = %e, "Meter reading not recorded");
                }
                last_energy = Some(wh);
            }
        }

        let transaction_id = match transaction_id {
            Some(id) => Some(id),
            None => self
                .repos
                .transactions()
                .find_open_for_connector(&connector)
                .await?
                .map(|tx| tx.id),
        };

        self.events.publish(Event::MeterValuesReceived(MeterValuesEvent {
            charge_point_id: connector.charge_box_id.clone(),
            connector_id: connector.connector_id,
            transaction_id,
            energy_wh: last_energy,
            timestamp: readings
                .last()
                .map(|r| r.timestamp)
                .unwrap_or_else(chrono::Utc::now),
        }));

        match transaction_id {
            Some(id) if !readings.is_empty() => {
                self.streaming.evaluate(&readings, id, &connector).await.map(Some)
            }
            _ => {
                debug!(connector = %connector, "Meter values outside a transaction");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::session::SessionCommandFacade;
    use crate::application::services::stop_reason::StopReasonStore;
    use crate::application::services::streaming_guard::LastEnergyCache;
    use crate::application::services::testing::{
        FakeReachability, FakeWallet, RecordingCommands, RecordingNotifier,
    };
    use crate::application::services::wallet_stop::WalletStopDispatcher;
    use crate::domain::{
        ChargingTransaction, DomainError, LedgerRepository, MeterReadingRepository,
        TelemetryRepository, TransactionRepository,
    };
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::create_event_bus;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn meter_values(value: serde_json::Value) -> Vec<MeterValue> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_wire_names_and_units() {
        let mvs = meter_values(json!([{
            "timestamp": "2024-05-01T10:00:00Z",
            "sampledValue": [
                {"value": "1.5", "measurand": "Energy.Active.Import.Register", "unit": "kWh"},
                {"value": "7.2", "measurand": "Power.Active.Import", "unit": "kW"},
                {"value": "230"  , "measurand": "Voltage", "unit": "V"},
                {"value": "900"}
            ]
        }]));

        let readings = readings_from_ocpp(&mvs);

        assert_eq!(readings.len(), 1);
        let values = &readings[0].values;
        assert_eq!(values[0].unit.as_deref(), Some("kWh"));
        assert_eq!(values[1].measurand, Measurand::PowerActiveImport);
        assert_eq!(values[2].measurand, Measurand::Voltage);
        assert_eq!(values[3].measurand, Measurand::EnergyActiveImportRegister);
        assert_eq!(readings[0].energy_wh(), Some(dec!(1500)));
    }

    /// Meter reading store whose writes always fail.
    struct BrokenMeterReadings;

    #[async_trait]
    impl MeterReadingRepository for BrokenMeterReadings {
        async fn append(&self, _sample: MeterSample) -> DomainResult<()> {
            Err(DomainError::Storage("disk full".into()))
        }

        async fn latest_at_or_before(
            &self,
            _connector: &ConnectorRef,
            _at: DateTime<Utc>,
        ) -> DomainResult<Option<MeterSample>> {
            Ok(None)
        }

        async fn readings_between(
            &self,
            _connector: &ConnectorRef,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> DomainResult<Vec<MeterSample>> {
            Ok(Vec::new())
        }
    }

    struct BrokenMeterStorage {
        inner: InMemoryStorage,
        readings: BrokenMeterReadings,
    }

    impl RepositoryProvider for BrokenMeterStorage {
        fn transactions(&self) -> &dyn TransactionRepository {
            self.inner.transactions()
        }
        fn meter_readings(&self) -> &dyn MeterReadingRepository {
            &self.readings
        }
        fn telemetry(&self) -> &dyn TelemetryRepository {
            self.inner.telemetry()
        }
        fn ledger(&self) -> &dyn LedgerRepository {
            self.inner.ledger()
        }
    }

    async fn open_transaction(repos: &dyn RepositoryProvider, connector: &ConnectorRef) {
        repos
            .transactions()
            .save(ChargingTransaction::new(1, connector.clone(), "TAG", Utc::now()))
            .await
            .unwrap();
    }

    fn ingress(repos: Arc<dyn RepositoryProvider>) -> TelemetryIngress {
        let events = create_event_bus();
        let facade = Arc::new(SessionCommandFacade::new(
            Arc::new(RecordingCommands::default()),
            Arc::new(FakeReachability::default()),
            Arc::new(RecordingNotifier::default()),
        ));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade,
            Arc::new(StopReasonStore::new()),
            events.clone(),
            std::time::Duration::from_secs(60),
        ));
        let streaming = Arc::new(StreamingWalletGuard::new(
            repos.clone(),
            Arc::new(FakeWallet::new(dec!(100), dec!(8))),
            stopper,
            Arc::new(LastEnergyCache::new()),
        ));
        TelemetryIngress::new(repos, streaming, events)
    }

    #[tokio::test]
    async fn ingest_records_energy_and_prices_transaction() {
        let storage = Arc::new(InMemoryStorage::new());
        let connector = ConnectorRef::new("CP001", 1);
        open_transaction(storage.as_ref(), &connector).await;
        let ingress = ingress(storage.clone());

        let mvs = meter_values(json!([{
            "timestamp": "2024-05-01T10:05:00Z",
            "sampledValue": [{"value": "500", "unit": "Wh"}]
        }]));
        let outcome = ingress.ingest(connector.clone(), None, &mvs).await.unwrap();

        assert_eq!(
            outcome,
            Some(StreamingOutcome::Priced { balance: dec!(100), cost: dec!(4.72) })
        );
        let recorded = storage
            .meter_readings()
            .latest_at_or_before(&connector, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.energy_wh, dec!(500));
    }

    #[tokio::test]
    async fn failed_reading_write_still_prices_the_batch() {
        let storage = Arc::new(BrokenMeterStorage {
            inner: InMemoryStorage::new(),
            readings: BrokenMeterReadings,
        });
        let connector = ConnectorRef::new("CP001", 1);
        open_transaction(storage.as_ref(), &connector).await;
        let ingress = ingress(storage.clone());

        let mvs = meter_values(json!([
            {"timestamp": "2024-05-01T10:05:00Z", "sampledValue": [{"value": "200", "unit": "Wh"}]},
            {"timestamp": "2024-05-01T10:06:00Z", "sampledValue": [{"value": "500", "unit": "Wh"}]}
        ]));
        let outcome = ingress.ingest(connector.clone(), Some(1), &mvs).await.unwrap();

        assert_eq!(
            outcome,
            Some(StreamingOutcome::Priced { balance: dec!(100), cost: dec!(4.72) })
        );
        let rows = storage.inner.telemetry_rows(1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].energy_wh, dec!(500));
    }
}
