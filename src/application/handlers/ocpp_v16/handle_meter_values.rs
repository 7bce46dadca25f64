//! MeterValues handler

use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::OcppHandlerV16;
use crate::domain::ConnectorRef;

pub async fn handle_meter_values(handler: &OcppHandlerV16, payload: &Value) -> Value {
    let req: MeterValuesRequest = match serde_json::from_value(payload.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(charge_point_id = handler.charge_point_id.as_str(), error = %e, "Failed to parse MeterValues");
            return serde_json::json!({});
        }
    };

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id = req.connector_id,
        transaction_id = ?req.transaction_id,
        samples = req.meter_value.len(),
        "MeterValues"
    );

    let connector = ConnectorRef::new(handler.charge_point_id.as_str(), req.connector_id);
    match handler
        .services
        .telemetry
        .ingest(connector, req.transaction_id, &req.meter_value)
        .await
    {
        Ok(Some(outcome)) => {
            info!(charge_point_id = handler.charge_point_id.as_str(), ?outcome, "Telemetry priced")
        }
        Ok(None) => {}
        Err(e) => error!(
            charge_point_id = handler.charge_point_id.as_str(),
            error = %e,
            "Failed to record meter values"
        ),
    }

    serde_json::to_value(&MeterValuesResponse {}).unwrap_or_default()
}
