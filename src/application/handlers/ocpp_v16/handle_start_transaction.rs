//! StartTransaction handler

use rust_decimal::Decimal;
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::types::{AuthorizationStatus, IdTagInfo};
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::OcppHandlerV16;
use crate::domain::ConnectorRef;

fn response(transaction_id: i32, status: AuthorizationStatus) -> Value {
    let response = StartTransactionResponse {
        transaction_id,
        id_tag_info: IdTagInfo {
            status,
            expiry_date: None,
            parent_id_tag: None,
        },
    };
    serde_json::to_value(&response).unwrap_or_default()
}

pub async fn handle_start_transaction(handler: &OcppHandlerV16, payload: &Value) -> Value {
    let req: StartTransactionRequest = match serde_json::from_value(payload.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(charge_point_id = handler.charge_point_id.as_str(), error = %e, "Failed to parse StartTransaction");
            return serde_json::json!({});
        }
    };

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id = req.connector_id,
        id_tag = req.id_tag.as_str(),
        meter_start = req.meter_start,
        "StartTransaction"
    );

    let connector = ConnectorRef::new(handler.charge_point_id.as_str(), req.connector_id);
    match handler
        .services
        .lifecycle
        .transaction_started(connector, &req.id_tag, req.timestamp, Decimal::from(req.meter_start))
        .await
    {
        Ok(tx) => response(tx.id, AuthorizationStatus::Accepted),
        Err(e) => {
            error!(charge_point_id = handler.charge_point_id.as_str(), error = %e, "Failed to start transaction");
            response(0, AuthorizationStatus::Invalid)
        }
    }
}
