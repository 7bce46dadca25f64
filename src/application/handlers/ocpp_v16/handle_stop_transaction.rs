//! StopTransaction handler

use rust_decimal::Decimal;
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::OcppHandlerV16;

pub async fn handle_stop_transaction(handler: &OcppHandlerV16, payload: &Value) -> Value {
    let req: StopTransactionRequest = match serde_json::from_value(payload.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(charge_point_id = handler.charge_point_id.as_str(), error = %e, "Failed to parse StopTransaction");
            return serde_json::json!({});
        }
    };

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        transaction_id = req.transaction_id,
        meter_stop = req.meter_stop,
        "StopTransaction"
    );

    if let Err(e) = handler
        .services
        .lifecycle
        .transaction_stopped(
            req.transaction_id,
            req.timestamp,
            Some(Decimal::from(req.meter_stop)),
            req.reason.as_ref().map(|r| format!("{:?}", r)),
        )
        .await
    {
        error!(
            charge_point_id = handler.charge_point_id.as_str(),
            transaction_id = req.transaction_id,
            error = %e,
            "Failed to stop transaction"
        );
    }

    let response = StopTransactionResponse { id_tag_info: None };
    serde_json::to_value(&response).unwrap_or_default()
}
