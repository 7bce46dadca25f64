//! BootNotification handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::types::RegistrationStatus as OcppRegistrationStatus;
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::RegistrationStatus;

pub async fn handle_boot_notification(handler: &OcppHandlerV16, payload: &Value) -> Value {
    let req: BootNotificationRequest = match serde_json::from_value(payload.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(charge_point_id = handler.charge_point_id.as_str(), error = %e, "Failed to parse BootNotification");
            return serde_json::json!({});
        }
    };

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor = req.charge_point_vendor.as_str(),
        model = req.charge_point_model.as_str(),
        "BootNotification"
    );

    handler
        .services
        .registry
        .set_registration(&handler.charge_point_id, RegistrationStatus::Accepted);

    let response = BootNotificationResponse {
        current_time: Utc::now(),
        interval: handler.services.heartbeat_interval_secs,
        status: OcppRegistrationStatus::Accepted,
    };
    serde_json::to_value(&response).unwrap_or_default()
}
