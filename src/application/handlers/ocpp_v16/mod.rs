//! OCPP 1.6 action handlers
//!
//! Only the actions the billing engine consumes are handled; anything else
//! is answered with a `NotImplemented` CallError by the caller.

use serde_json::Value;

use super::OcppHandlerV16;

mod handle_boot_notification;
mod handle_heartbeat;
mod handle_meter_values;
mod handle_start_transaction;
mod handle_status_notification;
mod handle_stop_transaction;

pub use handle_boot_notification::handle_boot_notification;
pub use handle_heartbeat::handle_heartbeat;
pub use handle_meter_values::handle_meter_values;
pub use handle_start_transaction::handle_start_transaction;
pub use handle_status_notification::handle_status_notification;
pub use handle_stop_transaction::handle_stop_transaction;

/// Routes an action name to its handler. `None` for unhandled actions.
pub async fn action_matcher(handler: &OcppHandlerV16, action: &str, payload: &Value) -> Option<Value> {
    let response = match action {
        "BootNotification" => handle_boot_notification(handler, payload).await,
        "Heartbeat" => handle_heartbeat(handler, payload).await,
        "StatusNotification" => handle_status_notification(handler, payload).await,
        "StartTransaction" => handle_start_transaction(handler, payload).await,
        "StopTransaction" => handle_stop_transaction(handler, payload).await,
        "MeterValues" => handle_meter_values(handler, payload).await,
        _ => return None,
    };
    Some(response)
}
