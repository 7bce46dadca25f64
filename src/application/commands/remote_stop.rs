//! RemoteStopTransaction command

use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use tracing::info;

use super::{CommandError, CommandSender};
use crate::application::ports::CommandStatus;

pub fn remote_stop_request(transaction_id: i32) -> RemoteStopTransactionRequest {
    RemoteStopTransactionRequest { transaction_id }
}

pub async fn remote_stop_transaction(
    command_sender: &CommandSender,
    charge_point_id: &str,
    transaction_id: i32,
) -> Result<CommandStatus, CommandError> {
    info!(charge_point_id, transaction_id, "RemoteStopTransaction");

    let payload = serde_json::to_value(remote_stop_request(transaction_id))
        .map_err(|e| CommandError::SendFailed(format!("Serialization failed: {}", e)))?;

    let result = command_sender
        .send_command(charge_point_id, "RemoteStopTransaction", payload)
        .await?;

    let response: RemoteStopTransactionResponse = serde_json::from_value(result)
        .map_err(|e| CommandError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    Ok(CommandStatus::from_str(&format!("{:?}", response.status)))
}
