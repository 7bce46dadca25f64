//! RemoteStartTransaction command

use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use tracing::info;

use super::{CommandError, CommandSender};
use crate::application::ports::CommandStatus;

pub fn remote_start_request(id_tag: &str, connector_id: Option<u32>) -> RemoteStartTransactionRequest {
    RemoteStartTransactionRequest {
        connector_id,
        id_tag: id_tag.to_string(),
        charging_profile: None,
    }
}

pub async fn remote_start_transaction(
    command_sender: &CommandSender,
    charge_point_id: &str,
    id_tag: &str,
    connector_id: Option<u32>,
) -> Result<CommandStatus, CommandError> {
    info!(charge_point_id, id_tag, ?connector_id, "RemoteStartTransaction");

    let payload = serde_json::to_value(remote_start_request(id_tag, connector_id))
        .map_err(|e| CommandError::SendFailed(format!("Serialization failed: {}", e)))?;

    let result = command_sender
        .send_command(charge_point_id, "RemoteStartTransaction", payload)
        .await?;

    let response: RemoteStartTransactionResponse = serde_json::from_value(result)
        .map_err(|e| CommandError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    Ok(CommandStatus::from_str(&format!("{:?}", response.status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_targets_connector_without_profile() {
        let payload = serde_json::to_value(remote_start_request("TAG-001", Some(2))).unwrap();
        assert_eq!(payload["idTag"], "TAG-001");
        assert_eq!(payload["connectorId"], 2);
        assert!(payload.get("chargingProfile").map_or(true, |v| v.is_null()));
    }
}
