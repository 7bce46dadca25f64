//! [`ChargePointCommandPort`] over OCPP 1.6 sockets.

use async_trait::async_trait;

use super::{remote_start_transaction, remote_stop_transaction, CommandError, SharedCommandSender};
use crate::application::ports::{ChargePointCommandPort, CommandStatus};

pub struct OcppCommandGateway {
    command_sender: SharedCommandSender,
}

impl OcppCommandGateway {
    pub fn new(command_sender: SharedCommandSender) -> Self {
        Self { command_sender }
    }
}

#[async_trait]
impl ChargePointCommandPort for OcppCommandGateway {
    async fn remote_start_transaction(
        &self,
        charge_box_id: &str,
        id_tag: &str,
        connector_id: Option<u32>,
    ) -> Result<CommandStatus, CommandError> {
        remote_start_transaction(&self.command_sender, charge_box_id, id_tag, connector_id).await
    }

    async fn remote_stop_transaction(
        &self,
        charge_box_id: &str,
        transaction_id: i32,
    ) -> Result<CommandStatus, CommandError> {
        remote_stop_transaction(&self.command_sender, charge_box_id, transaction_id).await
    }
}
