//! Session command facade
//!
//! The only place that issues remote start/stop commands on behalf of the
//! billing engine and the scheduler.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::commands::CommandError;
use crate::application::ports::{
    ChargePointCommandPort, CommandStatus, ReachabilityPort, RegistrationStatus, UserNotifier,
};

pub const MSG_SESSION_STARTED: &str = "Charging session started successfully.";
pub const MSG_DEVICE_OFFLINE: &str = "Cannot start charging. The device is offline";
pub const MSG_NOT_REGISTERED: &str = "Cannot start charging. Device is not registered.";

/// Why a start request was refused before reaching the charger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRejection {
    NotRegistered,
    Offline,
}

impl StartRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotRegistered => MSG_NOT_REGISTERED,
            Self::Offline => MSG_DEVICE_OFFLINE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Remote start was dispatched; carries the charger's answer
    Dispatched(CommandStatus),
    Rejected(StartRejection),
    Failed(CommandError),
}

pub struct SessionCommandFacade {
    commands: Arc<dyn ChargePointCommandPort>,
    reachability: Arc<dyn ReachabilityPort>,
    notifier: Arc<dyn UserNotifier>,
}

impl SessionCommandFacade {
    pub fn new(
        commands: Arc<dyn ChargePointCommandPort>,
        reachability: Arc<dyn ReachabilityPort>,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        Self {
            commands,
            reachability,
            notifier,
        }
    }

    /// Start charging on a connector. A charger that is unknown, not
    /// accepted, or offline gets no command; the user is told why instead.
    pub async fn start_session(&self, charge_box_id: &str, connector_id: u32, id_tag: &str) -> StartOutcome {
        let rejection = match self.reachability.registration_status(charge_box_id).await {
            RegistrationStatus::Unknown => Some(StartRejection::NotRegistered),
            RegistrationStatus::Accepted if self.reachability.is_online(charge_box_id).await => None,
            _ => Some(StartRejection::Offline),
        };

        if let Some(rejection) = rejection {
            warn!(charge_box_id, connector_id, id_tag, ?rejection, "Start session rejected");
            self.notifier.notify(id_tag, rejection.user_message()).await;
            return StartOutcome::Rejected(rejection);
        }

        match self
            .commands
            .remote_start_transaction(charge_box_id, id_tag, Some(connector_id))
            .await
        {
            Ok(status) => {
                info!(charge_box_id, connector_id, id_tag, %status, "Remote start dispatched");
                self.notifier.notify(id_tag, MSG_SESSION_STARTED).await;
                StartOutcome::Dispatched(status)
            }
            Err(e) => {
                error!(charge_box_id, connector_id, id_tag, error = %e, "Remote start failed");
                StartOutcome::Failed(e)
            }
        }
    }

    /// Stop a transaction. Sent regardless of reachability; a failure is
    /// logged and returned, never retried here.
    pub async fn stop_session(
        &self,
        charge_box_id: &str,
        connector_id: u32,
        transaction_id: i32,
    ) -> Result<CommandStatus, CommandError> {
        let result = self
            .commands
            .remote_stop_transaction(charge_box_id, transaction_id)
            .await;
        match &result {
            Ok(status) => {
                info!(charge_box_id, connector_id, transaction_id, %status, "Remote stop dispatched")
            }
            Err(e) => {
                error!(charge_box_id, connector_id, transaction_id, error = %e, "Remote stop failed")
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ConnectorStatus;
    use crate::application::services::testing::{FakeReachability, RecordingCommands, RecordingNotifier};

    fn facade(
        reachability: FakeReachability,
    ) -> (SessionCommandFacade, Arc<RecordingCommands>, Arc<RecordingNotifier>) {
        let commands = Arc::new(RecordingCommands::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let facade = SessionCommandFacade::new(commands.clone(), Arc::new(reachability), notifier.clone());
        (facade, commands, notifier)
    }

    #[tokio::test]
    async fn start_on_accepted_online_charger() {
        let reach = FakeReachability::default().accepted("CP001").online("CP001");
        let (facade, commands, notifier) = facade(reach);

        let outcome = facade.start_session("CP001", 1, "TAG").await;

        assert_eq!(outcome, StartOutcome::Dispatched(CommandStatus::Accepted));
        assert_eq!(commands.starts(), vec![("CP001".to_string(), "TAG".to_string(), Some(1))]);
        assert_eq!(notifier.messages(), vec![("TAG".to_string(), MSG_SESSION_STARTED.to_string())]);
    }

    #[tokio::test]
    async fn offline_charger_gets_no_command() {
        let reach = FakeReachability::default().accepted("CP001");
        let (facade, commands, notifier) = facade(reach);

        let outcome = facade.start_session("CP001", 1, "TAG").await;

        assert_eq!(outcome, StartOutcome::Rejected(StartRejection::Offline));
        assert!(commands.starts().is_empty());
        assert_eq!(notifier.messages()[0].1, MSG_DEVICE_OFFLINE);
    }

    #[tokio::test]
    async fn unregistered_charger_gets_no_command() {
        let reach = FakeReachability::default()
            .online("CP001")
            .with_connector("CP001", 1, ConnectorStatus::Preparing);
        let (facade, commands, notifier) = facade(reach);

        let outcome = facade.start_session("CP001", 1, "TAG").await;

        assert_eq!(outcome, StartOutcome::Rejected(StartRejection::NotRegistered));
        assert!(commands.starts().is_empty());
        assert_eq!(notifier.messages()[0].1, MSG_NOT_REGISTERED);
    }

    #[tokio::test]
    async fn stop_is_sent_even_when_offline() {
        let (facade, commands, _) = facade(FakeReachability::default());
        let status = facade.stop_session("CP001", 1, 42).await.unwrap();
        assert!(status.is_accepted());
        assert_eq!(commands.stops(), vec![("CP001".to_string(), 42)]);
    }

    #[tokio::test]
    async fn stop_failure_is_surfaced() {
        let (facade, commands, _) = facade(FakeReachability::default());
        commands.fail_stops();
        let err = facade.stop_session("CP001", 1, 42).await.unwrap_err();
        assert_eq!(err, CommandError::Timeout);
    }
}
