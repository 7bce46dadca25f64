//! OCPP 1.6 message handler
//!
//! Parses raw OCPP-J frames from one charge point, dispatches calls to the
//! action handlers, and routes command responses back to the
//! [`CommandSender`](crate::application::commands::CommandSender).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::commands::SharedCommandSender;
use crate::application::handlers::ocpp_v16::action_matcher;
use crate::application::services::{SessionLifecycle, TelemetryIngress};
use crate::application::session::SharedSessionRegistry;
use crate::notifications::SharedEventBus;
use crate::shared::OcppFrame;

/// Heartbeat interval handed out in BootNotification responses.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u32 = 300;

/// Everything the action handlers need, shared by all connections.
#[derive(Clone)]
pub struct OcppServices {
    pub registry: SharedSessionRegistry,
    pub lifecycle: Arc<SessionLifecycle>,
    pub telemetry: Arc<TelemetryIngress>,
    pub command_sender: SharedCommandSender,
    pub event_bus: SharedEventBus,
    pub heartbeat_interval_secs: u32,
}

/// Handler for one charge point's OCPP 1.6 messages
pub struct OcppHandlerV16 {
    pub charge_point_id: String,
    pub services: OcppServices,
}

impl OcppHandlerV16 {
    pub fn new(charge_point_id: impl Into<String>, services: OcppServices) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            services,
        }
    }

    /// Handle one text frame; returns the frame to send back, if any.
    pub async fn handle(&self, text: &str) -> Option<String> {
        debug!(charge_point_id = self.charge_point_id.as_str(), "Received raw message: {}", text);
        self.services.registry.touch(&self.charge_point_id);

        let frame = match OcppFrame::parse(text) {
            Ok(f) => f,
            Err(e) => {
                warn!(charge_point_id = self.charge_point_id.as_str(), error = %e, "Dropping unparseable frame");
                return None;
            }
        };

        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => Some(self.handle_call(&unique_id, &action, payload).await),

            OcppFrame::CallResult { unique_id, payload } => {
                self.services
                    .command_sender
                    .handle_response(&self.charge_point_id, &unique_id, payload);
                None
            }

            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
            } => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    message_id = unique_id.as_str(),
                    error_code = error_code.as_str(),
                    "Received CallError"
                );
                self.services.command_sender.handle_error(
                    &self.charge_point_id,
                    &unique_id,
                    &error_code,
                    &error_description,
                );
                None
            }
        }
    }

    async fn handle_call(&self, unique_id: &str, action: &str, payload: Value) -> String {
        info!(charge_point_id = self.charge_point_id.as_str(), action, "Received Call");

        let response = match action_matcher(self, action, &payload).await {
            Some(payload) => OcppFrame::CallResult {
                unique_id: unique_id.to_string(),
                payload,
            },
            None => OcppFrame::error_response(
                unique_id,
                "NotImplemented",
                format!("{} is not handled by the billing engine", action),
            ),
        };
        response.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::create_command_sender;
    use crate::application::ports::{ConnectorStatus, ReachabilityPort, RegistrationStatus};
    use crate::application::services::testing::{
        FakeReachability, FakeWallet, RecordingCommands, RecordingNotifier,
    };
    use crate::application::services::{
        LastEnergyCache, SessionCommandFacade, SessionCostLedger, StopReasonStore,
        StreamingWalletGuard, WalletStopDispatcher, STOP_BY_SERVER,
    };
    use crate::application::session::SessionRegistry;
    use crate::domain::RepositoryProvider;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::create_event_bus;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Harness {
        handler: OcppHandlerV16,
        storage: Arc<InMemoryStorage>,
        registry: SharedSessionRegistry,
        reasons: Arc<StopReasonStore>,
    }

    fn harness() -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let registry = SessionRegistry::shared();
        let events = create_event_bus();
        let reasons = Arc::new(StopReasonStore::new());
        let cache = Arc::new(LastEnergyCache::new());
        let facade = Arc::new(SessionCommandFacade::new(
            Arc::new(RecordingCommands::default()),
            Arc::new(FakeReachability::default()),
            Arc::new(RecordingNotifier::default()),
        ));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade,
            reasons.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let streaming = Arc::new(StreamingWalletGuard::new(
            storage.clone(),
            Arc::new(FakeWallet::new(dec!(100), dec!(8))),
            stopper.clone(),
            cache.clone(),
        ));
        let lifecycle = Arc::new(SessionLifecycle::new(
            storage.clone(),
            Arc::new(SessionCostLedger::new(storage.clone())),
            reasons.clone(),
            cache,
            stopper,
            events.clone(),
        ));
        let services = OcppServices {
            registry: registry.clone(),
            lifecycle,
            telemetry: Arc::new(TelemetryIngress::new(storage.clone(), streaming, events.clone())),
            command_sender: create_command_sender(registry.clone(), Duration::from_secs(1)),
            event_bus: events,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        };
        Harness {
            handler: OcppHandlerV16::new("CP001", services),
            storage,
            registry,
            reasons,
        }
    }

    fn result_payload(frame: Option<String>) -> Value {
        match OcppFrame::parse(&frame.unwrap()).unwrap() {
            OcppFrame::CallResult { payload, .. } => payload,
            other => panic!("expected CallResult, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn boot_and_status_update_reachability() {
        let h = harness();
        let boot = h
            .handler
            .handle(r#"[2,"1","BootNotification",{"chargePointVendor":"Acme","chargePointModel":"X1"}]"#)
            .await;
        let boot = result_payload(boot);
        assert_eq!(boot["status"], "Accepted");
        assert_eq!(boot["interval"], DEFAULT_HEARTBEAT_INTERVAL_SECS);
        assert_eq!(h.registry.registration_status("CP001").await, RegistrationStatus::Accepted);

        h.handler
            .handle(r#"[2,"2","StatusNotification",{"connectorId":1,"errorCode":"NoError","status":"Preparing"}]"#)
            .await;
        assert_eq!(
            h.registry.connector_status("CP001", 1).await,
            Some(ConnectorStatus::Preparing)
        );
    }

    #[tokio::test]
    async fn transaction_round_trip_records_billing_state() {
        let h = harness();
        let start = h
            .handler
            .handle(r#"[2,"1","StartTransaction",{"connectorId":1,"idTag":"TAG","meterStart":1000,"timestamp":"2024-05-01T10:00:00Z"}]"#)
            .await;
        let tx_id = result_payload(start)["transactionId"].as_i64().unwrap() as i32;
        assert_eq!(tx_id, 1);

        h.handler
            .handle(&format!(
                r#"[2,"2","MeterValues",{{"connectorId":1,"transactionId":{},"meterValue":[{{"timestamp":"2024-05-01T10:05:00Z","sampledValue":[{{"value":"1500"}}]}}]}}]"#,
                tx_id
            ))
            .await;
        assert_eq!(h.storage.telemetry_rows(tx_id).len(), 1);

        h.reasons.put(tx_id, STOP_BY_SERVER);
        h.handler
            .handle(&format!(
                r#"[2,"3","StopTransaction",{{"transactionId":{},"meterStop":1600,"timestamp":"2024-05-01T10:10:00Z","reason":"Remote"}}]"#,
                tx_id
            ))
            .await;

        let tx = h.storage.transactions().find_by_id(tx_id).await.unwrap().unwrap();
        assert!(!tx.is_open());
        assert_eq!(tx.stop_reason.as_deref(), Some(STOP_BY_SERVER));
    }

    #[tokio::test]
    async fn unhandled_action_gets_call_error() {
        let h = harness();
        let reply = h.handler.handle(r#"[2,"9","FirmwareStatusNotification",{"status":"Idle"}]"#).await;
        match OcppFrame::parse(&reply.unwrap()).unwrap() {
            OcppFrame::CallError { error_code, .. } => assert_eq!(error_code, "NotImplemented"),
            other => panic!("expected CallError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_is_dropped() {
        let h = harness();
        assert!(h.handler.handle("not a frame").await.is_none());
    }
}
