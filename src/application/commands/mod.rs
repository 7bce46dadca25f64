//! Central system → charge point commands
//!
//! ```text
//! SessionCommandFacade / guards ──► ChargePointCommandPort (OcppCommandGateway)
//!                                          │
//!                                   build rust_ocpp request
//!                                          │
//!                                   CommandSender ──► SessionRegistry ──► socket
//!                                          ▲
//!                  CallResult / CallError ─┘ (correlated by message id)
//! ```
//!
//! A command waits for its response on a oneshot channel registered in a
//! correlation table. The wait is bounded by the configured timeout; a
//! timed-out entry is removed so a late response is logged and dropped.

pub mod gateway;
pub mod remote_start;
pub mod remote_stop;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::application::session::SharedSessionRegistry;
use crate::shared::ocpp_frame::OcppFrame;

pub use gateway::OcppCommandGateway;
pub use remote_start::{remote_start_request, remote_start_transaction};
pub use remote_stop::{remote_stop_request, remote_stop_transaction};

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

struct PendingRequest {
    action_name: String,
    response_sender: oneshot::Sender<Result<Value, CommandError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    NotConnected(String),
    SendFailed(String),
    Timeout,
    InvalidResponse(String),
    CallError { code: String, description: String },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected(id) => write!(f, "Charge point not connected: {}", id),
            Self::SendFailed(msg) => write!(f, "Failed to send: {}", msg),
            Self::Timeout => write!(f, "Response timeout"),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::CallError { code, description } => {
                write!(f, "CallError {}: {}", code, description)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Request/response correlation over the charge point sockets.
pub struct CommandSender {
    session_registry: SharedSessionRegistry,
    pending_requests: DashMap<(String, String), PendingRequest>,
    message_counter: AtomicU64,
    response_timeout: Duration,
}

impl CommandSender {
    pub fn new(session_registry: SharedSessionRegistry, response_timeout: Duration) -> Self {
        Self {
            session_registry,
            pending_requests: DashMap::new(),
            message_counter: AtomicU64::new(1),
            response_timeout,
        }
    }

    fn generate_message_id(&self) -> String {
        let id = self.message_counter.fetch_add(1, Ordering::SeqCst);
        format!("CS-{}", id)
    }

    /// Send `action` with `payload` and wait for the correlated response.
    pub async fn send_command(
        &self,
        charge_point_id: &str,
        action: &str,
        payload: Value,
    ) -> Result<Value, CommandError> {
        let message_id = self.generate_message_id();
        let json = OcppFrame::Call {
            unique_id: message_id.clone(),
            action: action.to_string(),
            payload,
        }
        .serialize();

        let (tx, rx) = oneshot::channel();
        let key = (charge_point_id.to_string(), message_id.clone());
        self.pending_requests.insert(
            key.clone(),
            PendingRequest {
                action_name: action.to_string(),
                response_sender: tx,
            },
        );

        info!(
            charge_point_id,
            action,
            message_id = message_id.as_str(),
            "Sending command"
        );

        if let Err(e) = self.session_registry.send_to(charge_point_id, json) {
            self.pending_requests.remove(&key);
            return Err(CommandError::NotConnected(e));
        }

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending_requests.remove(&key);
                Err(CommandError::InvalidResponse("Channel closed".to_string()))
            }
            Err(_) => {
                self.pending_requests.remove(&key);
                warn!(
                    charge_point_id,
                    action,
                    message_id = message_id.as_str(),
                    "Command timed out"
                );
                Err(CommandError::Timeout)
            }
        }
    }

    pub fn handle_response(&self, charge_point_id: &str, message_id: &str, payload: Value) {
        let key = (charge_point_id.to_string(), message_id.to_string());
        if let Some((_, pending)) = self.pending_requests.remove(&key) {
            info!(
                charge_point_id,
                action = pending.action_name.as_str(),
                message_id,
                "Received response"
            );
            let _ = pending.response_sender.send(Ok(payload));
        } else {
            warn!(charge_point_id, message_id, "Response for unknown request");
        }
    }

    pub fn handle_error(
        &self,
        charge_point_id: &str,
        message_id: &str,
        error_code: &str,
        error_description: &str,
    ) {
        let key = (charge_point_id.to_string(), message_id.to_string());
        if let Some((_, pending)) = self.pending_requests.remove(&key) {
            warn!(
                charge_point_id,
                action = pending.action_name.as_str(),
                message_id,
                error_code,
                error_description,
                "Received error"
            );
            let _ = pending.response_sender.send(Err(CommandError::CallError {
                code: error_code.to_string(),
                description: error_description.to_string(),
            }));
        }
    }

    /// Fail every request still waiting on a charge point that disconnected.
    pub fn cleanup_charge_point(&self, charge_point_id: &str) {
        self.pending_requests.retain(|key, _| key.0 != charge_point_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }
}

pub type SharedCommandSender = Arc<CommandSender>;

pub fn create_command_sender(
    session_registry: SharedSessionRegistry,
    response_timeout: Duration,
) -> SharedCommandSender {
    Arc::new(CommandSender::new(session_registry, response_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::SessionRegistry;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn connected(timeout: Duration) -> (SharedCommandSender, mpsc::UnboundedReceiver<String>) {
        let registry = SessionRegistry::shared();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("CP001", tx);
        (create_command_sender(registry, timeout), rx)
    }

    async fn next_call_id(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        let raw = rx.recv().await.unwrap();
        OcppFrame::parse(&raw).unwrap().unique_id().to_string()
    }

    #[tokio::test]
    async fn response_is_correlated_by_message_id() {
        let (sender, mut rx) = connected(Duration::from_secs(5));
        let s = sender.clone();
        let call = tokio::spawn(async move {
            s.send_command("CP001", "RemoteStopTransaction", json!({"transactionId": 1}))
                .await
        });

        let id = next_call_id(&mut rx).await;
        sender.handle_response("CP001", &id, json!({"status": "Accepted"}));

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["status"], "Accepted");
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test]
    async fn call_error_is_surfaced() {
        let (sender, mut rx) = connected(Duration::from_secs(5));
        let s = sender.clone();
        let call = tokio::spawn(async move {
            s.send_command("CP001", "RemoteStopTransaction", json!({})).await
        });

        let id = next_call_id(&mut rx).await;
        sender.handle_error("CP001", &id, "NotSupported", "nope");

        assert_eq!(
            call.await.unwrap().unwrap_err(),
            CommandError::CallError {
                code: "NotSupported".into(),
                description: "nope".into()
            }
        );
    }

    #[tokio::test]
    async fn unanswered_command_times_out_and_is_forgotten() {
        let (sender, _rx) = connected(Duration::from_millis(20));
        let err = sender
            .send_command("CP001", "RemoteStopTransaction", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Timeout);
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test]
    async fn offline_charge_point_is_rejected_immediately() {
        let sender = create_command_sender(SessionRegistry::shared(), Duration::from_secs(5));
        let err = sender
            .send_command("CP404", "RemoteStopTransaction", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotConnected(_)));
    }
}
