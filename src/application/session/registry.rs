//! Session registry: live charge point connections plus the last reported
//! registration and connector statuses.
//!
//! Statuses outlive the socket so a charger that drops and reconnects keeps
//! its last known state until it reports a new one.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::connection::Connection;
use crate::application::ports::{ConnectorStatus, ReachabilityPort, RegistrationStatus};

pub struct SessionRegistry {
    sessions: DashMap<String, Connection>,
    registrations: DashMap<String, RegistrationStatus>,
    connector_statuses: DashMap<(String, u32), ConnectorStatus>,
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            registrations: DashMap::new(),
            connector_statuses: DashMap::new(),
        }
    }

    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    pub fn register(&self, charge_point_id: &str, sender: mpsc::UnboundedSender<String>) {
        info!(charge_point_id, "Registering charge point session");
        self.sessions
            .insert(charge_point_id.to_string(), Connection::new(charge_point_id, sender));
    }

    pub fn unregister(&self, charge_point_id: &str) {
        if self.sessions.remove(charge_point_id).is_some() {
            info!(charge_point_id, "Unregistered charge point session");
        } else {
            warn!(charge_point_id, "Attempted to unregister unknown session");
        }
    }

    pub fn send_to(&self, charge_point_id: &str, message: String) -> Result<(), String> {
        match self.sessions.get(charge_point_id) {
            Some(conn) => conn.send(message),
            None => Err(format!("Charge point {} not connected", charge_point_id)),
        }
    }

    pub fn touch(&self, charge_point_id: &str) {
        if let Some(mut conn) = self.sessions.get_mut(charge_point_id) {
            conn.touch();
        }
    }

    pub fn is_connected(&self, charge_point_id: &str) -> bool {
        self.sessions.contains_key(charge_point_id)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn set_registration(&self, charge_point_id: &str, status: RegistrationStatus) {
        self.registrations.insert(charge_point_id.to_string(), status);
    }

    pub fn set_connector_status(&self, charge_point_id: &str, connector_id: u32, status: ConnectorStatus) {
        self.connector_statuses
            .insert((charge_point_id.to_string(), connector_id), status);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReachabilityPort for SessionRegistry {
    async fn registration_status(&self, charge_box_id: &str) -> RegistrationStatus {
        self.registrations
            .get(charge_box_id)
            .map(|s| *s)
            .unwrap_or(RegistrationStatus::Unknown)
    }

    async fn is_online(&self, charge_box_id: &str) -> bool {
        self.is_connected(charge_box_id)
    }

    async fn connector_status(&self, charge_box_id: &str, connector_id: u32) -> Option<ConnectorStatus> {
        self.connector_statuses
            .get(&(charge_box_id.to_string(), connector_id))
            .map(|s| *s)
    }
}
