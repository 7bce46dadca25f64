//! Charging transaction entity

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::metering::ConnectorRef;

/// A charging session as seen by the billing engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingTransaction {
    pub id: i32,
    pub connector: ConnectorRef,
    /// Account identifier that started the transaction
    pub id_tag: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<String>,
}

impl ChargingTransaction {
    pub fn new(id: i32, connector: ConnectorRef, id_tag: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            connector,
            id_tag: id_tag.into(),
            started_at,
            stopped_at: None,
            stop_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn stop(&mut self, at: DateTime<Utc>, reason: Option<String>) {
        self.stopped_at = Some(at);
        self.stop_reason = reason;
    }
}
