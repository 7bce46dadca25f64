//! Charge point connection handle

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Outbound side of an active charge point connection.
#[derive(Debug)]
pub struct Connection {
    pub charge_point_id: String,
    /// Frames queued here are written to the socket by the transport task
    pub sender: mpsc::UnboundedSender<String>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    pub fn new(charge_point_id: impl Into<String>, sender: mpsc::UnboundedSender<String>) -> Self {
        let now = Utc::now();
        Self {
            charge_point_id: charge_point_id.into(),
            sender,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|e| format!("Failed to send message: {}", e))
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_delivers_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("CP001", tx);
        conn.send("[2,\"1\",\"Heartbeat\",{}]".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "[2,\"1\",\"Heartbeat\",{}]");
    }

    #[test]
    fn send_after_socket_closed_fails() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new("CP001", tx);
        drop(rx);
        assert!(conn.send("x".into()).is_err());
    }
}
