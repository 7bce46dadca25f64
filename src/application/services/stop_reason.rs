//! Server-side stop reasons
//!
//! When the engine asks a charger to stop, it records why. The reason is
//! consumed once, by whoever processes the resulting StopTransaction.

use std::time::Duration;

use tracing::debug;

use crate::shared::cache::ReadOnceMap;

/// Reason recorded by the wallet guards.
pub const STOP_BY_SERVER: &str = "StopByServer";
/// Reason recorded when a charging schedule ends.
pub const SCHEDULER_STOP: &str = "SchedulerStop";

pub struct StopReasonStore {
    reasons: ReadOnceMap<i32, String>,
}

impl StopReasonStore {
    pub fn new() -> Self {
        Self {
            reasons: ReadOnceMap::new(),
        }
    }

    /// Reasons never consumed are dropped after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            reasons: ReadOnceMap::with_ttl(ttl),
        }
    }

    /// Record a reason, replacing any earlier one for the transaction.
    pub fn put(&self, transaction_id: i32, reason: impl Into<String>) {
        self.replace(transaction_id, reason);
    }

    /// Like [`put`](Self::put), but hands back the reason it displaced.
    pub fn replace(&self, transaction_id: i32, reason: impl Into<String>) -> Option<String> {
        let reason = reason.into();
        debug!(transaction_id, reason = reason.as_str(), "Stop reason recorded");
        self.reasons.put(transaction_id, reason)
    }

    /// Consume the reason. A second call returns `None`.
    pub fn take(&self, transaction_id: i32) -> Option<String> {
        self.reasons.take(&transaction_id)
    }

    pub fn contains(&self, transaction_id: i32) -> bool {
        self.reasons.contains(&transaction_id)
    }

    pub fn evict_expired(&self) -> usize {
        self.reasons.evict_expired()
    }
}

impl Default for StopReasonStore {
    fn default() -> Self {
        Self::new()
    }
}
