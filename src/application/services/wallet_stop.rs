//! Wallet-depletion stops shared by both guards
//!
//! Tags the transaction `StopByServer`, dispatches the remote stop through
//! the session facade, and remembers the dispatch for a cooldown window so
//! a later tick does not send it again. A failed dispatch forgets the mark
//! and puts back whatever reason was recorded before, leaving the
//! transaction for the next cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::session::SessionCommandFacade;
use super::stop_reason::{StopReasonStore, STOP_BY_SERVER};
use crate::domain::ChargingTransaction;
use crate::notifications::{Event, SharedEventBus, WalletGuardStopEvent};

pub const DEFAULT_STOP_COOLDOWN: Duration = Duration::from_secs(60);

/// Result of asking for a wallet stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDispatch {
    Sent,
    /// Already sent within the cooldown window
    Suppressed,
    Failed,
}

pub struct WalletStopDispatcher {
    facade: Arc<SessionCommandFacade>,
    stop_reasons: Arc<StopReasonStore>,
    events: SharedEventBus,
    recent: DashMap<i32, Instant>,
    cooldown: Duration,
}

impl WalletStopDispatcher {
    pub fn new(
        facade: Arc<SessionCommandFacade>,
        stop_reasons: Arc<StopReasonStore>,
        events: SharedEventBus,
        cooldown: Duration,
    ) -> Self {
        Self {
            facade,
            stop_reasons,
            events,
            recent: DashMap::new(),
            cooldown,
        }
    }

    pub async fn stop(
        &self,
        transaction: &ChargingTransaction,
        balance: Decimal,
        cost: Decimal,
        guard: &'static str,
    ) -> StopDispatch {
        let transaction_id = transaction.id;
        match self.recent.entry(transaction_id) {
            Entry::Occupied(mut mark) => {
                if mark.get().elapsed() < self.cooldown {
                    debug!(transaction_id, guard, "Wallet stop already dispatched, skipping");
                    return StopDispatch::Suppressed;
                }
                mark.insert(Instant::now());
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }

        let previous_reason = self.stop_reasons.replace(transaction_id, STOP_BY_SERVER);
        let result = self
            .facade
            .stop_session(
                &transaction.connector.charge_box_id,
                transaction.connector.connector_id,
                transaction_id,
            )
            .await;

        match result {
            Ok(_) => {
                metrics::counter!("wallet_guard_stops_total", "guard" => guard).increment(1);
                self.events.publish(Event::WalletGuardStop(WalletGuardStopEvent {
                    charge_point_id: transaction.connector.charge_box_id.clone(),
                    transaction_id,
                    id_tag: transaction.id_tag.clone(),
                    balance,
                    cost,
                    timestamp: Utc::now(),
                }));
                StopDispatch::Sent
            }
            Err(e) => {
                warn!(transaction_id, guard, error = %e, "Wallet stop not delivered, will retry next cycle");
                self.recent.remove(&transaction_id);
                match previous_reason {
                    Some(reason) => self.stop_reasons.put(transaction_id, reason),
                    None => {
                        self.stop_reasons.take(transaction_id);
                    }
                }
                StopDispatch::Failed
            }
        }
    }

    /// Forget a transaction once it has ended.
    pub fn forget(&self, transaction_id: i32) {
        self.recent.remove(&transaction_id);
    }
}
