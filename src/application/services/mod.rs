//! Application services
//!
//! ```text
//! telemetry ──► TelemetryIngress ──► StreamingWalletGuard ─┐
//!                     │                                     ├─► WalletStopDispatcher ─► SessionCommandFacade
//!                     ▼                                     │          │
//!              meter readings ──► PollingWalletGuard ───────┘    StopReasonStore
//!                                       │
//!                                SessionCostLedger
//! ```

mod ledger;
mod lifecycle;
mod polling_guard;
mod runner;
mod scheduled_charging;
mod session;
mod stop_reason;
mod streaming_guard;
mod telemetry;
mod wallet_stop;

#[cfg(test)]
pub(crate) mod testing;

pub use ledger::SessionCostLedger;
pub use lifecycle::SessionLifecycle;
pub use polling_guard::{
    poll_interval, PollingGuardConfig, PollingOutcome, PollingWalletGuard, DEFAULT_FLOOR_THRESHOLD,
};
pub use runner::{ScheduleRunner, WalletGuardRunner};
pub use scheduled_charging::{ScheduleAction, ScheduledChargingService};
pub use session::{SessionCommandFacade, StartOutcome, StartRejection};
pub use stop_reason::{StopReasonStore, SCHEDULER_STOP, STOP_BY_SERVER};
pub use streaming_guard::{
    LastEnergyCache, StreamingOutcome, StreamingWalletGuard, DEFAULT_FLAT_TAX_PERCENT,
};
pub use telemetry::{readings_from_ocpp, TelemetryIngress};
pub use wallet_stop::{StopDispatch, WalletStopDispatcher, DEFAULT_STOP_COOLDOWN};
