//! Notifications
//!
//! Broadcast event bus for guard decisions, transaction lifecycle, and
//! user-facing alerts.
//!
//! ```ignore
//! let bus = create_event_bus();
//! let mut sub = bus.subscribe();
//! bus.notify("TAG-001", "Cannot start charging. The device is offline").await;
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use events::*;
