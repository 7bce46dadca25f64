//! Tariff aggregate
//!
//! Time-of-day rate windows and the resolver that maps a local time to the
//! window that prices it.

pub mod model;

pub use model::{resolve, TariffClock, TariffWindow};
