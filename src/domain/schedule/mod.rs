//! Scheduled charging windows

pub mod model;

pub use model::ChargingSchedule;
