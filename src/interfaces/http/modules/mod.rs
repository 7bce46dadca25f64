//! JSON and Prometheus endpoints

pub mod billing;
pub mod common;
pub mod health;
pub mod metrics;
pub mod sessions;
