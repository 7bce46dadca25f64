//! HTTP interface
//!
//! - `modules`: health, Prometheus metrics, billing, and session endpoints
//! - `router`: assembles them into one axum router

pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiState};
