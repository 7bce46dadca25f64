//! Inbound interfaces: the OCPP WebSocket endpoint and the HTTP API

pub mod http;
pub mod ws;

pub use http::{create_api_router, ApiState};
pub use ws::OcppServer;
