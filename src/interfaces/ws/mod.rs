//! WebSocket interfaces
//!
//! - `ocpp_server`: OCPP 1.6 endpoint charge points connect to

pub mod ocpp_server;

pub use ocpp_server::OcppServer;
