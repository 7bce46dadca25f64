//! Application layer: ports, services, charge point sessions, commands, and
//! the OCPP 1.6 inbound handlers.

pub mod commands;
pub mod handlers;
pub mod ports;
pub mod services;
pub mod session;

pub use commands::{
    create_command_sender, CommandError, CommandSender, OcppCommandGateway, SharedCommandSender,
};
pub use handlers::{OcppHandlerV16, OcppServices};
pub use session::{SessionRegistry, SharedSessionRegistry};
