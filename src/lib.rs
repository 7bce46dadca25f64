//! # Texnouz Billing Engine
//!
//! Metering and wallet-guard billing for OCPP 1.6 EV charging sessions.
//!
//! ## Architecture
//!
//! - **domain**: transactions, meter readings, tariffs, ledger types, and
//!   repository traits
//! - **application**: wallet guards, cost ledger, session lifecycle,
//!   scheduled charging, OCPP handlers, and the ports they depend on
//! - **infrastructure**: SeaORM and in-memory repositories, static providers
//! - **interfaces**: OCPP WebSocket endpoint and the REST API
//! - **notifications**: broadcast event bus
//! - **server**: runtime bootstrap shared by the CLI

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod notifications;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig, ConfigError};

pub use infrastructure::{init_database, DatabaseConfig, InMemoryStorage, SeaOrmRepositoryProvider};

pub use interfaces::create_api_router;

pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
