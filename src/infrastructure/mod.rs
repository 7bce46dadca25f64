//! Infrastructure layer - external concerns

pub mod database;
pub mod providers;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use providers::{StaticScheduleProvider, StaticTariffProvider, StaticWalletProvider};
pub use storage::InMemoryStorage;
