//! Transaction aggregate

pub mod model;
pub mod repository;

pub use model::ChargingTransaction;
pub use repository::TransactionRepository;
