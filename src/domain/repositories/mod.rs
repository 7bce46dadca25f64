//! Repository traits for the domain layer
//!
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::billing::LedgerRepository;
use super::metering::{MeterReadingRepository, TelemetryRepository};
use super::transaction::TransactionRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let open = repos.transactions().find_open_by_id_tag("TAG-001").await?;
///     let checkpoint = repos.ledger().checkpoint(open[0].id).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn transactions(&self) -> &dyn TransactionRepository;
    fn meter_readings(&self) -> &dyn MeterReadingRepository;
    fn telemetry(&self) -> &dyn TelemetryRepository;
    fn ledger(&self) -> &dyn LedgerRepository;
}
