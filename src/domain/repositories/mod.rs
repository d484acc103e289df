//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider` — unified access to all per-aggregate repositories
//! - `DomainResult` — standard result type for domain operations

use super::billing::InvoiceRepository;
use super::customer::{CustomerRepository, SiteRepository};
use super::metering::MeterReadingRepository;
use super::tariff::{AssignmentRepository, TariffRepository};
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let sites = repos.sites().find_active_by_customer(customer_id).await?;
///     let readings = repos.readings().find_by_site_and_range(site_id, start, end).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn customers(&self) -> &dyn CustomerRepository;
    fn sites(&self) -> &dyn SiteRepository;
    fn readings(&self) -> &dyn MeterReadingRepository;
    fn tariffs(&self) -> &dyn TariffRepository;
    fn assignments(&self) -> &dyn AssignmentRepository;
    fn invoices(&self) -> &dyn InvoiceRepository;
}
