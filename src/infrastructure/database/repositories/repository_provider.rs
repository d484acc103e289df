//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::billing::InvoiceRepository;
use crate::domain::customer::{CustomerRepository, SiteRepository};
use crate::domain::metering::MeterReadingRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::tariff::{AssignmentRepository, TariffRepository};

use super::customer_repository::{SeaOrmCustomerRepository, SeaOrmSiteRepository};
use super::invoice_repository::SeaOrmInvoiceRepository;
use super::meter_reading_repository::SeaOrmMeterReadingRepository;
use super::tariff_repository::{SeaOrmAssignmentRepository, SeaOrmTariffRepository};

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let sites = repos.sites().find_active_by_customer(customer_id).await?;
/// let page = repos.customers().find_page(PageRequest::first(100)).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    customers: SeaOrmCustomerRepository,
    sites: SeaOrmSiteRepository,
    readings: SeaOrmMeterReadingRepository,
    tariffs: SeaOrmTariffRepository,
    assignments: SeaOrmAssignmentRepository,
    invoices: SeaOrmInvoiceRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            customers: SeaOrmCustomerRepository::new(db.clone()),
            sites: SeaOrmSiteRepository::new(db.clone()),
            readings: SeaOrmMeterReadingRepository::new(db.clone()),
            tariffs: SeaOrmTariffRepository::new(db.clone()),
            assignments: SeaOrmAssignmentRepository::new(db.clone()),
            invoices: SeaOrmInvoiceRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn customers(&self) -> &dyn CustomerRepository {
        &self.customers
    }

    fn sites(&self) -> &dyn SiteRepository {
        &self.sites
    }

    fn readings(&self) -> &dyn MeterReadingRepository {
        &self.readings
    }

    fn tariffs(&self) -> &dyn TariffRepository {
        &self.tariffs
    }

    fn assignments(&self) -> &dyn AssignmentRepository {
        &self.assignments
    }

    fn invoices(&self) -> &dyn InvoiceRepository {
        &self.invoices
    }
}
