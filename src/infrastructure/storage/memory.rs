//! In-memory repository provider for development and testing

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::billing::InvoiceRepository;
use crate::domain::customer::{CustomerRepository, SiteRepository};
use crate::domain::metering::MeterReadingRepository;
use crate::domain::tariff::{AssignmentRepository, TariffRepository};
use crate::domain::{
    Customer, DomainError, DomainResult, Invoice, InvoiceStatus, MeterReading, RepositoryProvider,
    Site, SitePricingContext, SiteTariffAssignment, TariffPlan,
};
use crate::shared::pagination::{Page, PageRequest};

/// All aggregates held in process memory.
///
/// Writes that must be atomic (bulk readings, assignment supersede,
/// invoice create and status change) take a write lock for the whole
/// check-then-write.
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    customers: InMemoryCustomers,
    sites: InMemorySites,
    readings: InMemoryReadings,
    tariffs: InMemoryTariffs,
    assignments: InMemoryAssignments,
    invoices: InMemoryInvoices,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
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

// ── Customers ───────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryCustomers {
    rows: DashMap<Uuid, Customer>,
}

#[async_trait]
impl CustomerRepository for InMemoryCustomers {
    async fn save(&self, customer: Customer) -> DomainResult<Customer> {
        self.rows.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Customer>> {
        Ok(self.rows.get(&id).map(|c| c.clone()))
    }

    async fn find_page(&self, request: PageRequest) -> DomainResult<Page<Customer>> {
        let mut all: Vec<Customer> = self.rows.iter().map(|c| c.value().clone()).collect();
        all.sort_by_key(|c| c.id);
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Ok(Page::new(items, request))
    }
}

// ── Sites ───────────────────────────────────────────────────────

#[derive(Default)]
struct InMemorySites {
    rows: DashMap<Uuid, Site>,
}

#[async_trait]
impl SiteRepository for InMemorySites {
    async fn save(&self, site: Site) -> DomainResult<Site> {
        self.rows.insert(site.id, site.clone());
        Ok(site)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Site>> {
        Ok(self.rows.get(&id).map(|s| s.clone()))
    }

    async fn find_active_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Site>> {
        let mut sites: Vec<Site> = self
            .rows
            .iter()
            .filter(|s| s.customer_id == customer_id && s.active)
            .map(|s| s.value().clone())
            .collect();
        sites.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(sites)
    }

    async fn find_pricing_context(&self, id: Uuid) -> DomainResult<Option<SitePricingContext>> {
        Ok(self.rows.get(&id).map(|s| s.pricing_context()))
    }

    async fn find_existing_ids(&self, ids: &[Uuid]) -> DomainResult<HashSet<Uuid>> {
        Ok(ids
            .iter()
            .filter(|id| self.rows.contains_key(*id))
            .copied()
            .collect())
    }
}

// ── Meter readings ──────────────────────────────────────────────

#[derive(Default)]
struct InMemoryReadings {
    rows: RwLock<HashMap<(Uuid, DateTime<Utc>), MeterReading>>,
}

#[async_trait]
impl MeterReadingRepository for InMemoryReadings {
    async fn find_by_site_and_range(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterReading>> {
        let rows = self.rows.read().await;
        let mut readings: Vec<MeterReading> = rows
            .values()
            .filter(|r| r.site_id == site_id && r.read_at >= start && r.read_at < end)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.read_at);
        Ok(readings)
    }

    async fn insert_bulk(&self, readings: Vec<MeterReading>) -> DomainResult<usize> {
        let mut rows = self.rows.write().await;
        let mut batch = HashSet::with_capacity(readings.len());
        for reading in &readings {
            let key = reading.key();
            if rows.contains_key(&key) || !batch.insert(key) {
                return Err(DomainError::Conflict(format!(
                    "Meter reading already exists for site {} at {}",
                    reading.site_id, reading.read_at
                )));
            }
        }

        let count = readings.len();
        rows.extend(readings.into_iter().map(|r| (r.key(), r)));
        Ok(count)
    }
}

// ── Tariff plans ────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryTariffs {
    plans: DashMap<Uuid, TariffPlan>,
}

#[async_trait]
impl TariffRepository for InMemoryTariffs {
    async fn save_plan(&self, mut plan: TariffPlan) -> DomainResult<TariffPlan> {
        if self.plans.contains_key(&plan.id) {
            return Err(DomainError::Conflict(format!("Tariff plan {} already exists", plan.id)));
        }
        plan.rates.sort_by_key(|r| r.position);
        self.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn find_plan(&self, id: Uuid) -> DomainResult<Option<TariffPlan>> {
        Ok(self.plans.get(&id).map(|p| p.clone()))
    }
}

// ── Assignments ─────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryAssignments {
    rows: RwLock<HashMap<Uuid, SiteTariffAssignment>>,
}

impl InMemoryAssignments {
    async fn sorted(&self, keep: impl Fn(&SiteTariffAssignment) -> bool) -> Vec<SiteTariffAssignment> {
        let rows = self.rows.read().await;
        let mut found: Vec<SiteTariffAssignment> = rows.values().filter(|a| keep(*a)).cloned().collect();
        found.sort_by_key(|a| a.effective_from);
        found
    }
}

fn duplicate_assignment(id: Uuid) -> DomainError {
    DomainError::Conflict(format!("Tariff assignment {} already exists", id))
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignments {
    async fn save(&self, assignment: SiteTariffAssignment) -> DomainResult<SiteTariffAssignment> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&assignment.id) {
            return Err(duplicate_assignment(assignment.id));
        }
        rows.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn supersede(
        &self,
        previous_id: Uuid,
        next: SiteTariffAssignment,
    ) -> DomainResult<SiteTariffAssignment> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&next.id) {
            return Err(duplicate_assignment(next.id));
        }
        let previous = rows.get_mut(&previous_id).ok_or_else(|| {
            DomainError::not_found("SiteTariffAssignment", "id", previous_id.to_string())
        })?;
        previous.effective_to = Some(next.effective_from);
        rows.insert(next.id, next.clone());
        Ok(next)
    }

    async fn find_overlapping(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<SiteTariffAssignment>> {
        Ok(self.sorted(|a| a.site_id == site_id && a.overlaps(start, Some(end))).await)
    }

    async fn find_by_site(&self, site_id: Uuid) -> DomainResult<Vec<SiteTariffAssignment>> {
        Ok(self.sorted(|a| a.site_id == site_id).await)
    }
}

// ── Invoices ────────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryInvoices {
    rows: RwLock<HashMap<Uuid, Invoice>>,
}

fn overlaps_active(invoice: &Invoice, customer_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    invoice.customer_id == customer_id
        && invoice.status.is_active()
        && invoice.billing_period_start < end
        && invoice.billing_period_end > start
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoices {
    async fn exists_active_overlapping(
        &self,
        customer_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let rows = self.rows.read().await;
        Ok(rows.values().any(|i| overlaps_active(i, customer_id, start, end)))
    }

    async fn create(&self, invoice: Invoice) -> DomainResult<Invoice> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|i| {
            overlaps_active(i, invoice.customer_id, invoice.billing_period_start, invoice.billing_period_end)
        }) {
            return Err(DomainError::Conflict(format!(
                "Active invoice already exists for customer {} overlapping {}",
                invoice.customer_id,
                invoice.period()
            )));
        }
        rows.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Invoice>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Invoice>> {
        let rows = self.rows.read().await;
        let mut invoices: Vec<Invoice> = rows
            .values()
            .filter(|i| i.customer_id == customer_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.billing_period_start, i.created_at));
        Ok(invoices)
    }

    async fn update_status(&self, id: Uuid, from: InvoiceStatus, to: InvoiceStatus) -> DomainResult<()> {
        let mut rows = self.rows.write().await;
        let invoice = rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Invoice", "id", id.to_string()))?;
        if invoice.status != from {
            return Err(DomainError::Conflict(format!("Invoice {} is no longer {}", id, from)));
        }
        invoice.status = to;
        invoice.updated_at = Utc::now();
        Ok(())
    }
}
