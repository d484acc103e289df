//! Monthly batch billing run
//!
//! Pages through all customers in a stable order. Each page fans out one
//! invoice task per customer through the shared [`WorkerPool`] and is fully
//! joined before the next page is fetched. A customer's failure is logged
//! and counted; only a page fetch that keeps failing aborts the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::worker_pool::WorkerPool;
use crate::application::services::InvoiceService;
use crate::domain::{BillingPeriod, DomainError, DomainResult, RepositoryProvider};
use crate::shared::pagination::PageRequest;
use crate::shared::utills::{retry_with_backoff, RetryConfig};

#[derive(Debug, Clone)]
pub struct BillingJobConfig {
    pub page_size: u64,
    /// Zone whose calendar months define the billing period
    pub reference_timezone: Tz,
    pub page_fetch_retry: RetryConfig,
}

impl Default for BillingJobConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            reference_timezone: chrono_tz::Asia::Singapore,
            page_fetch_retry: RetryConfig::default(),
        }
    }
}

/// Result of one customer's task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerOutcome {
    Billed { invoice_id: Uuid },
    /// An active invoice already covers the period
    Skipped,
    Failed { reason: String },
}

/// Counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub billed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pages: usize,
}

impl JobSummary {
    fn record(&mut self, outcome: &CustomerOutcome) {
        match outcome {
            CustomerOutcome::Billed { .. } => self.billed += 1,
            CustomerOutcome::Skipped => self.skipped += 1,
            CustomerOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct BillingJob {
    repos: Arc<dyn RepositoryProvider>,
    invoices: Arc<InvoiceService>,
    pool: WorkerPool,
    config: BillingJobConfig,
}

impl BillingJob {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        invoices: Arc<InvoiceService>,
        pool: WorkerPool,
        config: BillingJobConfig,
    ) -> Self {
        Self {
            repos,
            invoices,
            pool,
            config,
        }
    }

    pub fn reference_timezone(&self) -> Tz {
        self.config.reference_timezone
    }

    /// The previous calendar month relative to `now` in the reference zone
    pub fn period_for(&self, now: DateTime<Utc>) -> DomainResult<BillingPeriod> {
        BillingPeriod::previous_month(now, self.config.reference_timezone)
    }

    /// Scheduler entry point: bill last month and log the outcome
    pub async fn run_monthly_billing(&self) {
        let period = match self.period_for(Utc::now()) {
            Ok(period) => period,
            Err(e) => {
                error!(error = %e, "Cannot compute billing period");
                metrics::counter!("billing_job_runs_total", "outcome" => "aborted").increment(1);
                return;
            }
        };

        if let Err(e) = self.run_for_period(period).await {
            error!(%period, error = %e, "Monthly billing run aborted");
        }
    }

    /// Bill every customer for `period`
    pub async fn run_for_period(&self, period: BillingPeriod) -> DomainResult<JobSummary> {
        let started = Instant::now();
        info!(
            %period,
            page_size = self.config.page_size,
            workers = self.pool.size(),
            "Billing run started"
        );

        let result = self.run_pages(period).await;

        metrics::histogram!("billing_job_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(summary) => {
                metrics::counter!("billing_job_runs_total", "outcome" => "completed").increment(1);
                info!(
                    %period,
                    billed = summary.billed,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    pages = summary.pages,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Billing run completed"
                );
            }
            Err(e) => {
                metrics::counter!("billing_job_runs_total", "outcome" => "aborted").increment(1);
                error!(%period, error = %e, "Billing run failed fetching customers");
            }
        }
        result
    }

    async fn run_pages(&self, period: BillingPeriod) -> DomainResult<JobSummary> {
        let mut summary = JobSummary::default();
        let mut request = PageRequest::first(self.config.page_size);
        let customers = self.repos.customers();

        loop {
            let page = retry_with_backoff(
                self.config.page_fetch_retry.clone(),
                move || customers.find_page(request),
                DomainError::is_transient,
                "fetch_customer_page",
            )
            .await?;

            if page.is_empty() {
                break;
            }
            info!(page = request.page, customers = page.len(), "Processing customer page");

            let ids: Vec<Uuid> = page.items.iter().map(|c| c.id).collect();
            for (_, outcome) in self.bill_page(ids, period).await {
                summary.record(&outcome);
            }
            summary.pages += 1;

            if !page.has_next() {
                break;
            }
            request = request.next();
        }

        Ok(summary)
    }

    /// Run one task per customer and wait for all of them
    async fn bill_page(
        &self,
        customer_ids: Vec<Uuid>,
        period: BillingPeriod,
    ) -> Vec<(Uuid, CustomerOutcome)> {
        let mut tasks = JoinSet::new();
        let mut owners: HashMap<task::Id, Uuid> = HashMap::with_capacity(customer_ids.len());
        for customer_id in customer_ids {
            let pool = self.pool.clone();
            let invoices = Arc::clone(&self.invoices);
            let handle = tasks.spawn(async move {
                match pool.acquire().await {
                    Ok(_permit) => bill_customer(&invoices, customer_id, period).await,
                    Err(e) => CustomerOutcome::Failed { reason: e.to_string() },
                }
            });
            owners.insert(handle.id(), customer_id);
        }

        let mut outcomes = Vec::with_capacity(owners.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    if let Some(customer_id) = owners.remove(&id) {
                        outcomes.push((customer_id, outcome));
                    }
                }
                Err(e) => {
                    metrics::counter!("billing_customers_failed_total").increment(1);
                    match owners.remove(&e.id()) {
                        Some(customer_id) => {
                            error!(customer_id = %customer_id, error = %e, "Billing task panicked");
                            outcomes.push((customer_id, CustomerOutcome::Failed { reason: e.to_string() }));
                        }
                        None => error!(error = %e, "Billing task panicked"),
                    }
                }
            }
        }
        outcomes
    }
}

async fn bill_customer(
    invoices: &InvoiceService,
    customer_id: Uuid,
    period: BillingPeriod,
) -> CustomerOutcome {
    match invoices
        .generate_invoice_for_customer(customer_id, period.start, period.end)
        .await
    {
        Ok(invoice) => {
            metrics::counter!("billing_invoices_generated_total").increment(1);
            CustomerOutcome::Billed { invoice_id: invoice.id }
        }
        Err(e) if e.is_conflict() => {
            metrics::counter!("billing_customers_skipped_total").increment(1);
            info!(customer_id = %customer_id, "Already invoiced for period, skipping");
            CustomerOutcome::Skipped
        }
        Err(e) => {
            metrics::counter!("billing_customers_failed_total").increment(1);
            if e.is_transient() {
                warn!(customer_id = %customer_id, error = %e, "Billing failed on storage error");
            } else {
                error!(customer_id = %customer_id, error = %e, "Billing failed");
            }
            CustomerOutcome::Failed { reason: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::CustomerRepository;
    use crate::domain::{Country, Customer, Site};
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::pagination::Page;
    use crate::test_support::{at, flat_plan, Fixture};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use crate::domain::billing::InvoiceRepository;
    use crate::domain::{Invoice, InvoiceStatus};
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn january() -> BillingPeriod {
        BillingPeriod::new(at(1, 1, 0), at(2, 1, 0)).unwrap()
    }

    #[tokio::test]
    async fn failing_customer_does_not_block_the_page() {
        let fx = Fixture::new();
        let plan = fx.save_plan(flat_plan("SG-FLAT", "Flat", "0.25")).await;
        let y = fx.site_sg().await;
        let z = fx.site_sg().await;
        fx.assign(y.id, plan.id, at(1, 1, 0), None).await;
        fx.assign(z.id, plan.id, at(1, 1, 0), None).await;
        let x = fx.customer(Country::SG).await; // no sites

        let summary = fx.job(10, 2).run_for_period(january()).await.unwrap();
        assert_eq!(summary, JobSummary { billed: 2, skipped: 0, failed: 1, pages: 1 });

        let invoices = fx.invoices();
        assert_eq!(invoices.list_invoices_for_customer(y.customer_id).await.unwrap().len(), 1);
        assert_eq!(invoices.list_invoices_for_customer(z.customer_id).await.unwrap().len(), 1);
        assert!(invoices.list_invoices_for_customer(x.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerun_skips_already_billed_customers() {
        let fx = Fixture::new();
        for _ in 0..3 {
            fx.site_sg().await;
        }
        let job = fx.job(2, 2);

        let first = job.run_for_period(january()).await.unwrap();
        assert_eq!(first.billed, 3);
        assert_eq!(first.pages, 2);

        let second = job.run_for_period(january()).await.unwrap();
        assert_eq!(second, JobSummary { billed: 0, skipped: 3, failed: 0, pages: 2 });
    }

    #[tokio::test]
    async fn exact_page_multiple_ends_on_empty_page() {
        let fx = Fixture::new();
        for _ in 0..4 {
            fx.site_sg().await;
        }
        let summary = fx.job(2, 1).run_for_period(january()).await.unwrap();
        assert_eq!(summary.billed, 4);
        assert_eq!(summary.pages, 2);
    }

    #[tokio::test]
    async fn empty_population_is_a_clean_run() {
        let fx = Fixture::new();
        let summary = fx.job(5, 2).run_for_period(january()).await.unwrap();
        assert_eq!(summary, JobSummary::default());
    }

    #[test]
    fn period_is_previous_month_in_reference_zone() {
        let fx = Fixture::new();
        let job = fx.job(5, 1);
        // 2026-02-01 01:00 SGT
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 17, 0, 0).unwrap();
        let period = job.period_for(now).unwrap();
        assert_eq!(period.start, Utc.with_ymd_and_hms(2025, 12, 31, 16, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2026, 1, 31, 16, 0, 0).unwrap());
    }

    /// Customer store that always fails, counting attempts
    struct UnavailableCustomers {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl CustomerRepository for UnavailableCustomers {
        async fn save(&self, customer: Customer) -> DomainResult<Customer> {
            Ok(customer)
        }

        async fn find_by_id(&self, _id: Uuid) -> DomainResult<Option<Customer>> {
            Ok(None)
        }

        async fn find_page(&self, _request: PageRequest) -> DomainResult<Page<Customer>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::Storage("connection refused".into()))
        }
    }

    struct BrokenProvider {
        inner: InMemoryRepositoryProvider,
        customers: UnavailableCustomers,
    }

    impl RepositoryProvider for BrokenProvider {
        fn customers(&self) -> &dyn CustomerRepository {
            &self.customers
        }
        fn sites(&self) -> &dyn crate::domain::customer::SiteRepository {
            self.inner.sites()
        }
        fn readings(&self) -> &dyn crate::domain::metering::MeterReadingRepository {
            self.inner.readings()
        }
        fn tariffs(&self) -> &dyn crate::domain::tariff::TariffRepository {
            self.inner.tariffs()
        }
        fn assignments(&self) -> &dyn crate::domain::tariff::AssignmentRepository {
            self.inner.assignments()
        }
        fn invoices(&self) -> &dyn crate::domain::billing::InvoiceRepository {
            self.inner.invoices()
        }
    }

    #[tokio::test]
    async fn page_fetch_failure_aborts_after_retries() {
        let provider = Arc::new(BrokenProvider {
            inner: InMemoryRepositoryProvider::new(),
            customers: UnavailableCustomers { attempts: AtomicU32::new(0) },
        });
        let fx = Fixture::with_repos(provider.clone());
        let config = BillingJobConfig {
            page_size: 10,
            reference_timezone: chrono_tz::Etc::UTC,
            page_fetch_retry: RetryConfig::default()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(1)),
        };
        let job = BillingJob::new(fx.repos.clone(), Arc::new(fx.invoices()), WorkerPool::new(1), config);

        let err = job.run_for_period(january()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(provider.customers.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn customer_without_tariff_gets_zero_invoice() {
        let fx = Fixture::new();
        let customer = fx.customer(Country::AU).await;
        fx.save_site(Site::new(customer.id, "NMI-1", Country::AU, "NSW")).await;

        let summary = fx.job(10, 1).run_for_period(january()).await.unwrap();
        assert_eq!(summary.billed, 1);
        let invoices = fx.invoices().list_invoices_for_customer(customer.id).await.unwrap();
        assert_eq!(invoices[0].total_amount, rust_decimal::Decimal::ZERO);
        assert_eq!(invoices[0].lines.len(), 1);
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Start,
        End,
    }

    /// Invoice store that records when each customer's task is inside it
    struct TracedInvoices {
        inner: Arc<InMemoryRepositoryProvider>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        events: Mutex<Vec<(Uuid, Phase)>>,
        panic_for: Option<Uuid>,
    }

    impl TracedInvoices {
        fn new(inner: Arc<InMemoryRepositoryProvider>, panic_for: Option<Uuid>) -> Self {
            Self {
                inner,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
                panic_for,
            }
        }

        fn push(&self, customer_id: Uuid, phase: Phase) {
            self.events.lock().unwrap().push((customer_id, phase));
        }
    }

    #[async_trait]
    impl InvoiceRepository for TracedInvoices {
        async fn exists_active_overlapping(
            &self,
            customer_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> DomainResult<bool> {
            if self.panic_for == Some(customer_id) {
                panic!("invoice store crashed");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.push(customer_id, Phase::Start);
            self.inner.invoices().exists_active_overlapping(customer_id, start, end).await
        }

        async fn create(&self, invoice: Invoice) -> DomainResult<Invoice> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let customer_id = invoice.customer_id;
            let created = self.inner.invoices().create(invoice).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.push(customer_id, Phase::End);
            created
        }

        async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Invoice>> {
            self.inner.invoices().find_by_id(id).await
        }

        async fn find_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Invoice>> {
            self.inner.invoices().find_by_customer(customer_id).await
        }

        async fn update_status(&self, id: Uuid, from: InvoiceStatus, to: InvoiceStatus) -> DomainResult<()> {
            self.inner.invoices().update_status(id, from, to).await
        }
    }

    struct TracedProvider {
        inner: Arc<InMemoryRepositoryProvider>,
        invoices: TracedInvoices,
    }

    impl TracedProvider {
        fn new(panic_for: Option<Uuid>, inner: Arc<InMemoryRepositoryProvider>) -> Self {
            Self {
                invoices: TracedInvoices::new(inner.clone(), panic_for),
                inner,
            }
        }
    }

    impl RepositoryProvider for TracedProvider {
        fn customers(&self) -> &dyn CustomerRepository {
            self.inner.customers()
        }
        fn sites(&self) -> &dyn crate::domain::customer::SiteRepository {
            self.inner.sites()
        }
        fn readings(&self) -> &dyn crate::domain::metering::MeterReadingRepository {
            self.inner.readings()
        }
        fn tariffs(&self) -> &dyn crate::domain::tariff::TariffRepository {
            self.inner.tariffs()
        }
        fn assignments(&self) -> &dyn crate::domain::tariff::AssignmentRepository {
            self.inner.assignments()
        }
        fn invoices(&self) -> &dyn InvoiceRepository {
            &self.invoices
        }
    }

    #[tokio::test]
    async fn pages_run_one_after_another_within_the_pool() {
        let store = Arc::new(InMemoryRepositoryProvider::new());
        let seed = Fixture::with_repos(store.clone());
        for _ in 0..12 {
            seed.site_sg().await;
        }
        let first_page: Vec<Uuid> = store
            .customers()
            .find_page(PageRequest::first(6))
            .await
            .unwrap()
            .items
            .iter()
            .map(|c| c.id)
            .collect();

        let provider = Arc::new(TracedProvider::new(None, store));
        let fx = Fixture::with_repos(provider.clone());
        let summary = fx.job(6, 2).run_for_period(january()).await.unwrap();
        assert_eq!(summary, JobSummary { billed: 12, skipped: 0, failed: 0, pages: 2 });

        let traced = &provider.invoices;
        assert_eq!(traced.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(traced.in_flight.load(Ordering::SeqCst), 0);

        let events = traced.events.lock().unwrap().clone();
        assert_eq!(events.len(), 24);
        let last_first_page_end = events
            .iter()
            .rposition(|(id, phase)| *phase == Phase::End && first_page.contains(id))
            .unwrap();
        let first_second_page_start = events
            .iter()
            .position(|(id, phase)| *phase == Phase::Start && !first_page.contains(id))
            .unwrap();
        assert!(last_first_page_end < first_second_page_start);
    }

    #[tokio::test]
    async fn panicking_task_is_reported_against_its_customer() {
        let store = Arc::new(InMemoryRepositoryProvider::new());
        let seed = Fixture::with_repos(store.clone());
        let mut sites = Vec::new();
        for _ in 0..3 {
            sites.push(seed.site_sg().await);
        }
        let crashing = sites[1].customer_id;

        let provider = Arc::new(TracedProvider::new(Some(crashing), store));
        let fx = Fixture::with_repos(provider);
        let job = fx.job(10, 2);

        let ids: Vec<Uuid> = sites.iter().map(|s| s.customer_id).collect();
        let outcomes = job.bill_page(ids, january()).await;
        assert_eq!(outcomes.len(), 3);
        for (customer_id, outcome) in &outcomes {
            if *customer_id == crashing {
                assert!(matches!(outcome, CustomerOutcome::Failed { .. }));
            } else {
                assert!(matches!(outcome, CustomerOutcome::Billed { .. }));
            }
        }

        let summary = job.run_for_period(january()).await.unwrap();
        assert_eq!(summary, JobSummary { billed: 0, skipped: 2, failed: 1, pages: 1 });
    }
}
