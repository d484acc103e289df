//! Invoice assembly and lifecycle

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::pricing::PricingService;
use crate::domain::{
    BillingPeriod, DomainError, DomainResult, Invoice, InvoiceStatus, RepositoryProvider,
};

/// Builds one invoice per customer per period from the priced lines of
/// every active site, and moves invoices through their statuses.
pub struct InvoiceService {
    repos: Arc<dyn RepositoryProvider>,
    pricing: Arc<PricingService>,
    payment_terms: Duration,
}

impl InvoiceService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        pricing: Arc<PricingService>,
        payment_terms_days: u32,
    ) -> Self {
        Self {
            repos,
            pricing,
            payment_terms: Duration::days(i64::from(payment_terms_days)),
        }
    }

    /// Assemble and persist a DRAFT invoice.
    ///
    /// Fails with `Conflict` when a non-void invoice of the customer already
    /// overlaps the period, and with `NotFound` for an unknown customer or a
    /// customer without active sites.
    pub async fn generate_invoice_for_customer(
        &self,
        customer_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DomainResult<Invoice> {
        let period = BillingPeriod::new(period_start, period_end)?;

        if self
            .repos
            .invoices()
            .exists_active_overlapping(customer_id, period.start, period.end)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "Active invoice already exists for customer {} overlapping {}",
                customer_id, period
            )));
        }

        let customer = self
            .repos
            .customers()
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer", "id", customer_id.to_string()))?;

        let sites = self.repos.sites().find_active_by_customer(customer_id).await?;
        if sites.is_empty() {
            return Err(DomainError::not_found(
                "ActiveSite",
                "customer_id",
                customer_id.to_string(),
            ));
        }

        let mut invoice = Invoice::draft(
            customer.id,
            period,
            period.end + self.payment_terms,
            customer.country.currency(),
        );

        for site in &sites {
            invoice.push_header(site.header_label());
            let result = self
                .pricing
                .calculate_for_site(site.pricing_context(), period)
                .await?;
            debug!(
                customer_id = %customer.id,
                site_id = %site.id,
                total = %result.total_amount,
                lines = result.line_items.len(),
                "Site priced"
            );
            for item in result.line_items {
                invoice.push_line(item.description, item.quantity, item.rate, item.amount);
            }
        }

        let invoice = self.repos.invoices().create(invoice).await?;
        info!(
            customer_id = %invoice.customer_id,
            invoice_id = %invoice.id,
            total = %invoice.total_amount,
            currency = %invoice.currency,
            "Invoice generated"
        );
        Ok(invoice)
    }

    /// Move an invoice to `status`. Only DRAFT → ISSUED | VOID and
    /// ISSUED → PAID | VOID are allowed; losing a race against another
    /// transition is a `Conflict`.
    pub async fn update_status(&self, invoice_id: Uuid, status: InvoiceStatus) -> DomainResult<Invoice> {
        let mut invoice = self.require(invoice_id).await?;

        if !invoice.status.can_transition_to(status) {
            return Err(DomainError::Validation(format!(
                "Invoice {} cannot move from {} to {}",
                invoice_id, invoice.status, status
            )));
        }

        self.repos
            .invoices()
            .update_status(invoice_id, invoice.status, status)
            .await?;
        info!(invoice_id = %invoice_id, from = %invoice.status, to = %status, "Invoice status updated");

        invoice.status = status;
        invoice.updated_at = Utc::now();
        Ok(invoice)
    }

    pub async fn void_invoice(&self, invoice_id: Uuid) -> DomainResult<Invoice> {
        self.update_status(invoice_id, InvoiceStatus::Void).await
    }

    pub async fn find_invoice(&self, invoice_id: Uuid) -> DomainResult<Option<Invoice>> {
        self.repos.invoices().find_by_id(invoice_id).await
    }

    pub async fn list_invoices_for_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Invoice>> {
        self.repos.invoices().find_by_customer(customer_id).await
    }

    async fn require(&self, invoice_id: Uuid) -> DomainResult<Invoice> {
        self.repos
            .invoices()
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Invoice", "id", invoice_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::InvoiceRepository;
    use crate::domain::{Country, Currency, Site};
    use crate::test_support::{at, dec, flat_plan, Fixture};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn flat_invoice_has_header_and_usage_line() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let plan = fx.save_plan(flat_plan("SG-FLAT", "Flat", "0.25")).await;
        fx.assign(site.id, plan.id, at(1, 1, 0), None).await;
        fx.reading(site.id, at(1, 15, 0), "100.00").await;

        let invoice = fx
            .invoices()
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        assert_eq!(invoice.total_amount, dec("25.00"));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.currency, Currency::SGD);
        assert_eq!(invoice.due_date, at(2, 1, 0) + Duration::days(14));
        assert_eq!(invoice.lines.len(), 2);

        let header = &invoice.lines[0];
        assert_eq!(header.description, "Site: NMI-SG-1 (Central)");
        assert_eq!(header.amount, Decimal::ZERO);
        assert_eq!(header.quantity, Decimal::ZERO);

        let usage = &invoice.lines[1];
        assert_eq!(usage.index, 1);
        assert_eq!(usage.quantity, dec("100.00"));
        assert_eq!(usage.unit_price, Some(dec("0.25")));
        assert_eq!(usage.amount, dec("25.00"));

        let stored = fx.invoices().find_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.lines, invoice.lines);
    }

    #[tokio::test]
    async fn second_generation_conflicts_until_voided() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let plan = fx.save_plan(flat_plan("SG-FLAT", "Flat", "0.25")).await;
        fx.assign(site.id, plan.id, at(1, 1, 0), None).await;
        let service = fx.invoices();

        let first = service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        let err = service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        service.void_invoice(first.id).await.unwrap();
        let third = service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        assert_ne!(third.id, first.id);

        let all = service.list_invoices_for_customer(site.customer_id).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn partially_overlapping_period_also_conflicts() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let service = fx.invoices();
        service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        let err = service
            .generate_invoice_for_customer(site.customer_id, at(1, 20, 0), at(2, 20, 0))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Adjacent period does not overlap
        service
            .generate_invoice_for_customer(site.customer_id, at(2, 1, 0), at(3, 1, 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn customer_without_active_sites_is_not_found() {
        let fx = Fixture::new();
        let customer = fx.customer(Country::AU).await;
        fx.save_site(Site::new(customer.id, "NMI-OFF", Country::AU, "NSW").inactive())
            .await;

        let err = fx
            .invoices()
            .generate_invoice_for_customer(customer.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "ActiveSite", .. }));
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .invoices()
            .generate_invoice_for_customer(Uuid::new_v4(), at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Customer", .. }));
    }

    #[tokio::test]
    async fn sites_are_billed_in_identifier_order_with_zero_charge_headers() {
        let fx = Fixture::new();
        let customer = fx.customer(Country::AU).await;
        let b = fx.save_site(Site::new(customer.id, "NMI-B", Country::AU, "VIC")).await;
        fx.save_site(Site::new(customer.id, "NMI-A", Country::AU, "NSW")).await;
        let plan = fx.save_plan(flat_plan("AU-FLAT", "Flat", "0.30")).await;
        fx.assign(b.id, plan.id, at(1, 1, 0), None).await;
        fx.reading(b.id, at(1, 10, 0), "10").await;

        let invoice = fx
            .invoices()
            .generate_invoice_for_customer(customer.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        let descriptions: Vec<&str> = invoice.lines.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["Site: NMI-A (NSW)", "Site: NMI-B (VIC)", "Usage Charge"]
        );
        assert_eq!(invoice.currency, Currency::AUD);
        assert_eq!(invoice.total_amount, dec("3.00"));
    }

    #[tokio::test]
    async fn status_transitions_are_enforced() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let service = fx.invoices();
        let invoice = service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        let err = service
            .update_status(invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        service.update_status(invoice.id, InvoiceStatus::Issued).await.unwrap();
        let paid = service.update_status(invoice.id, InvoiceStatus::Paid).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(service.void_invoice(invoice.id).await.is_err());

        let stored = service.find_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.total_amount, invoice.total_amount);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_terminal_transitions_admit_one_winner() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let service = Arc::new(fx.invoices());
        let invoice = service
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        service.update_status(invoice.id, InvoiceStatus::Issued).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for target in [InvoiceStatus::Paid, InvoiceStatus::Void] {
            let service = Arc::clone(&service);
            tasks.spawn(async move { (target, service.update_status(invoice.id, target).await) });
        }

        let mut winners = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (target, result) = joined.unwrap();
            match result {
                Ok(_) => winners.push(target),
                // Lost the write race, or read the winner's terminal state first
                Err(DomainError::Conflict(_)) | Err(DomainError::Validation(_)) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = service.find_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, winners[0]);
    }

    #[tokio::test]
    async fn stale_status_write_is_a_conflict() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let invoice = fx
            .invoices()
            .generate_invoice_for_customer(site.customer_id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        fx.invoices().update_status(invoice.id, InvoiceStatus::Issued).await.unwrap();

        // A writer that still believes the invoice is a draft
        let err = fx
            .repos
            .invoices()
            .update_status(invoice.id, InvoiceStatus::Draft, InvoiceStatus::Void)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = fx.invoices().find_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Issued);
    }

    #[tokio::test]
    async fn voiding_unknown_invoice_is_not_found() {
        let fx = Fixture::new();
        let err = fx.invoices().void_invoice(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Invoice", .. }));
    }
}
