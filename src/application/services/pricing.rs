//! Draft calculation for one site over one period

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::application::pricing::{StrategyRegistry, TariffResolver};
use crate::domain::{
    BillingPeriod, CalculationResult, DomainError, DomainResult, RepositoryProvider,
    SitePricingContext,
};

/// Read-only pricing of a site: resolver + strategy registry over the readings
pub struct PricingService {
    repos: Arc<dyn RepositoryProvider>,
    registry: Arc<StrategyRegistry>,
    resolver: TariffResolver,
}

impl PricingService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, registry: Arc<StrategyRegistry>) -> Self {
        let resolver = TariffResolver::new(Arc::clone(&repos));
        Self {
            repos,
            registry,
            resolver,
        }
    }

    /// Price `site_id` over `[period_start, period_end)` without persisting anything
    pub async fn calculate_draft_invoice(
        &self,
        site_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DomainResult<CalculationResult> {
        let period = BillingPeriod::new(period_start, period_end)?;
        let context = self
            .repos
            .sites()
            .find_pricing_context(site_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Site", "id", site_id.to_string()))?;

        self.calculate_for_site(context, period).await
    }

    /// Line items follow assignment order, then rate position within a plan.
    /// Windows without readings contribute nothing.
    pub(crate) async fn calculate_for_site(
        &self,
        site: SitePricingContext,
        period: BillingPeriod,
    ) -> DomainResult<CalculationResult> {
        let windows = self.resolver.resolve(site.id, period.start, period.end).await?;
        if windows.is_empty() {
            debug!(site_id = %site.id, %period, "No tariff assigned in period");
            return Ok(CalculationResult::empty());
        }

        let readings = self
            .repos
            .readings()
            .find_by_site_and_range(site.id, period.start, period.end)
            .await?;

        // Fetched as [start, end); each window then takes (start, end]
        let prorated = windows.len() > 1;
        let mut line_items = Vec::new();

        for resolved in &windows {
            let slice = resolved.window.select(&readings);
            if slice.is_empty() {
                continue;
            }

            let mut rates: Vec<_> = resolved.plan.rates.iter().collect();
            rates.sort_by_key(|rate| rate.position);

            for rate in rates {
                let description = if prorated {
                    format!(
                        "{} - {} ({})",
                        resolved.plan.name,
                        rate.description,
                        resolved.window.label(site.timezone)
                    )
                } else {
                    rate.description.clone()
                };
                let item = self
                    .registry
                    .calculate(rate, slice, &description, site.timezone)?;
                line_items.push(item);
            }
        }

        Ok(CalculationResult::from_line_items(line_items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, dec, flat_plan, Fixture};
    use chrono::TimeZone;

    #[tokio::test]
    async fn flat_month_end_to_end() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let plan = fx.save_plan(flat_plan("SG-FLAT", "Flat", "0.25")).await;
        fx.assign(site.id, plan.id, at(1, 1, 0), None).await;
        fx.reading(site.id, at(1, 15, 0), "100.00").await;

        let result = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        assert_eq!(result.total_amount, dec("25.00"));
        assert_eq!(result.line_items.len(), 1);
        let item = &result.line_items[0];
        assert_eq!(item.description, "Usage Charge");
        assert_eq!(item.quantity, dec("100.00"));
        assert_eq!(item.rate, Some(dec("0.25")));
        assert_eq!(item.amount, dec("25.00"));
    }

    #[tokio::test]
    async fn mid_period_plan_change_is_prorated() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let a = fx.save_plan(flat_plan("SG-A", "Plan A", "0.20")).await;
        let b = fx.save_plan(flat_plan("SG-B", "Plan B", "0.30")).await;
        fx.assign(site.id, a.id, at(1, 1, 0), Some(at(1, 15, 0))).await;
        fx.assign(site.id, b.id, at(1, 15, 0), None).await;
        fx.reading(site.id, at(1, 5, 0), "100").await;
        fx.reading(site.id, at(1, 20, 0), "100").await;

        let result = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        assert_eq!(result.line_items.len(), 2);
        assert_eq!(result.line_items[0].amount, dec("20.00"));
        assert_eq!(result.line_items[1].amount, dec("30.00"));
        assert_eq!(result.total_amount, dec("50.00"));
        assert_eq!(
            result.line_items[0].description,
            "Plan A - Usage Charge (Jan 01 - Jan 15)"
        );
        assert!(result.line_items[1].description.contains("Jan 15 - Feb 01"));
    }

    #[tokio::test]
    async fn boundary_reading_goes_to_earlier_window() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let a = fx.save_plan(flat_plan("SG-A", "Plan A", "0.20")).await;
        let b = fx.save_plan(flat_plan("SG-B", "Plan B", "0.30")).await;
        fx.assign(site.id, a.id, at(1, 1, 0), Some(at(1, 15, 0))).await;
        fx.assign(site.id, b.id, at(1, 15, 0), None).await;
        fx.reading(site.id, at(1, 15, 0), "10").await;

        let result = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();

        assert_eq!(result.line_items.len(), 1);
        assert_eq!(result.total_amount, dec("2.00"));
        assert!(result.line_items[0].description.starts_with("Plan A"));
    }

    #[tokio::test]
    async fn no_assignment_is_zero_charge() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        fx.reading(site.id, at(1, 15, 0), "100").await;

        let result = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        assert_eq!(result, CalculationResult::empty());
    }

    #[tokio::test]
    async fn unknown_site_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .pricing()
            .calculate_draft_invoice(Uuid::new_v4(), at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Site", .. }));
    }

    #[tokio::test]
    async fn inverted_period_is_rejected() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let err = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(2, 1, 0), at(1, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn block_rate_fails_the_calculation() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let plan = fx.save_plan(crate::test_support::block_plan("SG-BLOCK")).await;
        fx.assign(site.id, plan.id, at(1, 1, 0), None).await;
        fx.reading(site.id, at(1, 10, 0), "5").await;

        let err = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[tokio::test]
    async fn time_of_use_uses_site_local_time() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let plan = fx
            .save_plan(crate::test_support::tou_plan("SG-TOU", "0.40", "0.10", (22, 0), (6, 0)))
            .await;
        fx.assign(site.id, plan.id, at(1, 1, 0), None).await;
        // 15:00Z = 23:00 SGT (peak), 23:00Z = 07:00 SGT next day (off-peak)
        fx.reading(site.id, Utc.with_ymd_and_hms(2026, 1, 10, 15, 0, 0).unwrap(), "1").await;
        fx.reading(site.id, Utc.with_ymd_and_hms(2026, 1, 10, 23, 0, 0).unwrap(), "1").await;

        let result = fx
            .pricing()
            .calculate_draft_invoice(site.id, at(1, 1, 0), at(2, 1, 0))
            .await
            .unwrap();
        assert_eq!(result.total_amount, dec("0.50"));
        assert_eq!(result.line_items[0].rate, None);
        assert_eq!(result.line_items[0].quantity, dec("2"));
    }
}
