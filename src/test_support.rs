//! Shared fixtures for unit tests

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::billing::{BillingJob, BillingJobConfig, WorkerPool};
use crate::application::pricing::StrategyRegistry;
use crate::application::services::{
    InvoiceService, MeterReadingService, PricingService, TariffManagementService,
};
use crate::domain::tariff::BlockTier;
use crate::domain::{
    BillingCadence, Country, Customer, MeterReading, RateConfiguration, RepositoryProvider, Site,
    SiteTariffAssignment, TariffPlan, TariffRate,
};
use crate::infrastructure::InMemoryRepositoryProvider;

/// `month`/`day` `hour`:00 UTC in 2026
pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn plan(code: &str, name: &str, rates: Vec<(&str, RateConfiguration)>) -> TariffPlan {
    let id = Uuid::new_v4();
    let now = Utc::now();
    TariffPlan {
        id,
        code: code.into(),
        name: name.into(),
        country: Country::SG,
        billing_period: BillingCadence::Monthly,
        valid_from: at(1, 1, 0),
        valid_to: None,
        rates: rates
            .into_iter()
            .enumerate()
            .map(|(i, (description, configuration))| TariffRate {
                id: Uuid::new_v4(),
                plan_id: id,
                position: i as i32,
                rate_type: configuration.rate_type(),
                description: description.into(),
                configuration,
            })
            .collect(),
        created_at: now,
        updated_at: now,
    }
}

/// One FLAT "Usage Charge" rate
pub fn flat_plan(code: &str, name: &str, price: &str) -> TariffPlan {
    plan(
        code,
        name,
        vec![("Usage Charge", RateConfiguration::Flat { price_per_kwh: dec(price) })],
    )
}

/// One TIME_OF_USE rate with the peak window `(start, end]` in local time
pub fn tou_plan(
    code: &str,
    peak: &str,
    off_peak: &str,
    start: (u32, u32),
    end: (u32, u32),
) -> TariffPlan {
    plan(
        code,
        "Time of Use",
        vec![(
            "Energy Charge",
            RateConfiguration::TimeOfUse {
                peak_price: dec(peak),
                off_peak_price: dec(off_peak),
                peak_start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
                peak_end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            },
        )],
    )
}

/// A BLOCK rate, which has no registered strategy
pub fn block_plan(code: &str) -> TariffPlan {
    plan(
        code,
        "Tiered",
        vec![(
            "Tiered Charge",
            RateConfiguration::Block {
                tiers: vec![BlockTier { up_to_kwh: None, price_per_kwh: dec("0.20") }],
            },
        )],
    )
}

/// Repositories plus service constructors over them
pub struct Fixture {
    pub repos: Arc<dyn RepositoryProvider>,
    registry: Arc<StrategyRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_repos(Arc::new(InMemoryRepositoryProvider::new()))
    }

    pub fn with_repos(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            repos,
            registry: Arc::new(StrategyRegistry::with_default_strategies()),
        }
    }

    pub async fn customer(&self, country: Country) -> Customer {
        self.repos
            .customers()
            .save(Customer::new("Test Customer", "billing@example.com", country))
            .await
            .unwrap()
    }

    pub async fn save_site(&self, site: Site) -> Site {
        self.repos.sites().save(site).await.unwrap()
    }

    /// New SG customer with one active site "NMI-SG-1" in "Central"
    pub async fn site_sg(&self) -> Site {
        let customer = self.customer(Country::SG).await;
        self.save_site(Site::new(customer.id, "NMI-SG-1", Country::SG, "Central"))
            .await
    }

    pub async fn save_plan(&self, plan: TariffPlan) -> TariffPlan {
        self.repos.tariffs().save_plan(plan).await.unwrap()
    }

    pub async fn assign(
        &self,
        site_id: Uuid,
        plan_id: Uuid,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> SiteTariffAssignment {
        self.repos
            .assignments()
            .save(SiteTariffAssignment::new(site_id, plan_id, from, to))
            .await
            .unwrap()
    }

    pub async fn reading(&self, site_id: Uuid, read_at: DateTime<Utc>, kwh: &str) {
        self.repos
            .readings()
            .insert_bulk(vec![MeterReading::new(site_id, read_at, dec(kwh))])
            .await
            .unwrap();
    }

    pub fn pricing(&self) -> PricingService {
        PricingService::new(Arc::clone(&self.repos), Arc::clone(&self.registry))
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(Arc::clone(&self.repos), Arc::new(self.pricing()), 14)
    }

    pub fn metering(&self) -> MeterReadingService {
        MeterReadingService::new(Arc::clone(&self.repos))
    }

    pub fn tariffs(&self) -> TariffManagementService {
        TariffManagementService::new(Arc::clone(&self.repos))
    }

    /// Job over the Asia/Singapore calendar with its own pool
    pub fn job(&self, page_size: u64, workers: usize) -> BillingJob {
        BillingJob::new(
            Arc::clone(&self.repos),
            Arc::new(self.invoices()),
            WorkerPool::new(workers),
            BillingJobConfig {
                page_size,
                ..BillingJobConfig::default()
            },
        )
    }
}
