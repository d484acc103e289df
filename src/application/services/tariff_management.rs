//! Tariff plan creation and site assignment

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    BillingCadence, Country, DomainError, DomainResult, RateConfiguration, RateType,
    RepositoryProvider, SiteTariffAssignment, TariffPlan, TariffRate,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTariffRate {
    pub rate_type: RateType,
    pub description: String,
    pub configuration: RateConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTariffPlan {
    pub code: String,
    pub name: String,
    pub country: Country,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    pub rates: Vec<NewTariffRate>,
}

pub struct TariffManagementService {
    repos: Arc<dyn RepositoryProvider>,
}

impl TariffManagementService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Validate and persist a plan; rates keep their input order as `position`
    pub async fn create_plan(&self, new_plan: NewTariffPlan) -> DomainResult<TariffPlan> {
        if new_plan.rates.is_empty() {
            return Err(DomainError::Validation(format!(
                "Tariff plan {} has no rates",
                new_plan.code
            )));
        }
        if new_plan.valid_to.is_some_and(|to| to <= new_plan.valid_from) {
            return Err(DomainError::Validation(format!(
                "Tariff plan {} validity ends before it starts",
                new_plan.code
            )));
        }

        let plan_id = Uuid::new_v4();
        let mut rates = Vec::with_capacity(new_plan.rates.len());
        for (position, rate) in new_plan.rates.into_iter().enumerate() {
            if rate.rate_type != rate.configuration.rate_type() {
                return Err(DomainError::Configuration(format!(
                    "Rate '{}' declared {} but configured as {}",
                    rate.description,
                    rate.rate_type,
                    rate.configuration.rate_type()
                )));
            }
            rate.configuration.validate()?;
            rates.push(TariffRate {
                id: Uuid::new_v4(),
                plan_id,
                position: position as i32,
                rate_type: rate.rate_type,
                description: rate.description,
                configuration: rate.configuration,
            });
        }

        let now = Utc::now();
        let plan = TariffPlan {
            id: plan_id,
            code: new_plan.code,
            name: new_plan.name,
            country: new_plan.country,
            billing_period: BillingCadence::Monthly,
            valid_from: new_plan.valid_from,
            valid_to: new_plan.valid_to,
            rates,
            created_at: now,
            updated_at: now,
        };

        let plan = self.repos.tariffs().save_plan(plan).await?;
        info!(plan_id = %plan.id, code = %plan.code, rates = plan.rates.len(), "Tariff plan created");
        Ok(plan)
    }

    /// Bind a plan to a site from `effective_from`.
    ///
    /// An open-ended assignment that started earlier is closed at
    /// `effective_from`; any other overlap is a `Conflict`.
    pub async fn assign_plan(
        &self,
        site_id: Uuid,
        plan_id: Uuid,
        effective_from: DateTime<Utc>,
        effective_to: Option<DateTime<Utc>>,
    ) -> DomainResult<SiteTariffAssignment> {
        if effective_to.is_some_and(|to| to <= effective_from) {
            return Err(DomainError::Validation(
                "Assignment must end after it starts".to_string(),
            ));
        }
        if self.repos.sites().find_by_id(site_id).await?.is_none() {
            return Err(DomainError::not_found("Site", "id", site_id.to_string()));
        }
        if self.repos.tariffs().find_plan(plan_id).await?.is_none() {
            return Err(DomainError::not_found("TariffPlan", "id", plan_id.to_string()));
        }

        let existing = self.repos.assignments().find_by_site(site_id).await?;
        let superseded = existing
            .iter()
            .filter(|a| a.is_open_ended() && a.effective_from < effective_from)
            .max_by_key(|a| a.effective_from)
            .map(|a| a.id);

        for current in &existing {
            let mut current = current.clone();
            if Some(current.id) == superseded {
                current.effective_to = Some(effective_from);
            }
            if current.overlaps(effective_from, effective_to) {
                return Err(DomainError::Conflict(format!(
                    "Site {} already has assignment {} overlapping {}",
                    site_id, current.id, effective_from
                )));
            }
        }

        let assignment = SiteTariffAssignment::new(site_id, plan_id, effective_from, effective_to);
        let assignment = match superseded {
            Some(previous) => {
                let assignment = self.repos.assignments().supersede(previous, assignment).await?;
                info!(assignment_id = %previous, effective_to = %effective_from, "Closed previous assignment");
                assignment
            }
            None => self.repos.assignments().save(assignment).await?,
        };
        info!(
            site_id = %site_id,
            plan_id = %plan_id,
            assignment_id = %assignment.id,
            "Tariff plan assigned"
        );
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::InvoiceRepository;
    use crate::domain::customer::{CustomerRepository, SiteRepository};
    use crate::domain::metering::MeterReadingRepository;
    use crate::domain::tariff::{AssignmentRepository, TariffRepository};
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::test_support::{at, dec, Fixture};
    use async_trait::async_trait;

    fn flat(description: &str, price: &str) -> NewTariffRate {
        NewTariffRate {
            rate_type: RateType::Flat,
            description: description.into(),
            configuration: RateConfiguration::Flat { price_per_kwh: dec(price) },
        }
    }

    fn new_plan(rates: Vec<NewTariffRate>) -> NewTariffPlan {
        NewTariffPlan {
            code: "SG-RES".into(),
            name: "Residential".into(),
            country: Country::SG,
            valid_from: at(1, 1, 0),
            valid_to: None,
            rates,
        }
    }

    #[tokio::test]
    async fn create_plan_keeps_rate_order() {
        let fx = Fixture::new();
        let plan = fx
            .tariffs()
            .create_plan(new_plan(vec![flat("Energy", "0.20"), flat("Network", "0.05")]))
            .await
            .unwrap();

        let stored = fx.repos.tariffs().find_plan(plan.id).await.unwrap().unwrap();
        let labels: Vec<&str> = stored.rates.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(labels, vec!["Energy", "Network"]);
        assert_eq!(stored.rates[1].position, 1);
    }

    #[tokio::test]
    async fn mismatched_rate_type_is_a_configuration_error() {
        let fx = Fixture::new();
        let mut rate = flat("Energy", "0.20");
        rate.rate_type = RateType::TimeOfUse;
        let err = fx.tariffs().create_plan(new_plan(vec![rate])).await.unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[tokio::test]
    async fn plan_without_rates_is_rejected() {
        let fx = Fixture::new();
        let err = fx.tariffs().create_plan(new_plan(Vec::new())).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .tariffs()
            .create_plan(new_plan(vec![flat("Energy", "-1")]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[tokio::test]
    async fn new_assignment_closes_open_ended_predecessor() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let service = fx.tariffs();
        let a = service.create_plan(new_plan(vec![flat("A", "0.20")])).await.unwrap();
        let b = service.create_plan(new_plan(vec![flat("B", "0.30")])).await.unwrap();

        let first = service.assign_plan(site.id, a.id, at(1, 1, 0), None).await.unwrap();
        service.assign_plan(site.id, b.id, at(1, 15, 0), None).await.unwrap();

        let all = fx.repos.assignments().find_by_site(site.id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[0].effective_to, Some(at(1, 15, 0)));
        assert!(all[1].is_open_ended());
    }

    #[tokio::test]
    async fn overlapping_assignment_is_rejected() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let service = fx.tariffs();
        let a = service.create_plan(new_plan(vec![flat("A", "0.20")])).await.unwrap();

        service
            .assign_plan(site.id, a.id, at(1, 1, 0), Some(at(2, 1, 0)))
            .await
            .unwrap();
        let err = service
            .assign_plan(site.id, a.id, at(1, 20, 0), Some(at(3, 1, 0)))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Starting before an open-ended assignment cannot close it
        let open_site = fx.site_sg().await;
        service.assign_plan(open_site.id, a.id, at(2, 1, 0), None).await.unwrap();
        let err = service
            .assign_plan(open_site.id, a.id, at(1, 1, 0), None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn assignment_requires_existing_site_and_plan() {
        let fx = Fixture::new();
        let site = fx.site_sg().await;
        let err = fx
            .tariffs()
            .assign_plan(site.id, Uuid::new_v4(), at(1, 1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "TariffPlan", .. }));

        let err = fx
            .tariffs()
            .assign_plan(Uuid::new_v4(), Uuid::new_v4(), at(1, 1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Site", .. }));
    }

    /// Reads pass through; every assignment write fails like a full disk
    struct DiskFull {
        inner: Arc<InMemoryRepositoryProvider>,
    }

    #[async_trait]
    impl AssignmentRepository for DiskFull {
        async fn save(&self, _: SiteTariffAssignment) -> DomainResult<SiteTariffAssignment> {
            Err(DomainError::Storage("disk full".into()))
        }

        async fn supersede(
            &self,
            _: Uuid,
            _: SiteTariffAssignment,
        ) -> DomainResult<SiteTariffAssignment> {
            Err(DomainError::Storage("disk full".into()))
        }

        async fn find_overlapping(
            &self,
            site_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> DomainResult<Vec<SiteTariffAssignment>> {
            self.inner.assignments().find_overlapping(site_id, start, end).await
        }

        async fn find_by_site(&self, site_id: Uuid) -> DomainResult<Vec<SiteTariffAssignment>> {
            self.inner.assignments().find_by_site(site_id).await
        }
    }

    impl RepositoryProvider for DiskFull {
        fn customers(&self) -> &dyn CustomerRepository {
            self.inner.customers()
        }
        fn sites(&self) -> &dyn SiteRepository {
            self.inner.sites()
        }
        fn readings(&self) -> &dyn MeterReadingRepository {
            self.inner.readings()
        }
        fn tariffs(&self) -> &dyn TariffRepository {
            self.inner.tariffs()
        }
        fn assignments(&self) -> &dyn AssignmentRepository {
            self
        }
        fn invoices(&self) -> &dyn InvoiceRepository {
            self.inner.invoices()
        }
    }

    #[tokio::test]
    async fn failed_plan_change_keeps_previous_assignment_open() {
        let inner = Arc::new(InMemoryRepositoryProvider::new());
        let fx = Fixture::with_repos(inner.clone());
        let site = fx.site_sg().await;
        let a = fx.tariffs().create_plan(new_plan(vec![flat("A", "0.20")])).await.unwrap();
        let b = fx.tariffs().create_plan(new_plan(vec![flat("B", "0.30")])).await.unwrap();
        let first = fx.tariffs().assign_plan(site.id, a.id, at(1, 1, 0), None).await.unwrap();

        let failing = TariffManagementService::new(Arc::new(DiskFull { inner: inner.clone() }));
        let err = failing
            .assign_plan(site.id, b.id, at(1, 15, 0), None)
            .await
            .unwrap_err();
        assert!(err.is_transient());

        let stored = inner.assignments().find_by_site(site.id).await.unwrap();
        assert_eq!(stored, vec![first]);
        assert!(stored[0].is_open_ended());
    }
}
