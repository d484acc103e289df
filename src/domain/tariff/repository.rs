//! Tariff plan & site assignment repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{SiteTariffAssignment, TariffPlan};
use crate::domain::DomainResult;

#[async_trait]
pub trait TariffRepository: Send + Sync {
    /// Persist a plan together with its rates
    async fn save_plan(&self, plan: TariffPlan) -> DomainResult<TariffPlan>;

    /// Plan with its rates ordered by position
    async fn find_plan(&self, id: Uuid) -> DomainResult<Option<TariffPlan>>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn save(&self, assignment: SiteTariffAssignment) -> DomainResult<SiteTariffAssignment>;

    /// Close `previous_id` at `next.effective_from` and insert `next` as one
    /// atomic write. On any failure neither change is visible.
    async fn supersede(
        &self,
        previous_id: Uuid,
        next: SiteTariffAssignment,
    ) -> DomainResult<SiteTariffAssignment>;

    /// Assignments of a site intersecting `[start, end)`, ascending by `effective_from`
    async fn find_overlapping(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<SiteTariffAssignment>>;

    /// All assignments of a site, ascending by `effective_from`
    async fn find_by_site(&self, site_id: Uuid) -> DomainResult<Vec<SiteTariffAssignment>>;
}
