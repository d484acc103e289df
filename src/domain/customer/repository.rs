//! Customer & site repository interfaces

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Customer, Site, SitePricingContext};
use crate::domain::DomainResult;
use crate::shared::pagination::{Page, PageRequest};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn save(&self, customer: Customer) -> DomainResult<Customer>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Customer>>;

    /// Page through all customers in a stable order (by id)
    async fn find_page(&self, request: PageRequest) -> DomainResult<Page<Customer>>;
}

#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn save(&self, site: Site) -> DomainResult<Site>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Site>>;

    /// Active sites of a customer, ordered by identifier
    async fn find_active_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Site>>;

    async fn find_pricing_context(&self, id: Uuid) -> DomainResult<Option<SitePricingContext>>;

    /// Subset of `ids` that exist
    async fn find_existing_ids(&self, ids: &[Uuid]) -> DomainResult<HashSet<Uuid>>;
}
