//! SeaORM implementations of CustomerRepository and SiteRepository

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::{db_err, parse_country, parse_uuid, write_err};
use crate::domain::customer::{CustomerRepository, SiteRepository};
use crate::domain::{Customer, DomainError, DomainResult, Site, SitePricingContext};
use crate::infrastructure::database::entities::{customer, site};
use crate::shared::pagination::{Page, PageRequest};

// ── Conversion helpers ──────────────────────────────────────────

fn parse_timezone(value: &str) -> DomainResult<Tz> {
    value
        .parse::<Tz>()
        .map_err(|e| DomainError::Storage(format!("Unknown timezone '{}': {}", value, e)))
}

fn customer_to_domain(c: customer::Model) -> DomainResult<Customer> {
    Ok(Customer {
        id: parse_uuid(&c.id)?,
        name: c.name,
        email: c.email,
        country: parse_country(&c.country)?,
        created_at: c.created_at,
        updated_at: c.updated_at,
    })
}

fn site_to_domain(s: site::Model) -> DomainResult<Site> {
    Ok(Site {
        id: parse_uuid(&s.id)?,
        customer_id: parse_uuid(&s.customer_id)?,
        identifier: s.identifier,
        country: parse_country(&s.country)?,
        region: s.region,
        address: s.address,
        timezone: parse_timezone(&s.timezone)?,
        active: s.active,
        created_at: s.created_at,
        updated_at: s.updated_at,
    })
}

// ── SeaOrmCustomerRepository ────────────────────────────────────

pub struct SeaOrmCustomerRepository {
    db: DatabaseConnection,
}

impl SeaOrmCustomerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomerRepository for SeaOrmCustomerRepository {
    async fn save(&self, c: Customer) -> DomainResult<Customer> {
        let existing = customer::Entity::find_by_id(c.id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let model = customer::ActiveModel {
            id: Set(c.id.to_string()),
            name: Set(c.name.clone()),
            email: Set(c.email.clone()),
            country: Set(c.country.as_str().to_string()),
            created_at: Set(c.created_at),
            updated_at: Set(Utc::now()),
        };

        let saved = match existing {
            Some(_) => model.update(&self.db).await.map_err(db_err)?,
            None => model.insert(&self.db).await.map_err(|e| write_err(e, "Customer"))?,
        };
        customer_to_domain(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Customer>> {
        customer::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(customer_to_domain)
            .transpose()
    }

    async fn find_page(&self, request: PageRequest) -> DomainResult<Page<Customer>> {
        let models = customer::Entity::find()
            .order_by_asc(customer::Column::Id)
            .offset(request.offset())
            .limit(request.size)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let items = models
            .into_iter()
            .map(customer_to_domain)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Page::new(items, request))
    }
}

// ── SeaOrmSiteRepository ────────────────────────────────────────

pub struct SeaOrmSiteRepository {
    db: DatabaseConnection,
}

impl SeaOrmSiteRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SiteRepository for SeaOrmSiteRepository {
    async fn save(&self, s: Site) -> DomainResult<Site> {
        let existing = site::Entity::find_by_id(s.id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let model = site::ActiveModel {
            id: Set(s.id.to_string()),
            customer_id: Set(s.customer_id.to_string()),
            identifier: Set(s.identifier.clone()),
            country: Set(s.country.as_str().to_string()),
            region: Set(s.region.clone()),
            address: Set(s.address.clone()),
            timezone: Set(s.timezone.name().to_string()),
            active: Set(s.active),
            created_at: Set(s.created_at),
            updated_at: Set(Utc::now()),
        };

        let saved = match existing {
            Some(_) => model.update(&self.db).await.map_err(db_err)?,
            None => model.insert(&self.db).await.map_err(|e| write_err(e, "Site"))?,
        };
        site_to_domain(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Site>> {
        site::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(site_to_domain)
            .transpose()
    }

    async fn find_active_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Site>> {
        site::Entity::find()
            .filter(site::Column::CustomerId.eq(customer_id.to_string()))
            .filter(site::Column::Active.eq(true))
            .order_by_asc(site::Column::Identifier)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(site_to_domain)
            .collect()
    }

    async fn find_pricing_context(&self, id: Uuid) -> DomainResult<Option<SitePricingContext>> {
        let timezone: Option<String> = site::Entity::find_by_id(id.to_string())
            .select_only()
            .column(site::Column::Timezone)
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(db_err)?;

        timezone
            .map(|tz| {
                Ok(SitePricingContext {
                    id,
                    timezone: parse_timezone(&tz)?,
                })
            })
            .transpose()
    }

    async fn find_existing_ids(&self, ids: &[Uuid]) -> DomainResult<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<String> = site::Entity::find()
            .select_only()
            .column(site::Column::Id)
            .filter(site::Column::Id.is_in(ids.iter().map(Uuid::to_string)))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        found.iter().map(|id| parse_uuid(id)).collect()
    }
}
