//! SeaORM implementations of TariffRepository and AssignmentRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{db_err, parse_country, parse_uuid, write_err};
use crate::domain::tariff::{AssignmentRepository, TariffRepository};
use crate::domain::{
    BillingCadence, DomainError, DomainResult, RateConfiguration, RateType, SiteTariffAssignment,
    TariffPlan, TariffRate,
};
use crate::infrastructure::database::entities::{site_tariff_assignment, tariff_plan, tariff_rate};

// ── Conversion helpers ──────────────────────────────────────────

fn rate_to_domain(r: tariff_rate::Model) -> DomainResult<TariffRate> {
    let rate_type = RateType::parse(&r.rate_type).ok_or_else(|| {
        DomainError::Configuration(format!("Unknown rate type '{}'", r.rate_type))
    })?;
    Ok(TariffRate {
        id: parse_uuid(&r.id)?,
        plan_id: parse_uuid(&r.plan_id)?,
        position: r.position,
        rate_type,
        description: r.description,
        configuration: RateConfiguration::decode(&r.configuration)?,
    })
}

fn plan_to_domain(p: tariff_plan::Model, rates: Vec<tariff_rate::Model>) -> DomainResult<TariffPlan> {
    let mut rates = rates
        .into_iter()
        .map(rate_to_domain)
        .collect::<DomainResult<Vec<_>>>()?;
    rates.sort_by_key(|r| r.position);

    Ok(TariffPlan {
        id: parse_uuid(&p.id)?,
        code: p.code,
        name: p.name,
        country: parse_country(&p.country)?,
        billing_period: BillingCadence::parse(&p.billing_period).unwrap_or_default(),
        valid_from: p.valid_from,
        valid_to: p.valid_to,
        rates,
        created_at: p.created_at,
        updated_at: p.updated_at,
    })
}

fn assignment_to_domain(a: site_tariff_assignment::Model) -> DomainResult<SiteTariffAssignment> {
    Ok(SiteTariffAssignment {
        id: parse_uuid(&a.id)?,
        site_id: parse_uuid(&a.site_id)?,
        plan_id: parse_uuid(&a.plan_id)?,
        effective_from: a.effective_from,
        effective_to: a.effective_to,
        created_at: a.created_at,
    })
}

fn to_active(a: &SiteTariffAssignment) -> site_tariff_assignment::ActiveModel {
    site_tariff_assignment::ActiveModel {
        id: Set(a.id.to_string()),
        site_id: Set(a.site_id.to_string()),
        plan_id: Set(a.plan_id.to_string()),
        effective_from: Set(a.effective_from),
        effective_to: Set(a.effective_to),
        created_at: Set(a.created_at),
    }
}

// ── SeaOrmTariffRepository ──────────────────────────────────────

pub struct SeaOrmTariffRepository {
    db: DatabaseConnection,
}

impl SeaOrmTariffRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TariffRepository for SeaOrmTariffRepository {
    async fn save_plan(&self, plan: TariffPlan) -> DomainResult<TariffPlan> {
        let mut rate_models = Vec::with_capacity(plan.rates.len());
        for rate in &plan.rates {
            rate_models.push(tariff_rate::ActiveModel {
                id: Set(rate.id.to_string()),
                plan_id: Set(plan.id.to_string()),
                position: Set(rate.position),
                rate_type: Set(rate.rate_type.as_str().to_string()),
                description: Set(rate.description.clone()),
                configuration: Set(rate.configuration.encode()?),
            });
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        tariff_plan::ActiveModel {
            id: Set(plan.id.to_string()),
            code: Set(plan.code.clone()),
            name: Set(plan.name.clone()),
            country: Set(plan.country.as_str().to_string()),
            billing_period: Set(plan.billing_period.as_str().to_string()),
            valid_from: Set(plan.valid_from),
            valid_to: Set(plan.valid_to),
            created_at: Set(plan.created_at),
            updated_at: Set(plan.updated_at),
        }
        .insert(&txn)
        .await
        .map_err(|e| write_err(e, "Tariff plan"))?;

        if !rate_models.is_empty() {
            tariff_rate::Entity::insert_many(rate_models)
                .exec(&txn)
                .await
                .map_err(|e| write_err(e, "Tariff rate"))?;
        }
        txn.commit().await.map_err(db_err)?;

        Ok(plan)
    }

    async fn find_plan(&self, id: Uuid) -> DomainResult<Option<TariffPlan>> {
        let Some(plan) = tariff_plan::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let rates = tariff_rate::Entity::find()
            .filter(tariff_rate::Column::PlanId.eq(plan.id.clone()))
            .order_by_asc(tariff_rate::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        plan_to_domain(plan, rates).map(Some)
    }
}

// ── SeaOrmAssignmentRepository ──────────────────────────────────

pub struct SeaOrmAssignmentRepository {
    db: DatabaseConnection,
}

impl SeaOrmAssignmentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssignmentRepository for SeaOrmAssignmentRepository {
    async fn save(&self, a: SiteTariffAssignment) -> DomainResult<SiteTariffAssignment> {
        let saved = to_active(&a)
            .insert(&self.db)
            .await
            .map_err(|e| write_err(e, "Tariff assignment"))?;
        assignment_to_domain(saved)
    }

    async fn supersede(
        &self,
        previous_id: Uuid,
        next: SiteTariffAssignment,
    ) -> DomainResult<SiteTariffAssignment> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let previous = site_tariff_assignment::Entity::find_by_id(previous_id.to_string())
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                DomainError::not_found("SiteTariffAssignment", "id", previous_id.to_string())
            })?;
        let mut previous: site_tariff_assignment::ActiveModel = previous.into();
        previous.effective_to = Set(Some(next.effective_from));
        previous.update(&txn).await.map_err(db_err)?;

        let saved = to_active(&next)
            .insert(&txn)
            .await
            .map_err(|e| write_err(e, "Tariff assignment"))?;
        txn.commit().await.map_err(db_err)?;

        assignment_to_domain(saved)
    }

    async fn find_overlapping(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<SiteTariffAssignment>> {
        site_tariff_assignment::Entity::find()
            .filter(site_tariff_assignment::Column::SiteId.eq(site_id.to_string()))
            .filter(site_tariff_assignment::Column::EffectiveFrom.lt(end))
            .filter(
                Condition::any()
                    .add(site_tariff_assignment::Column::EffectiveTo.is_null())
                    .add(site_tariff_assignment::Column::EffectiveTo.gt(start)),
            )
            .order_by_asc(site_tariff_assignment::Column::EffectiveFrom)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(assignment_to_domain)
            .collect()
    }

    async fn find_by_site(&self, site_id: Uuid) -> DomainResult<Vec<SiteTariffAssignment>> {
        site_tariff_assignment::Entity::find()
            .filter(site_tariff_assignment::Column::SiteId.eq(site_id.to_string()))
            .order_by_asc(site_tariff_assignment::Column::EffectiveFrom)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(assignment_to_domain)
            .collect()
    }
}
