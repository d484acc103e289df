//! SeaORM implementation of MeterReadingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::{db_err, parse_decimal, parse_uuid, write_err};
use crate::domain::metering::MeterReadingRepository;
use crate::domain::{DomainResult, MeterReading};
use crate::infrastructure::database::entities::meter_reading;

/// Rows per INSERT statement; keeps bound parameters well under SQLite's limit
const INSERT_CHUNK: usize = 300;

pub struct SeaOrmMeterReadingRepository {
    db: DatabaseConnection,
}

impl SeaOrmMeterReadingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(r: meter_reading::Model) -> DomainResult<MeterReading> {
    Ok(MeterReading {
        site_id: parse_uuid(&r.site_id)?,
        read_at: r.read_at,
        kwh: parse_decimal(&r.kwh)?,
    })
}

#[async_trait]
impl MeterReadingRepository for SeaOrmMeterReadingRepository {
    async fn find_by_site_and_range(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterReading>> {
        meter_reading::Entity::find()
            .filter(meter_reading::Column::SiteId.eq(site_id.to_string()))
            .filter(meter_reading::Column::ReadAt.gte(start))
            .filter(meter_reading::Column::ReadAt.lt(end))
            .order_by_asc(meter_reading::Column::ReadAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn insert_bulk(&self, readings: Vec<MeterReading>) -> DomainResult<usize> {
        if readings.is_empty() {
            return Ok(0);
        }
        let count = readings.len();

        let txn = self.db.begin().await.map_err(db_err)?;
        for chunk in readings.chunks(INSERT_CHUNK) {
            let models = chunk.iter().map(|r| meter_reading::ActiveModel {
                site_id: Set(r.site_id.to_string()),
                read_at: Set(r.read_at),
                kwh: Set(r.kwh.to_string()),
            });
            // Dropping `txn` on error rolls the whole batch back
            meter_reading::Entity::insert_many(models)
                .exec(&txn)
                .await
                .map_err(|e| write_err(e, "Meter reading"))?;
        }
        txn.commit().await.map_err(db_err)?;

        debug!(count, "Meter readings stored");
        Ok(count)
    }
}
