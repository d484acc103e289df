//! Meter reading repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::MeterReading;
use crate::domain::DomainResult;

#[async_trait]
pub trait MeterReadingRepository: Send + Sync {
    /// Readings of a site with `start <= read_at < end`, ascending by `read_at`
    async fn find_by_site_and_range(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<MeterReading>>;

    /// Insert all readings or none. A duplicate (site, timestamp) key
    /// fails the whole batch with `DomainError::Conflict`.
    async fn insert_bulk(&self, readings: Vec<MeterReading>) -> DomainResult<usize>;
}
