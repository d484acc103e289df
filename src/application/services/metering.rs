//! Bulk meter reading ingest

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult, MeterReading, RepositoryProvider};

/// One incoming reading
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingInput {
    pub site_id: Uuid,
    pub read_at: DateTime<Utc>,
    pub kwh: Decimal,
}

pub struct MeterReadingService {
    repos: Arc<dyn RepositoryProvider>,
}

impl MeterReadingService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Store a batch of readings all-or-nothing.
    ///
    /// Readings of unknown sites are dropped with a warning. A duplicate
    /// (site, timestamp), within the batch or against stored readings,
    /// rejects the whole batch. Returns the number stored.
    pub async fn ingest_bulk(&self, inputs: Vec<ReadingInput>) -> DomainResult<usize> {
        if inputs.is_empty() {
            return Ok(0);
        }

        if let Some(bad) = inputs.iter().find(|r| r.kwh.is_sign_negative() && !r.kwh.is_zero()) {
            return Err(DomainError::Validation(format!(
                "Negative reading {} kWh for site {} at {}",
                bad.kwh, bad.site_id, bad.read_at
            )));
        }

        let mut site_ids: Vec<Uuid> = inputs.iter().map(|r| r.site_id).collect();
        site_ids.sort_unstable();
        site_ids.dedup();
        let known = self.repos.sites().find_existing_ids(&site_ids).await?;

        let mut seen = HashSet::with_capacity(inputs.len());
        let mut readings = Vec::with_capacity(inputs.len());
        let mut skipped = 0usize;

        for input in inputs {
            if !known.contains(&input.site_id) {
                skipped += 1;
                continue;
            }
            let reading = MeterReading::new(input.site_id, input.read_at, input.kwh);
            if !seen.insert(reading.key()) {
                return Err(DomainError::Conflict(format!(
                    "Duplicate reading for site {} at {}",
                    reading.site_id, reading.read_at
                )));
            }
            readings.push(reading);
        }

        if skipped > 0 {
            warn!(skipped, "Dropped readings for unknown sites");
        }
        if readings.is_empty() {
            return Ok(0);
        }

        let stored = self.repos.readings().insert_bulk(readings).await?;
        info!(stored, "Meter readings ingested");
        Ok(stored)
    }
}
