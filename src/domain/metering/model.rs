//! Meter reading domain entity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point sample of consumption, keyed by (site, timestamp).
///
/// A reading represents consumption up to and including `read_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    pub site_id: Uuid,
    pub read_at: DateTime<Utc>,
    /// Energy in kWh, never negative
    pub kwh: Decimal,
}

impl MeterReading {
    pub fn new(site_id: Uuid, read_at: DateTime<Utc>, kwh: Decimal) -> Self {
        Self {
            site_id,
            read_at,
            kwh,
        }
    }

    pub fn key(&self) -> (Uuid, DateTime<Utc>) {
        (self.site_id, self.read_at)
    }
}
