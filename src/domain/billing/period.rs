//! Billing period window

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::{DomainError, DomainResult};

/// `[start, end)` instant range an invoice covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BillingPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if start >= end {
            return Err(DomainError::Validation(format!(
                "Billing period start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The full calendar month before `now`, in `timezone`:
    /// first of previous month 00:00 to first of current month 00:00 local.
    pub fn previous_month(now: DateTime<Utc>, timezone: Tz) -> DomainResult<Self> {
        let local = now.with_timezone(&timezone);
        let (year, month) = (local.year(), local.month());
        let (prev_year, prev_month) = if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        };

        let start = first_of_month(timezone, prev_year, prev_month)?;
        let end = first_of_month(timezone, year, month)?;
        Self::new(start, end)
    }

    pub fn overlaps(&self, other: &BillingPeriod) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Local midnight of the first day of a month as an instant. Zones that skip
/// midnight on a DST change resolve to the first valid local time after it.
fn first_of_month(timezone: Tz, year: i32, month: u32) -> DomainResult<DateTime<Utc>> {
    let midnight = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DomainError::Validation(format!("Invalid month {}-{}", year, month)))?;

    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "No local midnight for {}-{:02}-01 in {}",
                year,
                month,
                timezone.name()
            ))
        })
}
