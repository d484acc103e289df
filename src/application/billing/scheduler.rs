//! Fires the monthly billing run at a fixed local day and hour

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::job::BillingJob;
use crate::shared::ShutdownSignal;

pub struct MonthlyScheduler {
    job: Arc<BillingJob>,
    run_day: u32,
    run_hour: u32,
}

impl MonthlyScheduler {
    /// `run_day` must be 1..=28 and `run_hour` 0..=23 (checked by config validation)
    pub fn new(job: Arc<BillingJob>, run_day: u32, run_hour: u32) -> Self {
        Self {
            job,
            run_day: run_day.clamp(1, 28),
            run_hour: run_hour.min(23),
        }
    }

    /// First scheduled instant strictly after `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let timezone = self.job.reference_timezone();
        let local = now.with_timezone(&timezone);

        let this_month = scheduled_instant(timezone, local.year(), local.month(), self.run_day, self.run_hour)?;
        if this_month > now {
            return Some(this_month);
        }

        let (year, month) = if local.month() == 12 {
            (local.year() + 1, 1)
        } else {
            (local.year(), local.month() + 1)
        };
        scheduled_instant(timezone, year, month, self.run_day, self.run_hour)
    }

    /// Spawn the scheduler loop; it exits when `shutdown` fires.
    /// A run already in progress is allowed to finish.
    pub fn start(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                run_day = self.run_day,
                run_hour = self.run_hour,
                timezone = self.job.reference_timezone().name(),
                "Monthly billing scheduler started"
            );

            loop {
                let now = Utc::now();
                let Some(next) = self.next_run_after(now) else {
                    warn!("Cannot compute next billing run; scheduler stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                info!(next_run = %next, "Next billing run scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        self.job.run_monthly_billing().await;
                    }
                    _ = shutdown.wait() => {
                        info!("Monthly billing scheduler shutting down");
                        break;
                    }
                }
            }

            info!("Monthly billing scheduler stopped");
        })
    }
}

/// Local `day` at `hour`:00 as an instant; a skipped local hour moves forward one hour
fn scheduled_instant(timezone: Tz, year: i32, month: u32, day: u32, hour: u32) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
}
