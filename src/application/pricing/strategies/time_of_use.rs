use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;

use super::{configuration_mismatch, PricingStrategy};
use crate::domain::{CalculationLineItem, DomainResult, MeterReading, RateConfiguration, RateType};

/// Peak / off-peak pricing by the site's local wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOfUsePricingStrategy;

/// A reading closes the interval ending at its timestamp, so the peak window
/// is `(peak_start, peak_end]`. When `peak_end` is before `peak_start` the
/// window wraps past midnight.
pub fn is_peak(local_time: NaiveTime, peak_start: NaiveTime, peak_end: NaiveTime) -> bool {
    if peak_end < peak_start {
        local_time > peak_start || local_time <= peak_end
    } else {
        local_time > peak_start && local_time <= peak_end
    }
}

impl PricingStrategy for TimeOfUsePricingStrategy {
    fn supported_type(&self) -> RateType {
        RateType::TimeOfUse
    }

    fn calculate_line_item(
        &self,
        readings: &[MeterReading],
        configuration: &RateConfiguration,
        description: &str,
        timezone: Tz,
    ) -> DomainResult<CalculationLineItem> {
        let RateConfiguration::TimeOfUse {
            peak_price,
            off_peak_price,
            peak_start,
            peak_end,
        } = configuration
        else {
            return Err(configuration_mismatch(RateType::TimeOfUse, configuration));
        };

        let mut total_kwh = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        for reading in readings {
            let local_time = reading.read_at.with_timezone(&timezone).time();
            let price = if is_peak(local_time, *peak_start, *peak_end) {
                peak_price
            } else {
                off_peak_price
            };
            total_kwh += reading.kwh;
            total_cost += reading.kwh * *price;
        }

        // Blended rate: no single unit price
        Ok(CalculationLineItem {
            description: description.to_string(),
            quantity: total_kwh,
            rate: None,
            amount: total_cost,
        })
    }
}
