use chrono_tz::Tz;
use rust_decimal::Decimal;

use super::{configuration_mismatch, PricingStrategy};
use crate::domain::{CalculationLineItem, DomainResult, MeterReading, RateConfiguration, RateType};

/// Total kWh times a single unit price
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatPricingStrategy;

impl PricingStrategy for FlatPricingStrategy {
    fn supported_type(&self) -> RateType {
        RateType::Flat
    }

    fn calculate_line_item(
        &self,
        readings: &[MeterReading],
        configuration: &RateConfiguration,
        description: &str,
        _timezone: Tz,
    ) -> DomainResult<CalculationLineItem> {
        let RateConfiguration::Flat { price_per_kwh } = configuration else {
            return Err(configuration_mismatch(RateType::Flat, configuration));
        };

        let total_kwh: Decimal = readings.iter().map(|r| r.kwh).sum();

        Ok(CalculationLineItem {
            description: description.to_string(),
            quantity: total_kwh,
            rate: Some(*price_per_kwh),
            amount: total_kwh * *price_per_kwh,
        })
    }
}
