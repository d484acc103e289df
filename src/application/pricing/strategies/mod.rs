//! Rate strategies
//!
//! One strategy per `RateType`. A strategy turns the readings of one
//! effective window into a single priced line item.

mod flat;
mod time_of_use;

pub use flat::FlatPricingStrategy;
pub use time_of_use::{is_peak, TimeOfUsePricingStrategy};

use chrono_tz::Tz;

use crate::domain::{CalculationLineItem, DomainResult, MeterReading, RateConfiguration, RateType};

pub trait PricingStrategy: Send + Sync {
    /// The rate type this strategy prices
    fn supported_type(&self) -> RateType;

    /// Price `readings` (ascending by timestamp) under `configuration`.
    ///
    /// Fails with `DomainError::Configuration` when the configuration
    /// variant does not belong to `supported_type()`.
    fn calculate_line_item(
        &self,
        readings: &[MeterReading],
        configuration: &RateConfiguration,
        description: &str,
        timezone: Tz,
    ) -> DomainResult<CalculationLineItem>;
}

pub(crate) fn configuration_mismatch(
    expected: RateType,
    configuration: &RateConfiguration,
) -> crate::domain::DomainError {
    crate::domain::DomainError::Configuration(format!(
        "Invalid configuration for {} strategy: got {}",
        expected,
        configuration.rate_type()
    ))
}
