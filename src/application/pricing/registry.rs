//! Strategy registry: one `PricingStrategy` per `RateType`.
//!
//! New rate types are added by registering a strategy; the resolver and the
//! pricing service only ever dispatch through here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::debug;

use super::strategies::{FlatPricingStrategy, PricingStrategy, TimeOfUsePricingStrategy};
use crate::domain::{
    CalculationLineItem, DomainError, DomainResult, MeterReading, RateType, TariffRate,
};

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<RateType, Arc<dyn PricingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// FLAT and TIME_OF_USE. BLOCK has no strategy yet.
    pub fn with_default_strategies() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FlatPricingStrategy));
        registry.register(Arc::new(TimeOfUsePricingStrategy));
        registry
    }

    /// Register a strategy, replacing any previous one for the same type
    pub fn register(&mut self, strategy: Arc<dyn PricingStrategy>) -> Option<Arc<dyn PricingStrategy>> {
        let rate_type = strategy.supported_type();
        debug!(%rate_type, "Registering pricing strategy");
        self.strategies.insert(rate_type, strategy)
    }

    pub fn supports(&self, rate_type: RateType) -> bool {
        self.strategies.contains_key(&rate_type)
    }

    pub fn get(&self, rate_type: RateType) -> DomainResult<&dyn PricingStrategy> {
        self.strategies
            .get(&rate_type)
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                DomainError::Configuration(format!(
                    "No strategy implementation found for rate type: {}",
                    rate_type
                ))
            })
    }

    /// Price one rate of a plan over a reading slice
    pub fn calculate(
        &self,
        rate: &TariffRate,
        readings: &[MeterReading],
        description: &str,
        timezone: Tz,
    ) -> DomainResult<CalculationLineItem> {
        self.get(rate.rate_type)?
            .calculate_line_item(readings, &rate.configuration, description, timezone)
    }
}
