//! Pricing engine: rate strategies, their registry and the tariff resolver

pub mod registry;
pub mod resolver;
pub mod strategies;

pub use registry::StrategyRegistry;
pub use resolver::{ResolvedAssignment, TariffResolver};
pub use strategies::{is_peak, FlatPricingStrategy, PricingStrategy, TimeOfUsePricingStrategy};
