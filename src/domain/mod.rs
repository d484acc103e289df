pub mod billing;
pub mod customer;
pub mod metering;
pub mod pricing;
pub mod repositories;
pub mod tariff;

// Re-export commonly used types
pub use billing::{BillingPeriod, Invoice, InvoiceLine, InvoiceStatus};
pub use customer::{Country, Currency, Customer, Site, SitePricingContext};
pub use metering::MeterReading;
pub use pricing::{CalculationLineItem, CalculationResult, EffectiveWindow};
pub use repositories::{DomainResult, RepositoryProvider};
pub use tariff::{
    BillingCadence, BlockTier, RateConfiguration, RateType, SiteTariffAssignment, TariffPlan,
    TariffRate,
};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
