//! Application services

mod invoice;
mod metering;
mod pricing;
mod tariff_management;

pub use invoice::InvoiceService;
pub use metering::{MeterReadingService, ReadingInput};
pub use pricing::PricingService;
pub use tariff_management::{NewTariffPlan, NewTariffRate, TariffManagementService};
