//! Database entities module

pub mod customer;
pub mod invoice;
pub mod invoice_line;
pub mod meter_reading;
pub mod site;
pub mod site_tariff_assignment;
pub mod tariff_plan;
pub mod tariff_rate;

pub use customer::Entity as Customer;
pub use invoice::Entity as Invoice;
pub use invoice_line::Entity as InvoiceLine;
pub use meter_reading::Entity as MeterReading;
pub use site::Entity as Site;
pub use site_tariff_assignment::Entity as SiteTariffAssignment;
pub use tariff_plan::Entity as TariffPlan;
pub use tariff_rate::Entity as TariffRate;
