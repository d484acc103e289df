//! Billing aggregate
//!
//! Invoices, their lines and the billing period they cover.

pub mod model;
pub mod period;
pub mod repository;

pub use model::{Invoice, InvoiceLine, InvoiceStatus};
pub use period::BillingPeriod;
pub use repository::InvoiceRepository;
