//! Customer aggregate
//!
//! Customers, their sites, and the pricing context of a site.

pub mod model;
pub mod repository;

pub use model::{Country, Currency, Customer, Site, SitePricingContext};
pub use repository::{CustomerRepository, SiteRepository};
