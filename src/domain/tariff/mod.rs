//! Tariff aggregate
//!
//! Plans, their rates and the polymorphic rate configuration, plus the
//! time-bounded binding of a plan to a site.

pub mod model;
pub mod repository;

pub use model::{
    BillingCadence, BlockTier, RateConfiguration, RateType, SiteTariffAssignment, TariffPlan,
    TariffRate,
};
pub use repository::{AssignmentRepository, TariffRepository};
