pub mod billing;
pub mod pricing;
pub mod services;

// Re-export key types for convenience
pub use billing::{BillingJob, BillingJobConfig, CustomerOutcome, JobSummary, MonthlyScheduler, WorkerPool};
pub use pricing::{PricingStrategy, ResolvedAssignment, StrategyRegistry, TariffResolver};
pub use services::{
    InvoiceService, MeterReadingService, NewTariffPlan, NewTariffRate, PricingService, ReadingInput,
    TariffManagementService,
};
