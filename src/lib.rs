//! # Energy Billing
//!
//! Pricing and proration engine for metered electricity, plus the monthly
//! batch run that turns readings into invoices.
//!
//! ## Architecture
//!
//! - **domain**: entities (customers, sites, readings, tariffs, invoices) and repository traits
//! - **application**: pricing strategies, tariff resolution, invoice generation and the batch job
//! - **infrastructure**: SeaORM/SQLite persistence and an in-memory provider
//! - **server**: daemon lifecycle (metrics, scheduler, graceful shutdown)

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod server;
pub mod shared;

#[cfg(test)]
mod test_support;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{
    init_database, run_migrations, DatabaseConfig, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider,
};

pub use server::{BillingServices, ServerHandle, ServerOptions};
