//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_customers;
mod m20260101_000002_create_meter_readings;
mod m20260101_000003_create_tariffs;
mod m20260101_000004_create_invoices;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_customers::Migration),
            Box::new(m20260101_000002_create_meter_readings::Migration),
            Box::new(m20260101_000003_create_tariffs::Migration),
            Box::new(m20260101_000004_create_invoices::Migration),
        ]
    }
}
