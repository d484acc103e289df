//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod customer_repository;
pub mod invoice_repository;
pub mod meter_reading_repository;
pub mod repository_provider;
pub mod tariff_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use uuid::Uuid;

use crate::domain::{Country, DomainError, DomainResult};

// ── Shared conversion helpers ───────────────────────────────────

pub(crate) fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

/// Unique-key violations become `Conflict`, everything else `Storage`
pub(crate) fn write_err(e: DbErr, what: &str) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            DomainError::Conflict(format!("{} already exists: {}", what, detail))
        }
        _ => db_err(e),
    }
}

pub(crate) fn parse_uuid(value: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| DomainError::Storage(format!("Corrupt id '{}': {}", value, e)))
}

pub(crate) fn parse_decimal(value: &str) -> DomainResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| DomainError::Storage(format!("Corrupt decimal '{}': {}", value, e)))
}

pub(crate) fn parse_country(value: &str) -> DomainResult<Country> {
    Country::parse(value)
        .ok_or_else(|| DomainError::Storage(format!("Unknown country '{}'", value)))
}
