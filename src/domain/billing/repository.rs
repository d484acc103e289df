//! Invoice repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Invoice, InvoiceStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Whether a non-VOID invoice of the customer intersects `[start, end)`
    async fn exists_active_overlapping(
        &self,
        customer_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Persist the invoice and its lines atomically. The overlap guard is
    /// re-checked inside the write; a hit yields `DomainError::Conflict`.
    async fn create(&self, invoice: Invoice) -> DomainResult<Invoice>;

    /// Invoice with lines ordered by index
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Invoice>>;

    async fn find_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Invoice>>;

    /// Set the status to `to` only while it is still `from`. A concurrent
    /// change yields `DomainError::Conflict`, an unknown id `NotFound`.
    async fn update_status(&self, id: Uuid, from: InvoiceStatus, to: InvoiceStatus) -> DomainResult<()>;
}
