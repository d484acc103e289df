//! Bounded admission for per-customer billing tasks

use std::sync::{Arc, OnceLock};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::domain::{DomainError, DomainResult};

static SHARED_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// Fixed number of concurrently running billing tasks.
///
/// Cloning shares the same permits. The pool caps fan-out so a page of
/// customers cannot exhaust the database connection pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Process-wide pool. Created on first call; later calls return the same
    /// pool and ignore `size`.
    pub fn shared(size: usize) -> Self {
        SHARED_POOL
            .get_or_init(|| {
                info!(size, "Billing worker pool created");
                Self::new(size)
            })
            .clone()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> DomainResult<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DomainError::Storage("Billing worker pool is closed".to_string()))
    }

    pub fn same_pool(&self, other: &WorkerPool) -> bool {
        Arc::ptr_eq(&self.permits, &other.permits)
    }
}
