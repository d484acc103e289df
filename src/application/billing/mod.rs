//! Monthly batch billing: orchestrator, worker pool and scheduler

mod job;
mod scheduler;
mod worker_pool;

pub use job::{BillingJob, BillingJobConfig, CustomerOutcome, JobSummary};
pub use scheduler::MonthlyScheduler;
pub use worker_pool::WorkerPool;
