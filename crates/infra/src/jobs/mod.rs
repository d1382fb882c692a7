//! Background jobs.
//!
//! Jobs are store-scoped and carry a JSON payload. A failed attempt is retried
//! with exponential backoff until the policy runs out, then the job moves to
//! the dead-letter queue where it can be inspected and re-queued.
//!
//! `JobExecutor` polls a `JobStore` on its own thread and routes each job to a
//! handler by kind; `Scheduler` enqueues the periodic per-store work.

pub mod executor;
pub mod scheduler;
pub mod store;
pub mod types;

pub use executor::{JobExecutor, JobExecutorConfig, JobExecutorHandle};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, StoreDirectory, scheduled_payload};
pub use store::{DEFAULT_COMPLETED_HISTORY, InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{DeadLetterEntry, FailureOutcome, Job, JobId, JobKind, JobResult, JobStatus, RetryPolicy};
