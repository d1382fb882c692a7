//! Runs queued jobs on a dedicated thread.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use storerec_core::StoreId;

use super::store::JobStore;
use super::types::{FailureOutcome, Job, JobResult};

type Handler = Box<dyn Fn(&Job) -> JobResult + Send + Sync>;

#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    pub name: String,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Restrict claiming to one store.
    pub store_id: Option<StoreId>,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            name: "job-executor".to_string(),
            poll_interval: Duration::from_millis(100),
            store_id: None,
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }
}

/// Owns the executor thread.
#[derive(Debug)]
pub struct JobExecutorHandle {
    stop: mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl JobExecutorHandle {
    /// Stop polling and wait for the job in flight.
    pub fn shutdown(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            error!("job executor thread panicked");
        }
    }
}

/// Routes jobs to handlers by kind name.
///
/// A handler registered under an exact name (`analytics.daily_metrics`) wins
/// over an area pattern (`analytics.*`), which wins over `*`.
pub struct JobExecutor<S: JobStore> {
    jobs: S,
    handlers: HashMap<String, Handler>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(jobs: S) -> Self {
        Self {
            jobs,
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler<F>(&mut self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> JobResult + Send + Sync + 'static,
    {
        self.handlers.insert(pattern.into(), Box::new(handler));
    }

    fn handler_for(&self, job: &Job) -> Option<&Handler> {
        let name = job.kind.type_name();
        let area = name.split_once('.').map(|(area, _)| format!("{area}.*"));
        self.handlers
            .get(name)
            .or_else(|| area.and_then(|a| self.handlers.get(&a)))
            .or_else(|| self.handlers.get("*"))
    }

    /// Run one claimed job and persist the outcome. `Err` carries the
    /// failure message after it has been recorded.
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let result = match self.handler_for(job) {
            Some(handler) => handler(job),
            None => JobResult::Failure(format!("no handler for {}", job.kind)),
        };

        let now = Utc::now();
        let outcome = match result {
            JobResult::Success => {
                job.complete(now);
                debug!(job = %job.id, kind = %job.kind, attempts = job.attempts, "job completed");
                Ok(())
            }
            JobResult::Failure(message) => {
                match job.fail(message.clone(), now) {
                    FailureOutcome::RetryAt(at) => {
                        warn!(job = %job.id, kind = %job.kind, attempt = job.attempts, retry_at = %at, error = %message, "job failed, will retry");
                    }
                    FailureOutcome::DeadLettered => {
                        error!(job = %job.id, kind = %job.kind, attempts = job.attempts, error = %message, "job dead-lettered");
                    }
                }
                Err(message)
            }
        };

        if let Err(e) = self.jobs.save(job) {
            error!(job = %job.id, error = %e, "failed to persist job outcome");
            return Err(e.to_string());
        }
        outcome
    }

    pub fn spawn(self, config: JobExecutorConfig) -> std::io::Result<JobExecutorHandle>
    where
        S: Send,
    {
        let (stop, stopped) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || self.run(&config, &stopped))?;
        Ok(JobExecutorHandle { stop, thread })
    }

    fn run(&self, config: &JobExecutorConfig, stopped: &mpsc::Receiver<()>) {
        info!(executor = %config.name, "job executor started");
        loop {
            let idle = match self.jobs.claim_next(config.store_id) {
                Ok(Some(mut job)) => {
                    let _ = self.execute_one(&mut job);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    error!(executor = %config.name, error = %e, "failed to claim job");
                    true
                }
            };

            let wait = if idle { config.poll_interval } else { Duration::ZERO };
            match stopped.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(executor = %config.name, "job executor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::{JobKind, JobStatus, RetryPolicy};

    fn queued(jobs: &InMemoryJobStore, shop: StoreId, kind: JobKind, policy: RetryPolicy) -> Job {
        jobs.enqueue(Job::new(shop, kind, serde_json::json!({})).with_retry_policy(policy))
            .unwrap();
        jobs.claim_next(Some(shop)).unwrap().unwrap()
    }

    #[test]
    fn successful_jobs_complete() {
        let jobs = InMemoryJobStore::arc();
        let shop = StoreId::new();
        let mut executor = JobExecutor::new(jobs.clone());
        executor.register_handler("recommendations.trending", |_: &Job| JobResult::Success);

        let mut job = queued(&jobs, shop, JobKind::Trending, RetryPolicy::default());
        assert!(executor.execute_one(&mut job).is_ok());
        assert_eq!(jobs.get(shop, job.id).unwrap().unwrap().status, JobStatus::Completed);
        assert_eq!(jobs.stats(shop).unwrap().completed, 1);
    }

    #[test]
    fn exhausted_failures_land_in_the_dead_letter_queue() {
        let jobs = InMemoryJobStore::arc();
        let shop = StoreId::new();
        let mut executor = JobExecutor::new(jobs.clone());
        executor.register_handler("*", |_: &Job| JobResult::Failure("upstream down".to_string()));

        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let mut job = queued(&jobs, shop, JobKind::DailyMetrics, policy);
        assert_eq!(executor.execute_one(&mut job), Err("upstream down".to_string()));
        assert_eq!(jobs.stats(shop).unwrap().retrying, 1);

        let mut job = jobs.claim_next(Some(shop)).unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        assert!(executor.execute_one(&mut job).is_err());

        let dead = jobs.list_dead_letters(shop, 10).unwrap();
        assert_eq!((dead.len(), dead[0].reason.as_str()), (1, "upstream down"));
    }

    #[test]
    fn exact_beats_area_beats_wildcard() {
        let jobs = InMemoryJobStore::arc();
        let shop = StoreId::new();
        let mut executor = JobExecutor::new(jobs.clone());
        executor.register_handler("*", |_: &Job| JobResult::Failure("wildcard".to_string()));
        executor.register_handler("maintenance.*", |_: &Job| JobResult::Failure("area".to_string()));
        executor.register_handler("maintenance.cleanup_interactions", |_: &Job| JobResult::Success);

        let no_retry = RetryPolicy::no_retry();
        let mut job = queued(&jobs, shop, JobKind::CleanupInteractions, no_retry.clone());
        assert!(executor.execute_one(&mut job).is_ok());
        let mut job = queued(&jobs, shop, JobKind::CleanupRecommendations, no_retry.clone());
        assert_eq!(executor.execute_one(&mut job), Err("area".to_string()));
        let mut job = queued(&jobs, shop, JobKind::ProcessEvents, no_retry);
        assert_eq!(executor.execute_one(&mut job), Err("wildcard".to_string()));
    }

    #[test]
    fn unrouted_jobs_fail() {
        let jobs = InMemoryJobStore::arc();
        let shop = StoreId::new();
        let executor = JobExecutor::new(jobs.clone());
        let mut job = queued(&jobs, shop, JobKind::TrainModel, RetryPolicy::no_retry());
        let err = executor.execute_one(&mut job).unwrap_err();
        assert!(err.contains("recommendations.train_model"), "{err}");
    }

    #[test]
    fn spawned_executor_drains_the_queue() {
        let jobs = InMemoryJobStore::arc();
        let shop = StoreId::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut executor = JobExecutor::new(jobs.clone());
        let counter = runs.clone();
        executor.register_handler("*", move |_: &Job| {
            counter.fetch_add(1, Ordering::SeqCst);
            JobResult::Success
        });
        for _ in 0..3 {
            jobs.enqueue(Job::new(shop, JobKind::Trending, serde_json::json!({}))).unwrap();
        }

        let handle = executor
            .spawn(JobExecutorConfig::default().with_store(shop).with_poll_interval(Duration::from_millis(5)))
            .unwrap();
        for _ in 0..200 {
            if jobs.stats(shop).unwrap().completed == 3 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
