//! Periodic per-store job scheduling.
//!
//! The scheduler does no work itself: at each task's cadence it enqueues one
//! job per active store, and the executor picks them up.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use storerec_core::StoreId;

use super::store::JobStore;
use super::types::{Job, JobKind};

/// Source of the stores to schedule work for.
pub trait StoreDirectory: Send + Sync + 'static {
    fn active_store_ids(&self) -> Result<Vec<StoreId>, String>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub trending_interval: Duration,
    pub maintenance_interval: Duration,
    pub event_processing_interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trending_interval: Duration::from_secs(3600),
            maintenance_interval: Duration::from_secs(86_400),
            event_processing_interval: Duration::from_secs(60),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug)]
struct Task {
    name: &'static str,
    interval: Duration,
    kinds: &'static [JobKind],
    next_tick: Instant,
    pending: bool,
}

impl Task {
    fn new(name: &'static str, interval: Duration, kinds: &'static [JobKind]) -> Self {
        Self {
            name,
            interval,
            kinds,
            next_tick: Instant::now() + interval,
            // run once on startup
            pending: true,
        }
    }

    fn tick(&mut self, now: Instant) {
        if now >= self.next_tick {
            self.pending = true;
            // Keep a stable cadence even if we were delayed.
            while self.next_tick <= now {
                self.next_tick += self.interval;
            }
        }
    }
}

/// Payload for a scheduled job of `kind`.
pub fn scheduled_payload(kind: JobKind) -> Value {
    match kind {
        JobKind::DailyMetrics => {
            let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
            json!({ "date": yesterday })
        }
        _ => json!({}),
    }
}

/// Handle for the running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the scheduler thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub struct Scheduler;

impl Scheduler {
    const TRENDING: &'static [JobKind] = &[JobKind::Trending];
    const EVENTS: &'static [JobKind] = &[JobKind::ProcessEvents];
    const MAINTENANCE: &'static [JobKind] = &[
        JobKind::SimilarProducts,
        JobKind::DailyMetrics,
        JobKind::CleanupInteractions,
        JobKind::CleanupRecommendations,
    ];

    pub fn spawn<D, S>(config: SchedulerConfig, directory: Arc<D>, jobs: S) -> std::io::Result<SchedulerHandle>
    where
        D: StoreDirectory + ?Sized,
        S: JobStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("job-scheduler".to_string())
            .spawn(move || scheduler_loop(config, shutdown_rx, directory, jobs))?;

        Ok(SchedulerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn scheduler_loop<D, S>(config: SchedulerConfig, shutdown_rx: mpsc::Receiver<()>, directory: Arc<D>, jobs: S)
where
    D: StoreDirectory + ?Sized,
    S: JobStore,
{
    info!("job scheduler started");

    let mut tasks = [
        Task::new("trending", config.trending_interval, Scheduler::TRENDING),
        Task::new("events", config.event_processing_interval, Scheduler::EVENTS),
        Task::new("maintenance", config.maintenance_interval, Scheduler::MAINTENANCE),
    ];
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        for task in tasks.iter_mut() {
            task.tick(now);
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !tasks.iter().any(|t| t.pending) {
            let next = tasks.iter().map(|t| t.next_tick).min().unwrap_or(now);
            let sleep_for = next
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        let stores = match directory.active_store_ids() {
            Ok(stores) => stores,
            Err(e) => {
                warn!(error = %e, "failed to list stores for scheduling");
                failures += 1;
                if failures <= config.max_retries {
                    backoff_until = Some(Instant::now() + backoff(config.base_backoff, failures));
                } else {
                    failures = 0;
                    for task in tasks.iter_mut() {
                        task.pending = false;
                    }
                }
                continue;
            }
        };
        failures = 0;

        for task in tasks.iter_mut().filter(|t| t.pending) {
            task.pending = false;
            for &store_id in &stores {
                for &kind in task.kinds {
                    let job = Job::new(store_id, kind, scheduled_payload(kind));
                    match jobs.enqueue(job) {
                        Ok(job_id) => debug!(task = task.name, store = %store_id, %job_id, kind = %kind, "scheduled job"),
                        Err(e) => warn!(task = task.name, store = %store_id, kind = %kind, error = %e, "failed to enqueue scheduled job"),
                    }
                }
            }
        }
    }

    info!("job scheduler stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;

    struct Fixed(Vec<StoreId>);

    impl StoreDirectory for Fixed {
        fn active_store_ids(&self) -> Result<Vec<StoreId>, String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn runs_every_task_once_on_startup() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let (a, b) = (StoreId::new(), StoreId::new());
        let handle = Scheduler::spawn(SchedulerConfig::default(), Arc::new(Fixed(vec![a, b])), jobs.clone()).unwrap();

        let expected = Scheduler::TRENDING.len() + Scheduler::EVENTS.len() + Scheduler::MAINTENANCE.len();
        for _ in 0..200 {
            if jobs.stats(b).unwrap().pending == expected {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();

        for store in [a, b] {
            assert_eq!(jobs.stats(store).unwrap().pending, expected);
            assert_eq!(jobs.list_by_kind(store, JobKind::DailyMetrics, 10).unwrap().len(), 1);
        }
    }

    #[test]
    fn daily_metrics_target_yesterday() {
        let payload = scheduled_payload(JobKind::DailyMetrics);
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        assert_eq!(payload["date"], json!(yesterday));
        assert_eq!(scheduled_payload(JobKind::Trending), json!({}));
    }

    #[test]
    fn backoff_is_bounded() {
        assert_eq!(backoff(Duration::from_millis(250), 1), Duration::from_millis(250));
        assert_eq!(backoff(Duration::from_millis(250), 30), Duration::from_millis(10_000));
    }
}
