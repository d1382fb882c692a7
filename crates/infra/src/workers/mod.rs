//! Background workers: the job executor and the periodic scheduler, wired to
//! the application services.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::WorkerSettings;
use crate::jobs::{
    Job, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobKind, JobResult, JobStore, Scheduler,
    SchedulerConfig, SchedulerHandle,
};
use crate::services::{AppServices, ServiceError};

/// Executor with one handler per job kind, each running the job body.
pub fn executor(services: Arc<AppServices>) -> JobExecutor<Arc<dyn JobStore>> {
    let mut executor = JobExecutor::new(services.jobs.clone());
    for kind in JobKind::ALL {
        let services = services.clone();
        executor.register_handler(kind.type_name(), move |job: &Job| run(&services, job));
    }
    executor
}

fn run(services: &AppServices, job: &Job) -> JobResult {
    match services.run_job(job) {
        Ok(()) => JobResult::Success,
        Err(e) => {
            if matches!(e, ServiceError::Domain(_)) {
                warn!(job = %job.id, kind = %job.kind, error = %e, "job rejected");
            }
            JobResult::Failure(e.to_string())
        }
    }
}

/// Handle to stop the executor and scheduler together.
#[derive(Debug)]
pub struct WorkerHandle {
    executor: JobExecutorHandle,
    scheduler: SchedulerHandle,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for both threads to stop.
    pub fn shutdown(self) {
        self.scheduler.shutdown();
        self.executor.shutdown();
        info!("background workers stopped");
    }
}

/// Start the workers; `None` when disabled by configuration.
pub fn start(services: Arc<AppServices>, settings: &WorkerSettings) -> std::io::Result<Option<WorkerHandle>> {
    if !settings.enabled {
        info!("background workers disabled");
        return Ok(None);
    }

    let jobs = services.jobs.clone();
    let executor = executor(services.clone()).spawn(
        JobExecutorConfig::default()
            .with_name("storerec-jobs")
            .with_poll_interval(settings.poll_interval),
    )?;
    let scheduler = Scheduler::spawn(
        SchedulerConfig {
            trending_interval: settings.trending_interval,
            maintenance_interval: settings.maintenance_interval,
            event_processing_interval: settings.event_processing_interval,
            ..SchedulerConfig::default()
        },
        services,
        jobs,
    )?;

    info!(
        trending_secs = settings.trending_interval.as_secs(),
        maintenance_secs = settings.maintenance_interval.as_secs(),
        "background workers started"
    );
    Ok(Some(WorkerHandle { executor, scheduler }))
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::config::ServiceSettings;
    use storerec_tenancy::NewStore;

    #[test]
    fn disabled_workers_do_not_start() {
        let services = Arc::new(AppServices::in_memory(ServiceSettings::default()));
        let settings = WorkerSettings {
            enabled: false,
            ..WorkerSettings::default()
        };
        assert!(start(services, &settings).unwrap().is_none());
    }

    #[test]
    fn startup_run_processes_scheduled_jobs() {
        let services = Arc::new(AppServices::in_memory(ServiceSettings::default()));
        let store = services
            .provision_store(NewStore {
                name: "Workers".to_string(),
                domain: "workers.example.com".to_string(),
                platform: Default::default(),
                config: None,
            })
            .unwrap();
        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(5),
            ..WorkerSettings::default()
        };
        let handle = start(services.clone(), &settings).unwrap().unwrap();

        let mut completed = 0;
        for _ in 0..400 {
            completed = services.job_stats(store.id).unwrap().completed;
            if completed >= 5 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();
        assert!(completed >= 5, "only {completed} scheduled jobs completed");
    }
}
