//! Where jobs wait, run and die.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;

use storerec_core::StoreId;

use super::types::{DeadLetterEntry, Job, JobId, JobKind, JobStatus};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// The job exists but belongs to another store.
    #[error("job belongs to another store")]
    StoreIsolation,
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job storage error: {0}")]
    Storage(String),
}

/// Per-store job counts; dead letters included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
}

/// Queue plus dead-letter queue, partitioned by store on every read.
pub trait JobStore: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Look a job up in the queue, then in the dead-letter queue.
    fn get(&self, store_id: StoreId, id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Persist a job's new state. A dead-lettered job moves to the
    /// dead-letter queue.
    fn save(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Mark the oldest due job running and hand it out.
    fn claim_next(&self, store_id: Option<StoreId>) -> Result<Option<Job>, JobStoreError>;

    fn list_by_kind(&self, store_id: StoreId, kind: JobKind, limit: usize) -> Result<Vec<Job>, JobStoreError>;

    /// Newest first.
    fn list_dead_letters(&self, store_id: StoreId, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    fn retry_dead_letter(&self, store_id: StoreId, id: JobId) -> Result<Job, JobStoreError>;

    fn stats(&self, store_id: StoreId) -> Result<JobStats, JobStoreError>;
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, store_id: StoreId, id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(store_id, id)
    }

    fn save(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).save(job)
    }

    fn claim_next(&self, store_id: Option<StoreId>) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next(store_id)
    }

    fn list_by_kind(&self, store_id: StoreId, kind: JobKind, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        (**self).list_by_kind(store_id, kind, limit)
    }

    fn list_dead_letters(&self, store_id: StoreId, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(store_id, limit)
    }

    fn retry_dead_letter(&self, store_id: StoreId, id: JobId) -> Result<Job, JobStoreError> {
        (**self).retry_dead_letter(store_id, id)
    }

    fn stats(&self, store_id: StoreId) -> Result<JobStats, JobStoreError> {
        (**self).stats(store_id)
    }
}

/// Completed jobs kept for lookup before they are evicted.
pub const DEFAULT_COMPLETED_HISTORY: usize = 1024;

#[derive(Debug, Default)]
struct Queues {
    // Keyed by v7 ids, so iteration follows enqueue order.
    live: BTreeMap<JobId, Job>,
    dead: BTreeMap<JobId, DeadLetterEntry>,
    // Completed ids, oldest first.
    finished: VecDeque<JobId>,
    completed: HashMap<StoreId, usize>,
}

/// Process-local job store.
///
/// Completed jobs stay readable until `completed_history` newer ones have
/// finished; the per-store completed count survives eviction.
#[derive(Debug)]
pub struct InMemoryJobStore {
    queues: RwLock<Queues>,
    completed_history: usize,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self {
            queues: RwLock::default(),
            completed_history: DEFAULT_COMPLETED_HISTORY,
        }
    }
}

fn poisoned<T>(_: PoisonError<T>) -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".to_string())
}

fn owned_by(job: &Job, store_id: StoreId) -> Result<(), JobStoreError> {
    if job.store_id == store_id {
        Ok(())
    } else {
        Err(JobStoreError::StoreIsolation)
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_completed_history(mut self, jobs: usize) -> Self {
        self.completed_history = jobs;
        self
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut q = self.queues.write().map_err(poisoned)?;
        if q.live.contains_key(&job.id) || q.dead.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        q.live.insert(id, job);
        Ok(id)
    }

    fn get(&self, store_id: StoreId, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let q = self.queues.read().map_err(poisoned)?;
        let job = q.live.get(&id).or_else(|| q.dead.get(&id).map(|e| &e.job));
        match job {
            Some(job) => owned_by(job, store_id).map(|()| Some(job.clone())),
            None => Ok(None),
        }
    }

    fn save(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut q = self.queues.write().map_err(poisoned)?;
        let Some(previous) = q.live.get(&job.id) else {
            return Err(JobStoreError::NotFound(job.id));
        };
        let newly_completed = job.status == JobStatus::Completed && previous.status != JobStatus::Completed;

        match &job.status {
            JobStatus::DeadLettered { error } => {
                q.live.remove(&job.id);
                let entry = DeadLetterEntry {
                    job: job.clone(),
                    reason: error.clone(),
                    dead_lettered_at: job.finished_at.unwrap_or_else(Utc::now),
                };
                q.dead.insert(job.id, entry);
            }
            _ => {
                q.live.insert(job.id, job.clone());
            }
        }

        if newly_completed {
            *q.completed.entry(job.store_id).or_default() += 1;
            q.finished.push_back(job.id);
            while q.finished.len() > self.completed_history {
                if let Some(evicted) = q.finished.pop_front() {
                    q.live.remove(&evicted);
                }
            }
        }
        Ok(())
    }

    fn claim_next(&self, store_id: Option<StoreId>) -> Result<Option<Job>, JobStoreError> {
        let now = Utc::now();
        let mut q = self.queues.write().map_err(poisoned)?;
        let claimed = q
            .live
            .values_mut()
            .find(|j| j.is_due(now) && store_id.is_none_or(|s| j.store_id == s))
            .map(|job| {
                job.start_attempt(now);
                job.clone()
            });
        Ok(claimed)
    }

    fn list_by_kind(&self, store_id: StoreId, kind: JobKind, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let q = self.queues.read().map_err(poisoned)?;
        Ok(q.live
            .values()
            .filter(|j| j.store_id == store_id && j.kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }

    fn list_dead_letters(&self, store_id: StoreId, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let q = self.queues.read().map_err(poisoned)?;
        let mut entries: Vec<DeadLetterEntry> = q.dead.values().filter(|e| e.job.store_id == store_id).cloned().collect();
        entries.sort_by(|a, b| b.dead_lettered_at.cmp(&a.dead_lettered_at));
        entries.truncate(limit);
        Ok(entries)
    }

    fn retry_dead_letter(&self, store_id: StoreId, id: JobId) -> Result<Job, JobStoreError> {
        let mut q = self.queues.write().map_err(poisoned)?;
        let entry = q.dead.get(&id).ok_or(JobStoreError::NotFound(id))?;
        owned_by(&entry.job, store_id)?;

        let Some(entry) = q.dead.remove(&id) else {
            return Err(JobStoreError::NotFound(id));
        };
        let mut job = entry.job;
        job.requeue(Utc::now());
        q.live.insert(id, job.clone());
        Ok(job)
    }

    fn stats(&self, store_id: StoreId) -> Result<JobStats, JobStoreError> {
        let q = self.queues.read().map_err(poisoned)?;
        let mut stats = JobStats {
            completed: q.completed.get(&store_id).copied().unwrap_or(0),
            dead_lettered: q.dead.values().filter(|e| e.job.store_id == store_id).count(),
            ..JobStats::default()
        };
        for job in q.live.values().filter(|j| j.store_id == store_id) {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => {}
                JobStatus::Retrying { .. } => stats.retrying += 1,
                JobStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::RetryPolicy;

    fn job(store_id: StoreId) -> Job {
        Job::new(store_id, JobKind::Trending, serde_json::json!({}))
    }

    #[test]
    fn claims_oldest_due_job_once() {
        let jobs = InMemoryJobStore::new();
        let shop = StoreId::new();
        let first = jobs.enqueue(job(shop)).unwrap();
        let second = jobs.enqueue(job(shop)).unwrap();

        let claimed = jobs.claim_next(Some(shop)).unwrap().unwrap();
        assert_eq!((claimed.id, claimed.attempts), (first, 1));
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(jobs.claim_next(None).unwrap().unwrap().id, second);
        assert!(jobs.claim_next(Some(shop)).unwrap().is_none());
    }

    #[test]
    fn other_stores_cannot_see_or_claim() {
        let jobs = InMemoryJobStore::new();
        let (a, b) = (StoreId::new(), StoreId::new());
        let id = jobs.enqueue(job(a)).unwrap();

        assert!(matches!(jobs.get(b, id), Err(JobStoreError::StoreIsolation)));
        assert!(jobs.claim_next(Some(b)).unwrap().is_none());
        assert_eq!(jobs.stats(b).unwrap(), JobStats::default());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let jobs = InMemoryJobStore::new();
        let j = job(StoreId::new());
        jobs.enqueue(j.clone()).unwrap();
        assert!(matches!(jobs.enqueue(j), Err(JobStoreError::AlreadyExists(_))));
    }

    #[test]
    fn dead_letters_can_be_inspected_and_retried() {
        let jobs = InMemoryJobStore::new();
        let shop = StoreId::new();
        let id = jobs.enqueue(job(shop).with_retry_policy(RetryPolicy::no_retry())).unwrap();

        let mut claimed = jobs.claim_next(Some(shop)).unwrap().unwrap();
        claimed.fail("bad payload", Utc::now());
        jobs.save(&claimed).unwrap();

        let stats = jobs.stats(shop).unwrap();
        assert_eq!((stats.running, stats.dead_lettered), (0, 1));
        let seen = jobs.get(shop, id).unwrap().unwrap();
        assert!(matches!(seen.status, JobStatus::DeadLettered { .. }));
        let dead = jobs.list_dead_letters(shop, 10).unwrap();
        assert_eq!(dead[0].reason, "bad payload");

        assert!(matches!(
            jobs.retry_dead_letter(StoreId::new(), id),
            Err(JobStoreError::StoreIsolation)
        ));
        let retried = jobs.retry_dead_letter(shop, id).unwrap();
        assert_eq!((retried.status, retried.attempts), (JobStatus::Pending, 0));
        assert!(jobs.list_dead_letters(shop, 10).unwrap().is_empty());
        assert_eq!(jobs.stats(shop).unwrap().pending, 1);
    }

    #[test]
    fn retrying_jobs_wait_for_their_backoff() {
        let jobs = InMemoryJobStore::new();
        let shop = StoreId::new();
        jobs.enqueue(job(shop)).unwrap();

        let mut claimed = jobs.claim_next(Some(shop)).unwrap().unwrap();
        claimed.fail("flaky", Utc::now());
        jobs.save(&claimed).unwrap();

        assert_eq!(jobs.stats(shop).unwrap().retrying, 1);
        assert!(jobs.claim_next(Some(shop)).unwrap().is_none());
    }

    #[test]
    fn completed_jobs_are_evicted_but_still_counted() {
        let jobs = InMemoryJobStore::new().with_completed_history(3);
        let shop = StoreId::new();
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(jobs.enqueue(job(shop)).unwrap());
            let mut claimed = jobs.claim_next(Some(shop)).unwrap().unwrap();
            claimed.complete(Utc::now());
            jobs.save(&claimed).unwrap();
        }

        assert_eq!(jobs.queues.read().unwrap().live.len(), 3);
        assert_eq!(jobs.stats(shop).unwrap().completed, 10);
        assert!(jobs.get(shop, ids[0]).unwrap().is_none());
        let newest = jobs.get(shop, ids[9]).unwrap().unwrap();
        assert_eq!(newest.status, JobStatus::Completed);
        assert!(matches!(jobs.save(&newest), Ok(())));
        assert_eq!(jobs.stats(shop).unwrap().completed, 10);
    }
}
