//! Jobs, their lifecycle and the retry policy.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use storerec_core::{DomainError, StoreId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Time-ordered, so ids sort in enqueue order.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("invalid job id '{s}': {e}")))
    }
}

/// Job kind for routing to handlers, named `<area>.<task>`.
///
/// Task parameters travel in the job payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// `{customer_id}`
    #[serde(rename = "tracking.behavior_profile")]
    BehaviorProfile,
    /// `{product_id, date}`
    #[serde(rename = "tracking.product_views")]
    ProductViews,
    #[serde(rename = "tracking.process_events")]
    ProcessEvents,
    #[serde(rename = "recommendations.trending")]
    Trending,
    #[serde(rename = "recommendations.similar_products")]
    SimilarProducts,
    /// `{model_id, model_type}`
    #[serde(rename = "recommendations.train_model")]
    TrainModel,
    /// `{date}`
    #[serde(rename = "analytics.daily_metrics")]
    DailyMetrics,
    #[serde(rename = "maintenance.cleanup_interactions")]
    CleanupInteractions,
    #[serde(rename = "maintenance.cleanup_recommendations")]
    CleanupRecommendations,
}

impl JobKind {
    pub const ALL: [JobKind; 9] = [
        JobKind::BehaviorProfile,
        JobKind::ProductViews,
        JobKind::ProcessEvents,
        JobKind::Trending,
        JobKind::SimilarProducts,
        JobKind::TrainModel,
        JobKind::DailyMetrics,
        JobKind::CleanupInteractions,
        JobKind::CleanupRecommendations,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            JobKind::BehaviorProfile => "tracking.behavior_profile",
            JobKind::ProductViews => "tracking.product_views",
            JobKind::ProcessEvents => "tracking.process_events",
            JobKind::Trending => "recommendations.trending",
            JobKind::SimilarProducts => "recommendations.similar_products",
            JobKind::TrainModel => "recommendations.train_model",
            JobKind::DailyMetrics => "analytics.daily_metrics",
            JobKind::CleanupInteractions => "maintenance.cleanup_interactions",
            JobKind::CleanupRecommendations => "maintenance.cleanup_recommendations",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// Last attempt failed; runs again at `run_after`.
    Retrying { error: String },
    DeadLettered { error: String },
}

impl JobStatus {
    /// Whether the executor may claim the job.
    pub fn is_runnable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Retrying { .. })
    }
}

/// Exponential backoff with a bounded, deterministic jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before the job is dead-lettered; 1 means no retry.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay the jitter may add or remove, 0..=1.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped, then spread by the jitter keyed on `seed`.
    pub fn backoff(&self, attempt: u32, seed: JobId) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let raw = self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay);
        if self.jitter <= 0.0 {
            return raw;
        }

        let mut hasher = DefaultHasher::new();
        (seed, attempt).hash(&mut hasher);
        // Map the hash onto -1..=1.
        let unit = (hasher.finish() % 2_001) as f64 / 1_000.0 - 1.0;
        let factor = 1.0 + unit * self.jitter.clamp(0.0, 1.0);
        raw.mul_f64(factor)
    }
}

/// A unit of background work for one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub store_id: StoreId,
    pub kind: JobKind,
    pub payload: Value,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far.
    pub attempts: u32,
    /// Not claimable before this instant.
    pub run_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What a failed attempt led to.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    RetryAt(DateTime<Utc>),
    DeadLettered,
}

impl Job {
    pub fn new(store_id: StoreId, kind: JobKind, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            store_id,
            kind,
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempts: 0,
            run_after: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_runnable() && self.run_after.is_none_or(|at| at <= now)
    }

    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.attempts += 1;
        self.updated_at = now;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.run_after = None;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// Record a failed attempt; schedules a retry while attempts remain.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> FailureOutcome {
        let error = error.into();
        self.updated_at = now;
        if self.attempts < self.retry_policy.max_attempts {
            let wait = self.retry_policy.backoff(self.attempts, self.id);
            let at = now + chrono::Duration::from_std(wait).unwrap_or_default();
            self.run_after = Some(at);
            self.status = JobStatus::Retrying { error };
            FailureOutcome::RetryAt(at)
        } else {
            self.run_after = None;
            self.finished_at = Some(now);
            self.status = JobStatus::DeadLettered { error };
            FailureOutcome::DeadLettered
        }
    }

    /// Put a dead-lettered job back in the queue with a fresh attempt budget.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.attempts = 0;
        self.run_after = None;
        self.finished_at = None;
        self.updated_at = now;
    }
}

/// Outcome reported by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Success,
    Failure(String),
}

/// A job that exhausted its attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter,
        }
    }

    #[test]
    fn backoff_doubles_until_the_cap() {
        let p = policy(10, 0.0);
        let seed = JobId::new();
        let waits: Vec<u128> = (1..=6).map(|a| p.backoff(a, seed).as_millis()).collect();
        assert_eq!(waits, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn jitter_is_bounded_and_repeatable() {
        let p = policy(10, 0.1);
        let seed = JobId::new();
        for attempt in 1..8 {
            let wait = p.backoff(attempt, seed);
            assert_eq!(wait, p.backoff(attempt, seed));
            let raw = policy(10, 0.0).backoff(attempt, seed).as_secs_f64();
            let ratio = wait.as_secs_f64() / raw;
            assert!((0.9 - 1e-9..=1.1 + 1e-9).contains(&ratio), "ratio {ratio}");
        }
    }

    #[test]
    fn failures_retry_then_dead_letter() {
        let now = Utc::now();
        let mut job = Job::new(StoreId::new(), JobKind::Trending, serde_json::json!({})).with_retry_policy(policy(2, 0.0));

        job.start_attempt(now);
        assert_eq!(job.fail("boom", now), FailureOutcome::RetryAt(now + chrono::Duration::milliseconds(100)));
        assert!(!job.is_due(now));
        assert!(job.is_due(now + chrono::Duration::seconds(1)));

        job.start_attempt(now);
        assert_eq!(job.fail("boom again", now), FailureOutcome::DeadLettered);
        assert_eq!(
            job.status,
            JobStatus::DeadLettered {
                error: "boom again".to_string()
            }
        );
        assert!(!job.is_due(now + chrono::Duration::days(1)));

        job.requeue(now);
        assert_eq!((job.attempts, job.is_due(now)), (0, true));
    }

    #[test]
    fn no_retry_dead_letters_on_first_failure() {
        let now = Utc::now();
        let mut job = Job::new(StoreId::new(), JobKind::DailyMetrics, serde_json::json!({}))
            .with_retry_policy(RetryPolicy::no_retry());
        job.start_attempt(now);
        assert_eq!(job.fail("bad payload", now), FailureOutcome::DeadLettered);
    }

    #[test]
    fn kinds_serialize_as_dotted_names() {
        for kind in JobKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.type_name()));
        }
    }
}
