//! Application services: every store-scoped operation the HTTP layer and
//! the background workers run.
//!
//! Services are synchronous. They read and write through `Repositories`,
//! cache hot reads, and enqueue background jobs; none of them touch HTTP.

mod analytics;
mod background;
mod catalog;
mod customers;
mod guards;
mod recommendations;
mod repositories;
mod snapshot;
mod stores;
mod tracking;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use storerec_core::{DomainError, StoreId};
use storerec_engine::EngineError;

use crate::cache::{Cache, InMemoryCache};
use crate::config::ServiceSettings;
use crate::jobs::{InMemoryJobStore, Job, JobId, JobKind, JobStore, JobStoreError, StoreDirectory};
use crate::read_model::StoreError;

use guards::WriteGuards;

pub use analytics::DashboardQuery;
pub use catalog::BulkProducts;
pub use recommendations::{
    BatchGenerateResult, GenerateRequest, Prediction, PredictionQuery, RecommendedProduct, ShopperResponse, TrainingTicket,
};
pub use repositories::{RecordRepo, Repo, Repositories, document_collections};
pub use stores::StoreKeys;
pub use tracking::{Assignment, BatchEventsResult, BulkInteractionsResult, ProfileRecommendation, SessionEnded};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Jobs(#[from] JobStoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub(crate) fn not_found(what: &str) -> ServiceError {
    ServiceError::Domain(DomainError::not_found(what))
}

pub(crate) fn invalid(msg: impl Into<String>) -> ServiceError {
    ServiceError::Domain(DomainError::validation(msg))
}

/// Shared service state. Cheap to clone behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub repos: Repositories,
    pub cache: Arc<dyn Cache>,
    pub jobs: Arc<dyn JobStore>,
    pub settings: ServiceSettings,
    guards: Arc<WriteGuards>,
}

impl AppServices {
    pub fn new(repos: Repositories, cache: Arc<dyn Cache>, jobs: Arc<dyn JobStore>, settings: ServiceSettings) -> Self {
        Self {
            repos,
            cache,
            jobs,
            settings,
            guards: Arc::new(WriteGuards::new()),
        }
    }

    /// Everything in process memory.
    pub fn in_memory(settings: ServiceSettings) -> Self {
        Self::new(
            Repositories::in_memory(),
            Arc::new(InMemoryCache::new()),
            InMemoryJobStore::arc(),
            settings,
        )
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Queue background work for a store.
    pub fn enqueue(&self, store_id: StoreId, kind: JobKind, payload: Value) -> ServiceResult<JobId> {
        Ok(self.jobs.enqueue(Job::new(store_id, kind, payload))?)
    }

    /// Fire-and-forget enqueue for follow-up work of a request.
    pub(crate) fn enqueue_logged(&self, store_id: StoreId, kind: JobKind, payload: Value) {
        if let Err(e) = self.enqueue(store_id, kind, payload) {
            warn!(store = %store_id, kind = %kind, error = %e, "failed to enqueue background job");
        }
    }
}

impl StoreDirectory for AppServices {
    fn active_store_ids(&self) -> Result<Vec<StoreId>, String> {
        self.repos
            .stores
            .scan_all()
            .map(|stores| stores.into_iter().filter(|s| s.is_active).map(|s| s.id).collect())
            .map_err(|e| e.to_string())
    }
}
