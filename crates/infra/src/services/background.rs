//! Job inspection and the bodies the workers run for each job kind.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use storerec_core::{CustomerId, ProductId, RecordId, StoreId};

use super::{AppServices, ServiceResult, invalid, not_found};
use crate::jobs::{DeadLetterEntry, Job, JobId, JobKind, JobStats};

const DEAD_LETTER_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct BehaviorProfilePayload {
    customer_id: CustomerId,
}

#[derive(Debug, Deserialize)]
struct ProductViewsPayload {
    product_id: ProductId,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct TrainModelPayload {
    model_id: RecordId,
}

#[derive(Debug, Deserialize)]
struct DailyMetricsPayload {
    date: NaiveDate,
}

fn payload<T: DeserializeOwned>(job: &Job) -> ServiceResult<T> {
    serde_json::from_value(job.payload.clone())
        .map_err(|e| invalid(format!("invalid {} payload: {e}", job.kind)))
}

impl AppServices {
    pub fn job_stats(&self, store_id: StoreId) -> ServiceResult<JobStats> {
        Ok(self.jobs.stats(store_id)?)
    }

    pub fn get_job(&self, store_id: StoreId, id: JobId) -> ServiceResult<Job> {
        self.jobs.get(store_id, id)?.ok_or_else(|| not_found("job"))
    }

    pub fn list_dead_letters(&self, store_id: StoreId) -> ServiceResult<Vec<DeadLetterEntry>> {
        Ok(self.jobs.list_dead_letters(store_id, DEAD_LETTER_LIMIT)?)
    }

    pub fn retry_dead_letter(&self, store_id: StoreId, id: JobId) -> ServiceResult<Job> {
        Ok(self.jobs.retry_dead_letter(store_id, id)?)
    }

    /// Run the work a job stands for.
    pub fn run_job(&self, job: &Job) -> ServiceResult<()> {
        let store_id = job.store_id;
        match job.kind {
            JobKind::BehaviorProfile => {
                let p: BehaviorProfilePayload = payload(job)?;
                self.refresh_behavior_profile(store_id, p.customer_id)?;
            }
            JobKind::ProductViews => {
                let p: ProductViewsPayload = payload(job)?;
                self.refresh_product_views(store_id, p.product_id, p.date)?;
            }
            JobKind::ProcessEvents => {
                self.process_pending_events(store_id)?;
            }
            JobKind::Trending => {
                self.refresh_trending(store_id)?;
            }
            JobKind::SimilarProducts => {
                self.precompute_similar_products(store_id)?;
            }
            JobKind::TrainModel => {
                let p: TrainModelPayload = payload(job)?;
                self.run_training(store_id, p.model_id)?;
            }
            JobKind::DailyMetrics => {
                let p: DailyMetricsPayload = payload(job)?;
                self.compute_daily_metrics(store_id, p.date)?;
            }
            JobKind::CleanupInteractions => {
                self.cleanup_interactions(store_id)?;
            }
            JobKind::CleanupRecommendations => {
                self.cleanup_recommendations(store_id)?;
            }
        }
        debug!(store = %store_id, job = %job.id, kind = %job.kind, "job body finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::jobs::{JobStatus, scheduled_payload};
    use crate::services::ServiceError;
    use crate::services::test_support::{drain_jobs, services, store};
    use storerec_core::DomainError;
    use storerec_tracking::{InteractionContext, NewInteraction};

    #[test]
    fn interactions_queue_profile_and_view_jobs() {
        let services = Arc::new(services());
        let store = store(&services);
        services
            .create_product(
                store.id,
                storerec_catalog::NewProduct {
                    store_product_id: "sku-1".to_string(),
                    title: "Boot".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        services
            .record_interaction(
                store.id,
                NewInteraction {
                    interaction_type: "view".to_string(),
                    user_id: Some("u-1".to_string()),
                    session_id: None,
                    product_id: Some("sku-1".to_string()),
                    recommendation_id: None,
                    value_cents: None,
                    context: InteractionContext::default(),
                    metadata: None,
                },
            )
            .unwrap();
        assert_eq!(services.job_stats(store.id).unwrap().pending, 2);

        drain_jobs(&services, store.id);
        let stats = services.job_stats(store.id).unwrap();
        assert_eq!((stats.pending, stats.completed), (0, 2));
        assert_eq!(services.list_behavior_profiles(store.id).unwrap().len(), 1);
        assert_eq!(services.list_product_views(store.id, None, None).unwrap().len(), 1);
    }

    #[test]
    fn every_scheduled_kind_runs_on_an_empty_store() {
        let services = services();
        let store = store(&services);
        for kind in [
            JobKind::ProcessEvents,
            JobKind::Trending,
            JobKind::SimilarProducts,
            JobKind::DailyMetrics,
            JobKind::CleanupInteractions,
            JobKind::CleanupRecommendations,
        ] {
            let job = Job::new(store.id, kind, scheduled_payload(kind));
            services.run_job(&job).unwrap();
        }
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let services = services();
        let store = store(&services);
        let job = Job::new(store.id, JobKind::BehaviorProfile, json!({ "customer": 1 }));
        let err = services.run_job(&job).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn jobs_of_another_store_are_not_found() {
        let services = services();
        let (a, b) = (store(&services), store(&services));
        let id = services.enqueue(a.id, JobKind::Trending, json!({})).unwrap();
        assert_eq!(services.get_job(a.id, id).unwrap().status, JobStatus::Pending);
        assert!(services.get_job(b.id, id).is_err());
    }
}
