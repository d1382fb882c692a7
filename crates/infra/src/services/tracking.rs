//! Behaviour tracking: the interaction ingestion pipeline, sessions, raw
//! events, A/B tests and the aggregates the workers maintain.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use storerec_catalog::Product;
use storerec_core::{CustomerId, DomainError, DomainResult, InteractionId, ProductId, RecordId, SessionId, StoreId};
use storerec_customers::Customer;
use storerec_tracking::{
    AbTest, BehaviorProfile, DailyProductView, DateRange, GroupBy, Interaction, InteractionAnalytics,
    InteractionEvent, InteractionFilter, InteractionType, NewAbTest, NewEvent, NewInteraction, NewSession,
    ProductPopularity, SessionAnalytics, TrackingSession, UserActivity, engagement_totals, interaction_analytics,
    popular_products, session_analytics, user_activity,
};

use super::{AppServices, RecordRepo, ServiceResult, invalid};
use crate::cache::{self, keys};
use crate::jobs::JobKind;

const PROFILE_CATEGORIES: usize = 3;
const PROFILE_RECOMMENDATIONS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct BulkInteractionsResult {
    pub interactions_created: usize,
    pub interactions_skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEventsResult {
    pub events_processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEnded {
    pub session_id: SessionId,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileRecommendation {
    pub product: Product,
    pub reason: String,
}

/// Variant assignment of one participant.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub test_id: RecordId,
    pub user_id: String,
    pub variant: Option<String>,
    pub enrolled: bool,
}

impl AppServices {
    /// Record one interaction.
    ///
    /// Resolves or creates the shopper and session, denormalises product
    /// facts, refreshes session and customer aggregates, attributes clicks
    /// and purchases to the referenced recommendation, then queues the
    /// follow-up aggregation jobs.
    pub fn record_interaction(&self, store_id: StoreId, input: NewInteraction) -> ServiceResult<Interaction> {
        let kind = input.validate()?;
        let now = self.now();

        let guard = self.guards.store(store_id);
        let customer = match input.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => Some(self.get_or_create_customer(store_id, user, now)?),
            None => None,
        };
        let customer_id = customer.as_ref().map(|c| c.id);

        let session = match input.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(key) => Some(self.get_or_start_session(store_id, key, customer_id, &input, now)?),
            None => None,
        };

        let product = match input.product_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(sku) => {
                let found = self.find_product(store_id, sku)?;
                if found.is_none() {
                    debug!(store = %store_id, product = sku, "interaction references an unsynced product");
                }
                found
            }
            None => None,
        };

        let interaction = Interaction::record(
            store_id,
            input,
            customer_id,
            session.as_ref().map(|s| s.id),
            product.as_ref(),
            now,
        )?;
        self.repos.interactions.save(store_id, &interaction)?;

        if let Some(mut session) = session.clone() {
            let session_id = session.id;
            let history = self
                .repos
                .interactions
                .find_by(store_id, "session_id", &session_id.to_string())?;
            session.refresh_metrics(&history);
            self.repos.sessions.save(store_id, &session)?;
        }
        if let Some(mut customer) = customer {
            let customer_id = customer.id;
            let history = self
                .repos
                .interactions
                .find_by(store_id, "customer_id", &customer_id.to_string())?;
            customer.refresh_engagement(engagement_totals(&history));
            self.repos.customers.save(store_id, &customer)?;
        }
        drop(guard);

        self.attribute(store_id, &interaction, kind)?;

        if let Some(customer_id) = customer_id {
            self.enqueue_logged(store_id, JobKind::BehaviorProfile, json!({ "customer_id": customer_id }));
        }
        if let Some(product_id) = interaction.product_id {
            self.enqueue_logged(
                store_id,
                JobKind::ProductViews,
                json!({ "product_id": product_id, "date": interaction.created_at.date_naive() }),
            );
        }

        self.invalidate_audience(store_id, customer_id, session.as_ref().map(|s| s.session_key.as_str()));
        Ok(interaction)
    }

    /// Callers hold the store's write guard.
    fn get_or_start_session(
        &self,
        store_id: StoreId,
        key: &str,
        customer_id: Option<CustomerId>,
        input: &NewInteraction,
        now: DateTime<Utc>,
    ) -> ServiceResult<TrackingSession> {
        let session = match self.find_session(store_id, key)? {
            Some(mut session) => {
                if let Some(customer_id) = customer_id {
                    session.adopt_customer(customer_id);
                }
                session
            }
            None => TrackingSession::start(
                store_id,
                customer_id,
                NewSession {
                    session_id: key.to_string(),
                    user_id: input.user_id.clone(),
                    landing_page: input.context.page_url.clone(),
                    user_agent: input.context.user_agent.clone(),
                    ip_address: input.context.ip_address.clone(),
                    referrer: input.context.referrer_url.clone(),
                    ..NewSession::default()
                },
                now,
            )?,
        };
        self.repos.sessions.save(store_id, &session)?;
        Ok(session)
    }

    fn attribute(&self, store_id: StoreId, interaction: &Interaction, kind: InteractionType) -> ServiceResult<()> {
        let Some(recommendation_id) = interaction.recommendation_id else {
            return Ok(());
        };
        if !matches!(kind, InteractionType::Click | InteractionType::Purchase) {
            return Ok(());
        }
        let Some(mut recommendation) = self.repos.recommendations.get(store_id, &recommendation_id)? else {
            debug!(store = %store_id, recommendation = %recommendation_id, "attribution target not found");
            return Ok(());
        };
        match kind {
            InteractionType::Click => recommendation.record_click(),
            _ => recommendation.record_purchase(),
        }
        self.repos.recommendations.save(store_id, &recommendation)?;
        if let Some(customer_id) = recommendation.customer_id {
            self.refresh_user_recommendation_profile(store_id, customer_id)?;
        }
        Ok(())
    }

    pub(crate) fn invalidate_audience(&self, store_id: StoreId, customer: Option<CustomerId>, session_key: Option<&str>) {
        if let Some(customer_id) = customer {
            cache::invalidate(
                self.cache.as_ref(),
                &keys::customer_recommendations_prefix(store_id, customer_id),
            );
        }
        if let Some(key) = session_key {
            cache::invalidate(self.cache.as_ref(), &keys::session_recommendations_prefix(store_id, key));
        }
    }

    /// Record every valid item; invalid ones are skipped.
    pub fn bulk_record_interactions(
        &self,
        store_id: StoreId,
        inputs: Vec<NewInteraction>,
    ) -> ServiceResult<BulkInteractionsResult> {
        let mut created = 0;
        let mut skipped = 0;
        for (index, input) in inputs.into_iter().enumerate() {
            match self.record_interaction(store_id, input) {
                Ok(_) => created += 1,
                Err(e) => {
                    warn!(store = %store_id, index, error = %e, "skipping invalid interaction");
                    skipped += 1;
                }
            }
        }
        info!(store = %store_id, created, skipped, "bulk interactions recorded");
        Ok(BulkInteractionsResult {
            interactions_created: created,
            interactions_skipped: skipped,
        })
    }

    pub fn list_interactions(&self, store_id: StoreId, filter: &InteractionFilter) -> ServiceResult<Vec<Interaction>> {
        Ok(filter.apply(self.repos.interactions.list(store_id)?)?)
    }

    pub fn get_interaction(&self, store_id: StoreId, id: InteractionId) -> ServiceResult<Interaction> {
        self.repos.interactions.require(store_id, &id, "interaction")
    }

    pub fn interaction_analytics(
        &self,
        store_id: StoreId,
        date_range: Option<&str>,
        interaction_type: Option<&str>,
        group_by: Option<&str>,
    ) -> ServiceResult<InteractionAnalytics> {
        let kind: Option<InteractionType> = interaction_type
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .transpose()?;
        Ok(interaction_analytics(
            &self.repos.interactions.list(store_id)?,
            self.now(),
            DateRange::parse_lenient(date_range),
            kind,
            GroupBy::parse_lenient(group_by),
        ))
    }

    pub fn popular_products(&self, store_id: StoreId, days: Option<i64>) -> ServiceResult<Vec<ProductPopularity>> {
        let products = self.repos.products.list(store_id)?;
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
        Ok(popular_products(
            &self.repos.interactions.list(store_id)?,
            &by_id,
            self.now(),
            days.unwrap_or(30).max(1),
        ))
    }

    pub fn user_activity(&self, store_id: StoreId, user_id: Option<&str>) -> ServiceResult<UserActivity> {
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| invalid("user_id parameter is required"))?;
        let customer = self
            .find_customer(store_id, user_id)?
            .ok_or_else(|| DomainError::not_found("user"))?;
        Ok(user_activity(&customer, &self.repos.interactions.list(store_id)?)?)
    }

    // Sessions

    pub fn find_session(&self, store_id: StoreId, key: &str) -> ServiceResult<Option<TrackingSession>> {
        Ok(self
            .repos
            .sessions
            .find_by(store_id, "session_key", key)?
            .into_iter()
            .next())
    }

    pub fn create_session(&self, store_id: StoreId, input: NewSession) -> ServiceResult<TrackingSession> {
        let now = self.now();
        let _guard = self.guards.store(store_id);
        if self.find_session(store_id, input.session_id.trim())?.is_some() {
            return Err(DomainError::conflict(format!("session '{}' already exists", input.session_id.trim())).into());
        }
        let customer = match input.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => Some(self.get_or_create_customer(store_id, user, now)?.id),
            None => None,
        };
        let session = TrackingSession::start(store_id, customer, input, now)?;
        self.repos.sessions.save(store_id, &session)?;
        Ok(session)
    }

    pub fn list_sessions(&self, store_id: StoreId, active_only: bool) -> ServiceResult<Vec<TrackingSession>> {
        let mut sessions: Vec<TrackingSession> = self
            .repos
            .sessions
            .list(store_id)?
            .into_iter()
            .filter(|s| !active_only || s.is_active())
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    pub fn get_session(&self, store_id: StoreId, id: SessionId) -> ServiceResult<TrackingSession> {
        self.repos.sessions.require(store_id, &id, "session")
    }

    /// Ending an ended session reports the recorded values again.
    pub fn end_session(&self, store_id: StoreId, id: SessionId) -> ServiceResult<SessionEnded> {
        let mut session = self.get_session(store_id, id)?;
        if session.is_active() {
            session.end(self.now());
            self.repos.sessions.save(store_id, &session)?;
        }
        Ok(SessionEnded {
            session_id: session.id,
            end_time: session.end_time,
            duration_seconds: session.duration_seconds,
        })
    }

    pub fn record_page_view(&self, store_id: StoreId, id: SessionId) -> ServiceResult<TrackingSession> {
        let mut session = self.get_session(store_id, id)?;
        session.increment_page_views();
        self.repos.sessions.save(store_id, &session)?;
        Ok(session)
    }

    pub fn session_analytics(&self, store_id: StoreId, days: Option<i64>) -> ServiceResult<SessionAnalytics> {
        Ok(session_analytics(
            &self.repos.sessions.list(store_id)?,
            self.now(),
            days.unwrap_or(7).max(1),
        ))
    }

    // Aggregates

    pub fn list_product_views(
        &self,
        store_id: StoreId,
        product: Option<ProductId>,
        date: Option<NaiveDate>,
    ) -> ServiceResult<Vec<DailyProductView>> {
        let mut rows: Vec<DailyProductView> = self
            .repos
            .product_views
            .list(store_id)?
            .into_iter()
            .filter(|r| product.is_none_or(|p| r.product_id == p))
            .filter(|r| date.is_none_or(|d| r.date == d))
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.total_views.cmp(&a.total_views)));
        Ok(rows)
    }

    /// Recompute one product's row for `date`.
    pub fn refresh_product_views(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        date: NaiveDate,
    ) -> ServiceResult<DailyProductView> {
        let existing = self
            .repos
            .product_views
            .list(store_id)?
            .into_iter()
            .find(|r| r.product_id == product_id && r.date == date)
            .map(|r| r.id);
        let interactions = self.repos.interactions.list(store_id)?;
        let row = DailyProductView::compute(store_id, product_id, date, &interactions, existing, self.now());
        self.repos.product_views.save(store_id, &row)?;
        Ok(row)
    }

    pub fn list_behavior_profiles(&self, store_id: StoreId) -> ServiceResult<Vec<BehaviorProfile>> {
        let mut profiles = self.repos.behavior_profiles.list(store_id)?;
        profiles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(profiles)
    }

    pub fn get_behavior_profile(&self, store_id: StoreId, id: RecordId) -> ServiceResult<BehaviorProfile> {
        self.repos.behavior_profiles.require(store_id, &id, "behavior profile")
    }

    /// Rebuild a shopper's profile from their full history.
    pub fn refresh_behavior_profile(&self, store_id: StoreId, customer_id: CustomerId) -> ServiceResult<BehaviorProfile> {
        self.get_customer(store_id, customer_id)?;
        let existing = self
            .repos
            .behavior_profiles
            .list(store_id)?
            .into_iter()
            .find(|p| p.customer_id == customer_id)
            .map(|p| p.id);

        let interactions = self.repos.interactions.list(store_id)?;
        let sessions = self.repos.sessions.list(store_id)?;
        let products = self.repos.products.list(store_id)?;
        let mine: Vec<&Interaction> = interactions.iter().filter(|i| i.customer_id == Some(customer_id)).collect();
        let my_sessions: Vec<&TrackingSession> =
            sessions.iter().filter(|s| s.customer_id == Some(customer_id)).collect();
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let profile = BehaviorProfile::compute(
            store_id,
            customer_id,
            existing,
            &mine,
            &my_sessions,
            &by_id,
            self.now(),
        );
        self.repos.behavior_profiles.save(store_id, &profile)?;
        Ok(profile)
    }

    /// Active products in the profile's strongest categories.
    pub fn profile_recommendations(&self, store_id: StoreId, id: RecordId) -> ServiceResult<Vec<ProfileRecommendation>> {
        let profile = self.get_behavior_profile(store_id, id)?;
        let categories = profile.top_categories(PROFILE_CATEGORIES);
        let mut products: Vec<Product> = self
            .repos
            .products
            .list(store_id)?
            .into_iter()
            .filter(|p| p.is_active)
            .filter(|p| p.category.as_deref().is_some_and(|c| categories.contains(&c)))
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(products
            .into_iter()
            .take(PROFILE_RECOMMENDATIONS)
            .map(|product| {
                let reason = format!(
                    "Matches your interest in {}",
                    product.category.as_deref().unwrap_or_default()
                );
                ProfileRecommendation { product, reason }
            })
            .collect())
    }

    // A/B tests

    pub fn create_ab_test(&self, store_id: StoreId, input: NewAbTest) -> ServiceResult<AbTest> {
        let test = AbTest::create(store_id, input, self.now())?;
        self.repos.ab_tests.save(store_id, &test)?;
        Ok(test)
    }

    pub fn list_ab_tests(&self, store_id: StoreId) -> ServiceResult<Vec<AbTest>> {
        let mut tests = self.repos.ab_tests.list(store_id)?;
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    pub fn get_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<AbTest> {
        self.repos.ab_tests.require(store_id, &id, "A/B test")
    }

    pub fn delete_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<()> {
        if !self.repos.ab_tests.remove(store_id, &id)? {
            return Err(DomainError::not_found("A/B test").into());
        }
        Ok(())
    }

    pub fn start_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<AbTest> {
        self.transition_ab_test(store_id, id, |test, now| test.start(now))
    }

    pub fn pause_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<AbTest> {
        self.transition_ab_test(store_id, id, |test, _| test.pause())
    }

    pub fn resume_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<AbTest> {
        self.transition_ab_test(store_id, id, |test, _| test.resume())
    }

    /// Complete a running test, scoring variants from enrolled shoppers'
    /// interactions since the start.
    pub fn end_ab_test(&self, store_id: StoreId, id: RecordId) -> ServiceResult<AbTest> {
        let now = self.now();
        let mut test = self.get_ab_test(store_id, id)?;
        let since = test.start_date.unwrap_or(test.created_at);

        let customers: HashMap<CustomerId, Customer> = self
            .repos
            .customers
            .list(store_id)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut outcomes: BTreeMap<String, bool> = BTreeMap::new();
        for i in self
            .repos
            .interactions
            .list(store_id)?
            .iter()
            .filter(|i| i.created_at >= since && i.created_at <= now)
        {
            let Some(customer) = i.customer_id.and_then(|c| customers.get(&c)) else {
                continue;
            };
            if test.assign(&customer.external_id).is_none() {
                continue;
            }
            let converted = outcomes.entry(customer.external_id.clone()).or_insert(false);
            *converted |= i.is(InteractionType::Purchase);
        }

        test.end(&outcomes, now)?;
        self.repos.ab_tests.save(store_id, &test)?;
        info!(store = %store_id, test = %id, participants = outcomes.len(), "A/B test completed");
        Ok(test)
    }

    fn transition_ab_test(
        &self,
        store_id: StoreId,
        id: RecordId,
        transition: impl FnOnce(&mut AbTest, DateTime<Utc>) -> DomainResult<()>,
    ) -> ServiceResult<AbTest> {
        let mut test = self.get_ab_test(store_id, id)?;
        transition(&mut test, self.now())?;
        self.repos.ab_tests.save(store_id, &test)?;
        Ok(test)
    }

    pub fn ab_test_assignment(&self, store_id: StoreId, id: RecordId, user_id: Option<&str>) -> ServiceResult<Assignment> {
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| invalid("user_id parameter is required"))?;
        let test = self.get_ab_test(store_id, id)?;
        let variant = test.assign(user_id).map(str::to_string);
        Ok(Assignment {
            test_id: test.id,
            user_id: user_id.to_string(),
            enrolled: variant.is_some(),
            variant,
        })
    }

    // Raw events

    pub fn create_event(&self, store_id: StoreId, input: NewEvent) -> ServiceResult<InteractionEvent> {
        let event = InteractionEvent::receive(store_id, input, self.now())?;
        self.repos.events.save(store_id, &event)?;
        Ok(event)
    }

    /// Store every valid event; invalid ones are skipped.
    pub fn create_events(&self, store_id: StoreId, inputs: Vec<NewEvent>) -> ServiceResult<BatchEventsResult> {
        let mut processed = 0;
        for input in inputs {
            match self.create_event(store_id, input) {
                Ok(_) => processed += 1,
                Err(e) => warn!(store = %store_id, error = %e, "skipping invalid event"),
            }
        }
        Ok(BatchEventsResult {
            events_processed: processed,
        })
    }

    pub fn list_events(&self, store_id: StoreId, processed: Option<bool>) -> ServiceResult<Vec<InteractionEvent>> {
        let mut events: Vec<InteractionEvent> = self
            .repos
            .events
            .list(store_id)?
            .into_iter()
            .filter(|e| processed.is_none_or(|p| e.processed == p))
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    /// Turn pending events into interactions; returns how many were recorded.
    ///
    /// Every examined event is marked processed, including ones that are not
    /// interactions or fail validation.
    pub fn process_pending_events(&self, store_id: StoreId) -> ServiceResult<usize> {
        let mut pending: Vec<InteractionEvent> = self
            .repos
            .events
            .list(store_id)?
            .into_iter()
            .filter(|e| !e.processed)
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut recorded = 0;
        for mut event in pending {
            if let Some(input) = event.as_interaction() {
                match self.record_interaction(store_id, input) {
                    Ok(_) => recorded += 1,
                    Err(e) => warn!(store = %store_id, event = %event.id, error = %e, "event could not be recorded"),
                }
            }
            event.mark_processed();
            self.repos.events.save(store_id, &event)?;
        }
        Ok(recorded)
    }
}
