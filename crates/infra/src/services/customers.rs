//! Store shoppers and their preferences.

use chrono::{DateTime, Utc};
use tracing::debug;

use storerec_core::{CustomerId, DomainError, StoreId};
use storerec_customers::{
    CategoryPopularity, Customer, CustomerFilter, CustomerPatch, CustomerStats, NewCustomer, NewPreference,
    SegmentBreakdown, UserPreference, customer_stats, popular_categories, segment_breakdown,
};
use storerec_tracking::Interaction;

use super::{AppServices, RecordRepo, ServiceResult};

const HISTORY_LIMIT: usize = 50;

impl AppServices {
    pub fn list_customers(&self, store_id: StoreId, filter: &CustomerFilter) -> ServiceResult<Vec<Customer>> {
        Ok(filter.apply(self.repos.customers.list(store_id)?)?)
    }

    pub fn get_customer(&self, store_id: StoreId, id: CustomerId) -> ServiceResult<Customer> {
        self.repos.customers.require(store_id, &id, "user")
    }

    /// Look up a shopper by the store's own user id.
    pub fn find_customer(&self, store_id: StoreId, external_id: &str) -> ServiceResult<Option<Customer>> {
        Ok(self
            .repos
            .customers
            .find_by(store_id, "external_id", external_id)?
            .into_iter()
            .next())
    }

    /// Existing shoppers are touched; unknown ones are created on first sight.
    /// Callers hold the store's write guard.
    pub(crate) fn get_or_create_customer(
        &self,
        store_id: StoreId,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Customer> {
        let customer = match self.find_customer(store_id, external_id)? {
            Some(mut customer) => {
                customer.touch(now);
                customer
            }
            None => {
                debug!(store = %store_id, user = external_id, "first sight of shopper");
                Customer::first_seen(store_id, external_id, now)?
            }
        };
        self.repos.customers.save(store_id, &customer)?;
        Ok(customer)
    }

    pub fn create_customer(&self, store_id: StoreId, input: NewCustomer) -> ServiceResult<Customer> {
        let customer = Customer::create(store_id, input, self.now())?;
        let _guard = self.guards.store(store_id);
        if self.find_customer(store_id, &customer.external_id)?.is_some() {
            return Err(DomainError::conflict(format!("user '{}' already exists", customer.external_id)).into());
        }
        self.repos.customers.save(store_id, &customer)?;
        Ok(customer)
    }

    pub fn update_customer(&self, store_id: StoreId, id: CustomerId, patch: CustomerPatch) -> ServiceResult<Customer> {
        let mut customer = self.get_customer(store_id, id)?;
        customer.apply_patch(patch)?;
        self.repos.customers.save(store_id, &customer)?;
        Ok(customer)
    }

    pub fn delete_customer(&self, store_id: StoreId, id: CustomerId) -> ServiceResult<()> {
        if !self.repos.customers.remove(store_id, &id)? {
            return Err(DomainError::not_found("user").into());
        }
        Ok(())
    }

    pub fn touch_customer(&self, store_id: StoreId, id: CustomerId) -> ServiceResult<Customer> {
        let mut customer = self.get_customer(store_id, id)?;
        customer.touch(self.now());
        self.repos.customers.save(store_id, &customer)?;
        Ok(customer)
    }

    /// The shopper's latest interactions, newest first.
    pub fn customer_history(&self, store_id: StoreId, id: CustomerId) -> ServiceResult<Vec<Interaction>> {
        self.get_customer(store_id, id)?;
        let mut history: Vec<Interaction> = self
            .repos
            .interactions
            .list(store_id)?
            .into_iter()
            .filter(|i| i.customer_id == Some(id))
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(HISTORY_LIMIT);
        Ok(history)
    }

    pub fn customer_stats(&self, store_id: StoreId) -> ServiceResult<CustomerStats> {
        Ok(customer_stats(&self.repos.customers.list(store_id)?, self.now()))
    }

    pub fn customer_segments(&self, store_id: StoreId) -> ServiceResult<Vec<SegmentBreakdown>> {
        Ok(segment_breakdown(&self.repos.customers.list(store_id)?))
    }

    pub fn list_preferences(&self, store_id: StoreId, customer: Option<CustomerId>) -> ServiceResult<Vec<UserPreference>> {
        let mut preferences: Vec<UserPreference> = self
            .repos
            .preferences
            .list(store_id)?
            .into_iter()
            .filter(|p| customer.is_none_or(|c| p.customer_id == c))
            .collect();
        preferences.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(preferences)
    }

    /// Record a preference; restating an existing triple reinforces it.
    pub fn upsert_preference(&self, store_id: StoreId, input: NewPreference) -> ServiceResult<UserPreference> {
        let now = self.now();
        let customer = self
            .find_customer(store_id, input.user_id.trim())?
            .ok_or_else(|| DomainError::not_found("user"))?;
        let candidate = UserPreference::create(store_id, customer.id, &input, now)?;

        let _guard = self.guards.store(store_id);

        let existing = self
            .repos
            .preferences
            .list(store_id)?
            .into_iter()
            .find(|p| p.same_triple(&candidate));
        let preference = match existing {
            Some(mut preference) => {
                preference.reinforce(input.confidence, input.source, now)?;
                preference
            }
            None => candidate,
        };
        self.repos.preferences.save(store_id, &preference)?;
        Ok(preference)
    }

    pub fn popular_categories(&self, store_id: StoreId) -> ServiceResult<Vec<CategoryPopularity>> {
        Ok(popular_categories(&self.repos.preferences.list(store_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use crate::services::test_support::{services, store};
    use storerec_customers::PreferenceSource;

    fn preference(user: &str, value: &str, confidence: f64) -> NewPreference {
        NewPreference {
            user_id: user.to_string(),
            preference_type: "category".to_string(),
            value: value.to_string(),
            confidence,
            source: PreferenceSource::Explicit,
        }
    }

    #[test]
    fn duplicate_external_ids_conflict() {
        let services = services();
        let store = store(&services);
        let input = NewCustomer {
            user_id: "u-1".to_string(),
            ..NewCustomer::default()
        };
        services.create_customer(store.id, input.clone()).unwrap();
        let err = services.create_customer(store.id, input).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn preferences_require_a_known_customer() {
        let services = services();
        let store = store(&services);
        let err = services
            .upsert_preference(store.id, preference("ghost", "shoes", 0.9))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn restating_a_preference_updates_it_in_place() {
        let services = services();
        let store = store(&services);
        services
            .create_customer(store.id, NewCustomer { user_id: "u-1".to_string(), ..NewCustomer::default() })
            .unwrap();

        let first = services.upsert_preference(store.id, preference("u-1", "shoes", 0.5)).unwrap();
        let second = services.upsert_preference(store.id, preference("u-1", "shoes", 0.9)).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.confidence, 0.9);
        assert_eq!(services.list_preferences(store.id, None).unwrap().len(), 1);

        let popular = services.popular_categories(store.id).unwrap();
        assert_eq!(popular[0].value, "shoes");
        assert_eq!(popular[0].user_count, 1);
    }

    #[test]
    fn get_or_create_touches_existing_customers() {
        let services = services();
        let store = store(&services);
        let t0 = Utc::now() - chrono::Duration::days(3);
        let created = services.get_or_create_customer(store.id, "u-9", t0).unwrap();
        let again = services.get_or_create_customer(store.id, "u-9", Utc::now()).unwrap();
        assert_eq!(created.id, again.id);
        assert!(again.last_seen > created.last_seen);
        assert_eq!(services.customer_stats(store.id).unwrap().total_users, 1);
    }
}
