//! Stated or inferred shopper preferences.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{CustomerId, DomainError, DomainResult, Entity, RecordId, StoreId};

/// Minimum confidence for a preference to count toward popularity.
pub const POPULAR_CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSource {
    Explicit,
    #[default]
    Inferred,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPreference {
    /// External user id of the shopper.
    pub user_id: String,
    pub preference_type: String,
    pub value: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: PreferenceSource,
}

fn default_confidence() -> f64 {
    1.0
}

/// One preference triple; unique per (customer, type, value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub id: RecordId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub preference_type: String,
    pub value: String,
    pub confidence: f64,
    pub source: PreferenceSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub fn create(
        store_id: StoreId,
        customer_id: CustomerId,
        input: &NewPreference,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let preference_type = input.preference_type.trim();
        let value = input.value.trim();
        if preference_type.is_empty() || value.is_empty() {
            return Err(DomainError::validation(
                "preference_type and value cannot be empty",
            ));
        }
        validate_confidence(input.confidence)?;
        Ok(Self {
            id: RecordId::new(),
            store_id,
            customer_id,
            preference_type: preference_type.to_string(),
            value: value.to_string(),
            confidence: input.confidence,
            source: input.source,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn same_triple(&self, other: &UserPreference) -> bool {
        self.customer_id == other.customer_id
            && self.preference_type == other.preference_type
            && self.value == other.value
    }

    /// Refresh an existing triple with a newer observation.
    pub fn reinforce(&mut self, confidence: f64, source: PreferenceSource, now: DateTime<Utc>) -> DomainResult<()> {
        validate_confidence(confidence)?;
        self.confidence = confidence;
        self.source = source;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for UserPreference {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_confidence(confidence: f64) -> DomainResult<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(DomainError::validation("confidence must be between 0 and 1"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPopularity {
    pub value: String,
    pub user_count: usize,
    pub avg_confidence: f64,
}

/// Top 10 confidently preferred categories by distinct shopper count.
pub fn popular_categories(preferences: &[UserPreference]) -> Vec<CategoryPopularity> {
    let mut by_value: BTreeMap<&str, (BTreeSet<CustomerId>, f64, usize)> = BTreeMap::new();
    for p in preferences
        .iter()
        .filter(|p| p.preference_type == "category" && p.confidence >= POPULAR_CONFIDENCE_THRESHOLD)
    {
        let entry = by_value.entry(p.value.as_str()).or_default();
        entry.0.insert(p.customer_id);
        entry.1 += p.confidence;
        entry.2 += 1;
    }

    let mut out: Vec<CategoryPopularity> = by_value
        .into_iter()
        .map(|(value, (users, sum, n))| CategoryPopularity {
            value: value.to_string(),
            user_count: users.len(),
            avg_confidence: sum / n as f64,
        })
        .collect();
    out.sort_by(|a, b| b.user_count.cmp(&a.user_count).then_with(|| a.value.cmp(&b.value)));
    out.truncate(10);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pref(customer: CustomerId, value: &str, confidence: f64) -> UserPreference {
        UserPreference::create(
            StoreId::new(),
            customer,
            &NewPreference {
                user_id: "u".into(),
                preference_type: "category".into(),
                value: value.into(),
                confidence,
                source: PreferenceSource::Explicit,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let input = NewPreference {
            user_id: "u".into(),
            preference_type: "brand".into(),
            value: "Peak".into(),
            confidence: 1.5,
            source: PreferenceSource::Inferred,
        };
        assert!(UserPreference::create(StoreId::new(), CustomerId::new(), &input, Utc::now()).is_err());
    }

    #[test]
    fn popular_categories_counts_distinct_confident_users() {
        let (a, b, c) = (CustomerId::new(), CustomerId::new(), CustomerId::new());
        let prefs = vec![
            pref(a, "Shoes", 0.9),
            pref(b, "Shoes", 0.7),
            pref(c, "Shoes", 0.2),
            pref(a, "Hats", 1.0),
        ];
        let top = popular_categories(&prefs);
        assert_eq!(top[0].value, "Shoes");
        assert_eq!(top[0].user_count, 2);
        assert!((top[0].avg_confidence - 0.8).abs() < 1e-9);
        assert_eq!(top[1].value, "Hats");
    }
}
