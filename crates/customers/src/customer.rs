//! Shopper record and engagement scoring.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{CustomerId, DomainError, DomainResult, Entity, StoreId};

/// Coarse segment derived from purchase count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Browser,
    FirstTime,
    Regular,
    Vip,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::Browser,
        Segment::FirstTime,
        Segment::Regular,
        Segment::Vip,
    ];

    pub fn from_purchases(purchases: u64) -> Self {
        match purchases {
            0 => Segment::Browser,
            1 => Segment::FirstTime,
            2..=5 => Segment::Regular,
            _ => Segment::Vip,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Browser => "browser",
            Segment::FirstTime => "first_time",
            Segment::Regular => "regular",
            Segment::Vip => "vip",
        }
    }
}

impl core::str::FromStr for Segment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Segment::ALL
            .into_iter()
            .find(|seg| seg.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown segment '{s}'")))
    }
}

/// Engagement bucket used by listing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    /// `high`: >=10 interactions and >=3 purchases; `medium`: >=5 and >=1;
    /// `low`: fewer than 5 interactions. Other combinations match no level.
    pub fn matches(&self, c: &Customer) -> bool {
        match self {
            EngagementLevel::High => c.total_interactions >= 10 && c.total_purchases >= 3,
            EngagementLevel::Medium => c.total_interactions >= 5 && c.total_purchases >= 1,
            EngagementLevel::Low => c.total_interactions < 5,
        }
    }
}

impl core::str::FromStr for EngagementLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(EngagementLevel::High),
            "medium" => Ok(EngagementLevel::Medium),
            "low" => Ok(EngagementLevel::Low),
            other => Err(DomainError::validation(format!(
                "unknown engagement level '{other}'"
            ))),
        }
    }
}

/// Aggregates over a customer's interactions, computed by the tracking layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementTotals {
    pub interactions: u64,
    pub purchases: u64,
    pub purchase_value_cents: u64,
    pub last_purchase: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomer {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile: Option<Value>,
    pub is_active: Option<bool>,
}

/// A shopper of one store, identified by the store's own user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub store_id: StoreId,
    pub external_id: String,
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile: Value,
    pub total_interactions: u64,
    pub total_purchases: u64,
    pub total_value_cents: u64,
    pub avg_order_value_cents: u64,
    pub is_active: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_purchase: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn create(store_id: StoreId, input: NewCustomer, now: DateTime<Utc>) -> DomainResult<Self> {
        let external_id = input.user_id.trim();
        if external_id.is_empty() {
            return Err(DomainError::validation("user_id cannot be empty"));
        }
        if let Some(email) = input.email.as_deref() {
            validate_email(email)?;
        }
        Ok(Self {
            id: CustomerId::new(),
            store_id,
            external_id: external_id.to_string(),
            email: input.email,
            session_id: input.session_id,
            first_name: input.first_name,
            last_name: input.last_name,
            profile: input.profile.unwrap_or_else(|| Value::Object(Default::default())),
            total_interactions: 0,
            total_purchases: 0,
            total_value_cents: 0,
            avg_order_value_cents: 0,
            is_active: true,
            first_seen: now,
            last_seen: now,
            last_purchase: None,
        })
    }

    /// Minimal record for a shopper first seen through tracking.
    pub fn first_seen(store_id: StoreId, external_id: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::create(
            store_id,
            NewCustomer {
                user_id: external_id.to_string(),
                ..Default::default()
            },
            now,
        )
    }

    pub fn apply_patch(&mut self, patch: CustomerPatch) -> DomainResult<()> {
        if let Some(email) = patch.email {
            validate_email(&email)?;
            self.email = Some(email);
        }
        if let Some(v) = patch.session_id {
            self.session_id = Some(v);
        }
        if let Some(v) = patch.first_name {
            self.first_name = Some(v);
        }
        if let Some(v) = patch.last_name {
            self.last_name = Some(v);
        }
        if let Some(v) = patch.profile {
            self.profile = v;
        }
        if let Some(v) = patch.is_active {
            self.is_active = v;
        }
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn full_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{first} {last}")
            }
            _ => self.external_id.clone(),
        }
    }

    /// 0-100 score from purchases, interaction volume and recency.
    pub fn engagement_score(&self, now: DateTime<Utc>) -> f64 {
        if self.total_interactions == 0 {
            return 0.0;
        }
        let purchase_score = (self.total_purchases as f64 * 20.0).min(40.0);
        let interaction_score = (self.total_interactions as f64 * 0.5).min(30.0);

        let since = now - self.last_seen;
        let recency_score = if since > Duration::days(30) {
            10.0
        } else if since > Duration::days(7) {
            20.0
        } else {
            30.0
        };

        (purchase_score + interaction_score + recency_score).min(100.0)
    }

    pub fn segment(&self) -> Segment {
        Segment::from_purchases(self.total_purchases)
    }

    /// Overwrite cached totals with freshly computed aggregates.
    pub fn refresh_engagement(&mut self, totals: EngagementTotals) {
        self.total_interactions = totals.interactions;
        self.total_purchases = totals.purchases;
        self.total_value_cents = totals.purchase_value_cents;
        self.avg_order_value_cents = if totals.purchases > 0 {
            totals.purchase_value_cents / totals.purchases
        } else {
            0
        };
        self.last_purchase = totals.last_purchase;
    }

    pub fn matches_search(&self, needle_lower: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle_lower);
        contains(&self.external_id)
            || self.email.as_deref().is_some_and(contains)
            || self.first_name.as_deref().is_some_and(contains)
            || self.last_name.as_deref().is_some_and(contains)
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_email(email: &str) -> DomainResult<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!("invalid email '{email}'")))
    }
}

/// Listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub engagement: Option<String>,
    pub segment: Option<String>,
    pub is_active: Option<bool>,
}

impl CustomerFilter {
    /// Filter and order by most recently seen.
    pub fn apply(&self, customers: Vec<Customer>) -> DomainResult<Vec<Customer>> {
        let engagement: Option<EngagementLevel> =
            self.engagement.as_deref().map(str::parse).transpose()?;
        let segment: Option<Segment> = self.segment.as_deref().map(str::parse).transpose()?;
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut out: Vec<Customer> = customers
            .into_iter()
            .filter(|c| search.as_deref().is_none_or(|q| c.matches_search(q)))
            .filter(|c| engagement.is_none_or(|lvl| lvl.matches(c)))
            .filter(|c| segment.is_none_or(|s| c.segment() == s))
            .filter(|c| self.is_active.is_none_or(|a| c.is_active == a))
            .collect();
        out.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(interactions: u64, purchases: u64) -> Customer {
        let mut c = Customer::first_seen(StoreId::new(), "u-1", Utc::now()).unwrap();
        c.total_interactions = interactions;
        c.total_purchases = purchases;
        c
    }

    #[test]
    fn no_interactions_scores_zero() {
        assert_eq!(customer(0, 0).engagement_score(Utc::now()), 0.0);
    }

    #[test]
    fn engagement_score_components() {
        let now = Utc::now();
        // 2 purchases -> 40 (cap), 10 interactions -> 5, recent -> 30
        assert_eq!(customer(10, 2).engagement_score(now), 75.0);

        let mut stale = customer(100, 5);
        stale.last_seen = now - Duration::days(10);
        // 40 + 30 + 20
        assert_eq!(stale.engagement_score(now), 90.0);
        stale.last_seen = now - Duration::days(31);
        assert_eq!(stale.engagement_score(now), 80.0);
    }

    #[test]
    fn segments_follow_purchase_count() {
        assert_eq!(customer(1, 0).segment(), Segment::Browser);
        assert_eq!(customer(1, 1).segment(), Segment::FirstTime);
        assert_eq!(customer(1, 5).segment(), Segment::Regular);
        assert_eq!(customer(1, 6).segment(), Segment::Vip);
    }

    #[test]
    fn engagement_levels() {
        assert!(EngagementLevel::High.matches(&customer(10, 3)));
        assert!(!EngagementLevel::High.matches(&customer(10, 2)));
        assert!(EngagementLevel::Medium.matches(&customer(5, 1)));
        assert!(EngagementLevel::Low.matches(&customer(4, 0)));
        assert!(!EngagementLevel::Low.matches(&customer(6, 0)));
    }

    #[test]
    fn full_name_falls_back_to_external_id() {
        let mut c = customer(0, 0);
        assert_eq!(c.full_name(), "u-1");
        c.first_name = Some("Ada".into());
        c.last_name = Some("Lovelace".into());
        assert_eq!(c.full_name(), "Ada Lovelace");
    }

    #[test]
    fn refresh_engagement_computes_average_order_value() {
        let mut c = customer(0, 0);
        c.refresh_engagement(EngagementTotals {
            interactions: 12,
            purchases: 3,
            purchase_value_cents: 9_000,
            last_purchase: Some(Utc::now()),
        });
        assert_eq!(c.avg_order_value_cents, 3_000);
        assert_eq!(c.segment(), Segment::Regular);
    }

    #[test]
    fn create_validates_identity_and_email() {
        assert!(Customer::first_seen(StoreId::new(), "  ", Utc::now()).is_err());
        let input = NewCustomer {
            user_id: "u".into(),
            email: Some("nope".into()),
            ..Default::default()
        };
        assert!(Customer::create(StoreId::new(), input, Utc::now()).is_err());
    }

    #[test]
    fn filter_rejects_unknown_levels() {
        let filter = CustomerFilter {
            engagement: Some("extreme".into()),
            ..Default::default()
        };
        assert!(filter.apply(vec![customer(0, 0)]).is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: the score stays within 0..=100 for any history.
            #[test]
            fn engagement_score_is_bounded(
                interactions in 0u64..100_000,
                purchases in 0u64..10_000,
                days_ago in 0i64..400,
            ) {
                let now = Utc::now();
                let mut c = customer(interactions, purchases);
                c.last_seen = now - Duration::days(days_ago);
                let score = c.engagement_score(now);
                prop_assert!((0.0..=100.0).contains(&score));
                if interactions > 0 {
                    prop_assert!(score >= 10.0);
                }
            }
        }
    }
}
