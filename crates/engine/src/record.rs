//! Persisted recommendation outputs and their feedback counters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{
    CustomerId, DomainError, DomainResult, Entity, ProductId, RecommendationId, RecordId, StoreId,
};

use crate::request::Algorithm;
use crate::result::ScoredProduct;
use crate::similarity::SimilarPair;
use crate::trending::{TrendingEntry, TrendingWindow};

/// A product recommended to a shopper (or anonymous session).
///
/// Unique per (store, customer, session, product, algorithm); regenerating
/// refreshes the existing record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub session_key: Option<String>,
    pub product_id: ProductId,
    pub algorithm: Algorithm,
    pub score: f64,
    pub rank: u32,
    pub context: Value,
    pub explanation: String,
    pub shown_count: u64,
    pub click_count: u64,
    pub purchase_count: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Who a batch of recommendations is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Audience {
    pub customer_id: Option<CustomerId>,
    pub session_key: Option<String>,
}

impl Recommendation {
    pub fn from_scored(
        store_id: StoreId,
        audience: &Audience,
        algorithm: Algorithm,
        scored: &ScoredProduct,
        rank: u32,
        context: Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecommendationId::new(),
            store_id,
            customer_id: audience.customer_id,
            session_key: audience.session_key.clone(),
            product_id: scored.product_id,
            algorithm,
            score: scored.score,
            rank,
            context,
            explanation: scored.explanation.clone(),
            shown_count: 0,
            click_count: 0,
            purchase_count: 0,
            created_at: now,
            expires_at: Some(now + ttl),
        }
    }

    /// Whether `other` occupies the same uniqueness slot.
    pub fn same_slot(&self, other: &Recommendation) -> bool {
        self.store_id == other.store_id
            && self.customer_id == other.customer_id
            && self.session_key == other.session_key
            && self.product_id == other.product_id
            && self.algorithm == other.algorithm
    }

    /// Take the freshly generated values, keeping identity and counters.
    pub fn refresh_from(&mut self, fresh: &Recommendation) {
        self.score = fresh.score;
        self.rank = fresh.rank;
        self.explanation = fresh.explanation.clone();
        self.context = fresh.context.clone();
        self.expires_at = fresh.expires_at;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn record_impression(&mut self) {
        self.shown_count += 1;
    }

    pub fn record_click(&mut self) {
        self.click_count += 1;
    }

    pub fn record_purchase(&mut self) {
        self.purchase_count += 1;
    }

    pub fn click_through_rate(&self) -> f64 {
        rate(self.click_count, self.shown_count)
    }

    pub fn conversion_rate(&self) -> f64 {
        rate(self.purchase_count, self.shown_count)
    }
}

impl Entity for Recommendation {
    type Id = RecommendationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `part / whole * 100`, 0 when `whole` is 0.
pub fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Filters for listing stored recommendations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationFilter {
    pub algorithm: Option<Algorithm>,
    pub user: Option<CustomerId>,
    pub session_id: Option<String>,
    pub active_only: Option<bool>,
}

impl RecommendationFilter {
    pub fn matches(&self, r: &Recommendation, now: DateTime<Utc>) -> bool {
        self.algorithm.is_none_or(|a| r.algorithm == a)
            && self.user.is_none_or(|u| r.customer_id == Some(u))
            && self
                .session_id
                .as_deref()
                .is_none_or(|s| r.session_key.as_deref() == Some(s))
            && (!self.active_only.unwrap_or(true) || !r.is_expired(now))
    }

    /// Matching records, best score first then rank.
    pub fn apply(&self, records: Vec<Recommendation>, now: DateTime<Utc>) -> Vec<Recommendation> {
        let mut out: Vec<Recommendation> = records.into_iter().filter(|r| self.matches(r, now)).collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub recommendation_id: RecommendationId,
    pub feedback_type: FeedbackType,
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    pub id: RecordId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub recommendation_id: RecommendationId,
    pub feedback_type: FeedbackType,
    pub rating: Option<u8>,
    pub comment: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

impl RecommendationFeedback {
    /// Feedback on `recommendation`, which must belong to `store_id`.
    pub fn create(
        store_id: StoreId,
        recommendation: &Recommendation,
        input: NewFeedback,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if recommendation.store_id != store_id || recommendation.id != input.recommendation_id {
            return Err(DomainError::not_found("recommendation"));
        }
        if input.rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }
        Ok(Self {
            id: RecordId::new(),
            store_id,
            customer_id: recommendation.customer_id,
            recommendation_id: recommendation.id,
            feedback_type: input.feedback_type,
            rating: input.rating,
            comment: input.comment,
            context: input.context,
            created_at: now,
        })
    }
}

impl Entity for RecommendationFeedback {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A shopper's aggregate response to recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecommendationProfile {
    pub id: RecordId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub total_recommendations_shown: u64,
    pub total_recommendations_clicked: u64,
    pub total_recommendations_purchased: u64,
    pub overall_ctr: f64,
    pub overall_conversion_rate: f64,
    pub last_recommendation_at: Option<DateTime<Utc>>,
    pub profile_updated_at: DateTime<Utc>,
}

impl UserRecommendationProfile {
    /// Recompute from every recommendation made to the customer.
    pub fn compute<'a>(
        store_id: StoreId,
        customer_id: CustomerId,
        existing: Option<RecordId>,
        recommendations: impl IntoIterator<Item = &'a Recommendation>,
        now: DateTime<Utc>,
    ) -> Self {
        let (mut shown, mut clicked, mut purchased) = (0u64, 0u64, 0u64);
        let mut last = None;
        for r in recommendations
            .into_iter()
            .filter(|r| r.store_id == store_id && r.customer_id == Some(customer_id))
        {
            shown += r.shown_count;
            clicked += r.click_count;
            purchased += r.purchase_count;
            last = last.max(Some(r.created_at));
        }
        Self {
            id: existing.unwrap_or_default(),
            store_id,
            customer_id,
            total_recommendations_shown: shown,
            total_recommendations_clicked: clicked,
            total_recommendations_purchased: purchased,
            overall_ctr: rate(clicked, shown),
            overall_conversion_rate: rate(purchased, shown),
            last_recommendation_at: last,
            profile_updated_at: now,
        }
    }
}

impl Entity for UserRecommendationProfile {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A precomputed similar-product pair; unique per (store, source, target).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProduct {
    pub id: RecordId,
    pub store_id: StoreId,
    #[serde(flatten)]
    pub pair: SimilarPair,
    pub calculated_at: DateTime<Utc>,
}

impl SimilarProduct {
    pub fn new(store_id: StoreId, pair: SimilarPair, existing: Option<RecordId>, now: DateTime<Utc>) -> Self {
        Self {
            id: existing.unwrap_or_default(),
            store_id,
            pair,
            calculated_at: now,
        }
    }

    pub fn same_pair(&self, source: ProductId, target: ProductId) -> bool {
        self.pair.product_id == source && self.pair.similar_product_id == target
    }
}

impl Entity for SimilarProduct {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A trending row; unique per (store, product, window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingProduct {
    pub id: RecordId,
    pub store_id: StoreId,
    #[serde(flatten)]
    pub entry: TrendingEntry,
    pub calculated_at: DateTime<Utc>,
}

impl TrendingProduct {
    pub fn new(store_id: StoreId, entry: TrendingEntry, existing: Option<RecordId>, now: DateTime<Utc>) -> Self {
        Self {
            id: existing.unwrap_or_default(),
            store_id,
            entry,
            calculated_at: now,
        }
    }

    pub fn in_window(&self, window: TrendingWindow) -> bool {
        self.entry.window == window
    }
}

impl Entity for TrendingProduct {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(store: StoreId, customer: Option<CustomerId>, now: DateTime<Utc>) -> Recommendation {
        let scored = ScoredProduct::new(ProductId::new(), 0.5, "Trending now");
        Recommendation::from_scored(
            store,
            &Audience { customer_id: customer, session_key: None },
            Algorithm::Trending,
            &scored,
            1,
            Value::Null,
            Duration::hours(24),
            now,
        )
    }

    #[test]
    fn rates_are_zero_until_shown() {
        let mut r = rec(StoreId::new(), None, Utc::now());
        assert_eq!(r.click_through_rate(), 0.0);
        r.record_impression();
        r.record_impression();
        r.record_click();
        assert_eq!(r.click_through_rate(), 50.0);
        assert_eq!(r.conversion_rate(), 0.0);
    }

    #[test]
    fn expiry_and_active_filter() {
        let now = Utc::now();
        let r = rec(StoreId::new(), None, now - Duration::hours(25));
        assert!(r.is_expired(now));
        let filter = RecommendationFilter::default();
        assert!(filter.apply(vec![r.clone()], now).is_empty());
        let all = RecommendationFilter { active_only: Some(false), ..Default::default() };
        assert_eq!(all.apply(vec![r], now).len(), 1);
    }

    #[test]
    fn profile_sums_only_the_customers_records() {
        let (store, now) = (StoreId::new(), Utc::now());
        let customer = CustomerId::new();
        let mut mine = rec(store, Some(customer), now);
        mine.shown_count = 4;
        mine.click_count = 1;
        mine.purchase_count = 1;
        let mut other = rec(store, Some(CustomerId::new()), now);
        other.shown_count = 10;

        let p = UserRecommendationProfile::compute(store, customer, None, [&mine, &other], now);
        assert_eq!(p.total_recommendations_shown, 4);
        assert_eq!(p.overall_ctr, 25.0);
        assert_eq!(p.overall_conversion_rate, 25.0);
        assert_eq!(p.last_recommendation_at, Some(now));
    }

    #[test]
    fn feedback_validates_rating_and_store() {
        let store = StoreId::new();
        let r = rec(store, None, Utc::now());
        let input = |rating| NewFeedback {
            recommendation_id: r.id,
            feedback_type: FeedbackType::Positive,
            rating,
            comment: String::new(),
            context: Value::Null,
        };
        assert!(RecommendationFeedback::create(store, &r, input(Some(5)), Utc::now()).is_ok());
        assert!(RecommendationFeedback::create(store, &r, input(Some(6)), Utc::now()).is_err());
        assert!(RecommendationFeedback::create(StoreId::new(), &r, input(None), Utc::now()).is_err());
    }
}
