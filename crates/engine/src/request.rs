use serde::{Deserialize, Serialize};

use storerec_core::{CustomerId, DomainError, ProductId, SessionId};

use crate::snapshot::ProductFacts;

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const MAX_RESULTS_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    CollaborativeFiltering,
    ContentBased,
    #[default]
    Hybrid,
    Popularity,
    SessionBased,
    Trending,
    FrequentlyBoughtTogether,
    SimilarUsers,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Algorithm::CollaborativeFiltering,
        Algorithm::ContentBased,
        Algorithm::Hybrid,
        Algorithm::Popularity,
        Algorithm::SessionBased,
        Algorithm::Trending,
        Algorithm::FrequentlyBoughtTogether,
        Algorithm::SimilarUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::CollaborativeFiltering => "collaborative_filtering",
            Algorithm::ContentBased => "content_based",
            Algorithm::Hybrid => "hybrid",
            Algorithm::Popularity => "popularity",
            Algorithm::SessionBased => "session_based",
            Algorithm::Trending => "trending",
            Algorithm::FrequentlyBoughtTogether => "frequently_bought_together",
            Algorithm::SimilarUsers => "similar_users",
        }
    }
}

impl core::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Algorithm {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown algorithm '{s}'")))
    }
}

/// Restrictions applied to every candidate before ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateFilter {
    pub category: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub in_stock_only: bool,
}

impl CandidateFilter {
    /// Active products that satisfy every configured restriction.
    pub fn allows(&self, product: &ProductFacts) -> bool {
        if !product.is_active || (self.in_stock_only && !product.in_stock) {
            return false;
        }
        if let Some(category) = &self.category {
            if !product
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category))
            {
                return false;
            }
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(price) = product.price_cents else {
                return false;
            };
            if self.min_price.is_some_and(|m| price < m) || self.max_price.is_some_and(|m| price > m) {
                return false;
            }
        }
        true
    }
}

/// What to recommend for whom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationRequest {
    pub customer_id: Option<CustomerId>,
    pub session_id: Option<SessionId>,
    /// Product being viewed, for item-to-item engines.
    pub context_product: Option<ProductId>,
    pub max_results: usize,
    pub filter: CandidateFilter,
}

impl RecommendationRequest {
    pub fn new(max_results: Option<usize>) -> Self {
        Self {
            max_results: clamp_max_results(max_results),
            ..Default::default()
        }
    }

    pub fn for_customer(mut self, customer_id: Option<CustomerId>) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn in_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn viewing(mut self, product_id: Option<ProductId>) -> Self {
        self.context_product = product_id;
        self
    }

    pub fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Same request asking for `n` results (used by engines that oversample).
    pub fn widened(&self, n: usize) -> Self {
        Self {
            max_results: n,
            ..self.clone()
        }
    }
}

/// 1..=50, defaulting to 10.
pub fn clamp_max_results(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_LIMIT)
}
