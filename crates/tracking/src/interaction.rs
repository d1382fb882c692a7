//! Shopper interactions and their weights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_catalog::Product;
use storerec_core::{
    CustomerId, DomainError, DomainResult, Entity, InteractionId, ProductId, RecommendationId,
    SessionId, StoreId,
};
use storerec_customers::EngagementTotals;

/// Kind of shopper action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Click,
    DetailView,
    CartAdd,
    CartRemove,
    WishlistAdd,
    WishlistRemove,
    Purchase,
    Review,
    Share,
    Like,
    Dislike,
    Search,
    Filter,
}

impl InteractionType {
    pub const ALL: [InteractionType; 14] = [
        InteractionType::View,
        InteractionType::Click,
        InteractionType::DetailView,
        InteractionType::CartAdd,
        InteractionType::CartRemove,
        InteractionType::WishlistAdd,
        InteractionType::WishlistRemove,
        InteractionType::Purchase,
        InteractionType::Review,
        InteractionType::Share,
        InteractionType::Like,
        InteractionType::Dislike,
        InteractionType::Search,
        InteractionType::Filter,
    ];

    /// Signal strength used by every scoring path.
    pub fn weight(&self) -> f64 {
        match self {
            InteractionType::View => 0.1,
            InteractionType::Click => 0.3,
            InteractionType::DetailView => 0.5,
            InteractionType::CartAdd => 2.0,
            InteractionType::WishlistAdd => 1.5,
            InteractionType::Purchase => 5.0,
            InteractionType::Review => 3.0,
            InteractionType::Like => 1.0,
            InteractionType::Dislike => 0.5,
            InteractionType::CartRemove
            | InteractionType::WishlistRemove
            | InteractionType::Share
            | InteractionType::Search
            | InteractionType::Filter => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Click => "click",
            InteractionType::DetailView => "detail_view",
            InteractionType::CartAdd => "cart_add",
            InteractionType::CartRemove => "cart_remove",
            InteractionType::WishlistAdd => "wishlist_add",
            InteractionType::WishlistRemove => "wishlist_remove",
            InteractionType::Purchase => "purchase",
            InteractionType::Review => "review",
            InteractionType::Share => "share",
            InteractionType::Like => "like",
            InteractionType::Dislike => "dislike",
            InteractionType::Search => "search",
            InteractionType::Filter => "filter",
        }
    }
}

impl core::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InteractionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older tracking snippets send the bare "cart".
        if s == "cart" {
            return Ok(InteractionType::CartAdd);
        }
        InteractionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown interaction type '{s}'")))
    }
}

/// Page and device context captured with an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionContext {
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub referrer_url: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub screen_resolution: Option<String>,
    pub language: Option<String>,
    pub search_query: Option<String>,
    pub search_results_count: Option<u32>,
    pub search_position: Option<u32>,
    /// Seconds spent on the page.
    pub time_on_page: Option<u32>,
    /// Fraction of the page scrolled, 0..=1.
    pub scroll_depth: Option<f64>,
}

/// Tracking payload as sent by a storefront.
///
/// `user_id`, `session_id` and `product_id` are the store's own identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInteraction {
    pub interaction_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub recommendation_id: Option<RecommendationId>,
    #[serde(default)]
    pub value_cents: Option<u64>,
    #[serde(flatten)]
    pub context: InteractionContext,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NewInteraction {
    /// Validate the payload and return its parsed type.
    pub fn validate(&self) -> DomainResult<InteractionType> {
        let kind: InteractionType = self.interaction_type.parse()?;
        if let Some(depth) = self.context.scroll_depth {
            if !(0.0..=1.0).contains(&depth) {
                return Err(DomainError::validation("scroll_depth must be between 0 and 1"));
            }
        }
        Ok(kind)
    }
}

/// A recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub session_id: Option<SessionId>,
    pub interaction_type: InteractionType,
    pub value_cents: u64,
    pub weight: f64,
    #[serde(flatten)]
    pub context: InteractionContext,
    pub product_price_cents: Option<u64>,
    pub product_category: Option<String>,
    pub metadata: Value,
    pub recommendation_id: Option<RecommendationId>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Build the record for a validated payload whose references were resolved.
    ///
    /// The weight always comes from the interaction type; product facts are
    /// denormalised so aggregates survive catalog changes.
    pub fn record(
        store_id: StoreId,
        input: NewInteraction,
        customer_id: Option<CustomerId>,
        session_id: Option<SessionId>,
        product: Option<&Product>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let kind = input.validate()?;
        Ok(Self {
            id: InteractionId::new(),
            store_id,
            customer_id,
            product_id: product.map(|p| p.id),
            session_id,
            interaction_type: kind,
            value_cents: input.value_cents.unwrap_or(0),
            weight: kind.weight(),
            context: input.context,
            product_price_cents: product.and_then(|p| p.price_cents),
            product_category: product.and_then(|p| p.category.clone()),
            metadata: input
                .metadata
                .unwrap_or_else(|| Value::Object(Default::default())),
            recommendation_id: input.recommendation_id,
            created_at: now,
        })
    }

    pub fn is(&self, kind: InteractionType) -> bool {
        self.interaction_type == kind
    }
}

impl Entity for Interaction {
    type Id = InteractionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Totals used to refresh a customer's cached engagement fields.
pub fn engagement_totals<'a>(interactions: impl IntoIterator<Item = &'a Interaction>) -> EngagementTotals {
    let mut totals = EngagementTotals::default();
    for i in interactions {
        totals.interactions += 1;
        if i.is(InteractionType::Purchase) {
            totals.purchases += 1;
            totals.purchase_value_cents += i.value_cents;
            if totals.last_purchase.is_none_or(|t| i.created_at > t) {
                totals.last_purchase = Some(i.created_at);
            }
        }
    }
    totals
}

/// Listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub interaction_type: Option<String>,
    pub product: Option<ProductId>,
    pub user: Option<CustomerId>,
    pub session: Option<SessionId>,
}

impl InteractionFilter {
    /// Filter and order newest first.
    pub fn apply(&self, interactions: Vec<Interaction>) -> DomainResult<Vec<Interaction>> {
        let kind: Option<InteractionType> =
            self.interaction_type.as_deref().map(str::parse).transpose()?;
        let mut out: Vec<Interaction> = interactions
            .into_iter()
            .filter(|i| self.date_from.is_none_or(|from| i.created_at >= from))
            .filter(|i| self.date_to.is_none_or(|to| i.created_at <= to))
            .filter(|i| kind.is_none_or(|k| i.interaction_type == k))
            .filter(|i| self.product.is_none_or(|p| i.product_id == Some(p)))
            .filter(|i| self.user.is_none_or(|u| i.customer_id == Some(u)))
            .filter(|i| self.session.is_none_or(|s| i.session_id == Some(s)))
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }
}

pub(crate) fn sort_newest_first(interactions: &mut [Interaction]) {
    interactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
