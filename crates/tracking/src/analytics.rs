//! Read-side behaviour analytics over recorded interactions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use storerec_catalog::Product;
use storerec_core::{CustomerId, DomainError, DomainResult, ProductId, percent};
use storerec_customers::Customer;

use crate::interaction::sort_newest_first;
use crate::{Interaction, InteractionType};

const POPULAR_LIMIT: usize = 20;
const ACTIVITY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateRange {
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl DateRange {
    /// Unknown values fall back to the last 7 days.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some("30d") => DateRange::Month,
            Some("90d") => DateRange::Quarter,
            _ => DateRange::Week,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            DateRange::Week => 7,
            DateRange::Month => 30,
            DateRange::Quarter => 90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Day,
    Hour,
}

impl GroupBy {
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some("hour") => GroupBy::Hour,
            _ => GroupBy::Day,
        }
    }

    fn bucket(&self, at: DateTime<Utc>) -> String {
        match self {
            GroupBy::Day => at.format("%Y-%m-%d").to_string(),
            GroupBy::Hour => at
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .unwrap_or(at)
                .format("%Y-%m-%dT%H:00:00Z")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub period: String,
    pub count: u64,
    pub unique_users: usize,
    pub total_value_cents: u64,
    pub avg_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_interactions: u64,
    pub unique_users: usize,
    pub unique_sessions: usize,
    pub total_value_cents: u64,
    pub avg_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    pub interaction_type: InteractionType,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionAnalytics {
    pub date_range: DateRange,
    pub group_by: GroupBy,
    pub periods: Vec<PeriodStats>,
    pub overall: OverallStats,
    pub type_distribution: Vec<TypeShare>,
}

#[derive(Default)]
struct Acc {
    count: u64,
    users: BTreeSet<CustomerId>,
    value: u64,
    weight: f64,
}

impl Acc {
    fn add(&mut self, i: &Interaction) {
        self.count += 1;
        if let Some(c) = i.customer_id {
            self.users.insert(c);
        }
        self.value += i.value_cents;
        self.weight += i.weight;
    }

    fn avg_weight(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.weight / self.count as f64 }
    }
}

pub fn interaction_analytics(
    interactions: &[Interaction],
    now: DateTime<Utc>,
    range: DateRange,
    kind: Option<InteractionType>,
    group_by: GroupBy,
) -> InteractionAnalytics {
    let since = now - Duration::days(range.days());
    let window: Vec<&Interaction> = interactions
        .iter()
        .filter(|i| i.created_at >= since)
        .filter(|i| kind.is_none_or(|k| i.interaction_type == k))
        .collect();

    let mut overall = Acc::default();
    let mut sessions = BTreeSet::new();
    let mut periods: BTreeMap<String, Acc> = BTreeMap::new();
    let mut types: BTreeMap<InteractionType, u64> = BTreeMap::new();
    for i in &window {
        overall.add(i);
        if let Some(s) = i.session_id {
            sessions.insert(s);
        }
        periods.entry(group_by.bucket(i.created_at)).or_default().add(i);
        *types.entry(i.interaction_type).or_default() += 1;
    }

    let total = overall.count;
    let mut type_distribution: Vec<TypeShare> = types
        .into_iter()
        .map(|(interaction_type, count)| TypeShare {
            interaction_type,
            count,
            percentage: percent(count as f64, total as f64),
        })
        .collect();
    type_distribution.sort_by(|a, b| b.count.cmp(&a.count));

    InteractionAnalytics {
        date_range: range,
        group_by,
        periods: periods
            .into_iter()
            .map(|(period, acc)| PeriodStats {
                period,
                count: acc.count,
                unique_users: acc.users.len(),
                total_value_cents: acc.value,
                avg_weight: acc.avg_weight(),
            })
            .collect(),
        overall: OverallStats {
            total_interactions: total,
            unique_users: overall.users.len(),
            unique_sessions: sessions.len(),
            total_value_cents: overall.value,
            avg_weight: overall.avg_weight(),
        },
        type_distribution,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPopularity {
    pub product_id: ProductId,
    pub title: Option<String>,
    pub category: Option<String>,
    pub views: u64,
    pub clicks: u64,
    pub purchases: u64,
    pub total_interactions: u64,
    pub purchase_value_cents: u64,
    /// Sum of interaction weights.
    pub engagement_score: f64,
}

/// Top products of the last `days` days by summed interaction weight.
pub fn popular_products(
    interactions: &[Interaction],
    products: &HashMap<ProductId, &Product>,
    now: DateTime<Utc>,
    days: i64,
) -> Vec<ProductPopularity> {
    let since = now - Duration::days(days);
    let mut by_product: HashMap<ProductId, ProductPopularity> = HashMap::new();
    for i in interactions.iter().filter(|i| i.created_at >= since) {
        let Some(pid) = i.product_id else { continue };
        let row = by_product.entry(pid).or_insert_with(|| {
            let product = products.get(&pid);
            ProductPopularity {
                product_id: pid,
                title: product.map(|p| p.title.clone()),
                category: product.and_then(|p| p.category.clone()),
                views: 0,
                clicks: 0,
                purchases: 0,
                total_interactions: 0,
                purchase_value_cents: 0,
                engagement_score: 0.0,
            }
        });
        row.total_interactions += 1;
        row.engagement_score += i.weight;
        match i.interaction_type {
            InteractionType::View => row.views += 1,
            InteractionType::Click => row.clicks += 1,
            InteractionType::Purchase => {
                row.purchases += 1;
                row.purchase_value_cents += i.value_cents;
            }
            _ => {}
        }
    }

    let mut out: Vec<ProductPopularity> = by_product.into_values().collect();
    out.sort_by(|a, b| {
        b.engagement_score
            .total_cmp(&a.engagement_score)
            .then(a.product_id.cmp(&b.product_id))
    });
    out.truncate(POPULAR_LIMIT);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub total_interactions: usize,
    pub first_interaction: Option<DateTime<Utc>>,
    pub last_interaction: Option<DateTime<Utc>>,
    pub total_purchase_value_cents: u64,
    pub favorite_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserActivity {
    pub user_id: String,
    pub interactions: Vec<Interaction>,
    pub summary: ActivitySummary,
}

/// Latest interactions of one shopper plus a lifetime summary.
pub fn user_activity(customer: &Customer, interactions: &[Interaction]) -> DomainResult<UserActivity> {
    let mut mine: Vec<Interaction> = interactions
        .iter()
        .filter(|i| i.customer_id == Some(customer.id))
        .cloned()
        .collect();
    if mine.iter().any(|i| i.store_id != customer.store_id) {
        return Err(DomainError::invariant("interaction belongs to another store"));
    }
    sort_newest_first(&mut mine);

    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for c in mine.iter().filter_map(|i| i.product_category.as_deref()) {
        *categories.entry(c).or_default() += 1;
    }
    let favorite_category = categories
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(c, _)| c.to_string());

    let summary = ActivitySummary {
        total_interactions: mine.len(),
        first_interaction: mine.last().map(|i| i.created_at),
        last_interaction: mine.first().map(|i| i.created_at),
        total_purchase_value_cents: mine
            .iter()
            .filter(|i| i.is(InteractionType::Purchase))
            .map(|i| i.value_cents)
            .sum(),
        favorite_category,
    };

    mine.truncate(ACTIVITY_LIMIT);
    Ok(UserActivity {
        user_id: customer.external_id.clone(),
        interactions: mine,
        summary,
    })
}
