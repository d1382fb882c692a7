use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{Entity, RecordId, StoreId};
use storerec_customers::Customer;
use storerec_engine::Recommendation;
use storerec_engine::record::rate;
use storerec_tracking::{Interaction, InteractionType};

/// One day of store activity; unique per (store, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub id: RecordId,
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub total_users: u64,
    pub active_users: u64,
    pub new_users: u64,
    pub total_interactions: u64,
    pub purchases: u64,
    pub revenue_cents: u64,
    pub recs_shown: u64,
    pub recs_clicked: u64,
    /// Purchases attributed to recommendations created that day.
    pub rec_revenue: u64,
    pub click_through_rate: f64,
    pub conversion_rate: f64,
    pub computed_at: DateTime<Utc>,
}

impl DailyMetrics {
    /// Aggregate `date` for one store.
    ///
    /// `customers` is the full shopper list; interactions and recommendations
    /// are bucketed by their creation date.
    pub fn compute(
        store_id: StoreId,
        date: NaiveDate,
        customers: &[Customer],
        interactions: &[Interaction],
        recommendations: &[Recommendation],
        existing: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Self {
        let customers = customers.iter().filter(|c| c.store_id == store_id);
        let (mut total_users, mut active_users, mut new_users) = (0, 0, 0);
        for c in customers {
            total_users += 1;
            if c.last_seen.date_naive() == date {
                active_users += 1;
            }
            if c.first_seen.date_naive() == date {
                new_users += 1;
            }
        }

        let (mut total_interactions, mut purchases, mut revenue_cents) = (0, 0, 0);
        for i in interactions
            .iter()
            .filter(|i| i.store_id == store_id && i.created_at.date_naive() == date)
        {
            total_interactions += 1;
            if i.is(InteractionType::Purchase) {
                purchases += 1;
                revenue_cents += i.value_cents;
            }
        }

        let (mut recs_shown, mut recs_clicked, mut rec_revenue) = (0, 0, 0);
        for r in recommendations
            .iter()
            .filter(|r| r.store_id == store_id && r.created_at.date_naive() == date)
        {
            recs_shown += r.shown_count;
            recs_clicked += r.click_count;
            rec_revenue += r.purchase_count;
        }

        Self {
            id: existing.unwrap_or_default(),
            store_id,
            date,
            total_users,
            active_users,
            new_users,
            total_interactions,
            purchases,
            revenue_cents,
            recs_shown,
            recs_clicked,
            rec_revenue,
            click_through_rate: rate(recs_clicked, recs_shown),
            // Historical definition: clicks over impressions.
            conversion_rate: rate(recs_clicked, recs_shown),
            computed_at: now,
        }
    }
}

impl Entity for DailyMetrics {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
