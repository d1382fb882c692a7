//! Per-product daily aggregates.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{Entity, ProductId, RecordId, StoreId};

use crate::{Interaction, InteractionType};

/// One row per (store, product, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProductView {
    pub id: RecordId,
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub total_views: u64,
    pub unique_views: u64,
    pub detail_views: u64,
    pub cart_adds: u64,
    pub purchases: u64,
    pub revenue_cents: u64,
    pub avg_time_on_page: f64,
    pub updated_at: DateTime<Utc>,
}

impl DailyProductView {
    /// Aggregate the product's interactions that fall on `date`.
    ///
    /// `existing` keeps the row id stable across recomputation.
    pub fn compute<'a>(
        store_id: StoreId,
        product_id: ProductId,
        date: NaiveDate,
        interactions: impl IntoIterator<Item = &'a Interaction>,
        existing: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut row = Self {
            id: existing.unwrap_or_default(),
            store_id,
            product_id,
            date,
            total_views: 0,
            unique_views: 0,
            detail_views: 0,
            cart_adds: 0,
            purchases: 0,
            revenue_cents: 0,
            avg_time_on_page: 0.0,
            updated_at: now,
        };

        let mut viewers = BTreeSet::new();
        let (mut time_sum, mut time_n) = (0u64, 0u64);

        for i in interactions
            .into_iter()
            .filter(|i| i.product_id == Some(product_id) && i.created_at.date_naive() == date)
        {
            match i.interaction_type {
                InteractionType::View => {
                    row.total_views += 1;
                    if let Some(c) = i.customer_id {
                        viewers.insert(c);
                    }
                }
                InteractionType::DetailView => row.detail_views += 1,
                InteractionType::CartAdd => row.cart_adds += 1,
                InteractionType::Purchase => {
                    row.purchases += 1;
                    row.revenue_cents += i.value_cents;
                }
                _ => {}
            }
            if let Some(t) = i.context.time_on_page.filter(|t| *t > 0) {
                time_sum += u64::from(t);
                time_n += 1;
            }
        }

        row.unique_views = viewers.len() as u64;
        if time_n > 0 {
            row.avg_time_on_page = time_sum as f64 / time_n as f64;
        }
        row
    }
}

impl Entity for DailyProductView {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::test_support::interaction;
    use chrono::{Duration, TimeZone};
    use storerec_core::CustomerId;

    #[test]
    fn aggregates_only_the_given_day_and_product() {
        let day = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let product = ProductId::new();
        let (a, b) = (CustomerId::new(), CustomerId::new());

        let mut v1 = interaction(InteractionType::View, Some(a), Some(product), day);
        v1.context.time_on_page = Some(30);
        let mut v2 = interaction(InteractionType::View, Some(a), Some(product), day);
        v2.context.time_on_page = Some(0);
        let v3 = interaction(InteractionType::View, Some(b), Some(product), day);
        let mut buy = interaction(InteractionType::Purchase, Some(b), Some(product), day);
        buy.value_cents = 1_999;
        buy.context.time_on_page = Some(10);
        let other_day = interaction(InteractionType::View, Some(a), Some(product), day - Duration::days(1));
        let other_product = interaction(InteractionType::View, Some(a), Some(ProductId::new()), day);

        let items = [v1, v2, v3, buy, other_day, other_product];
        let row = DailyProductView::compute(StoreId::new(), product, day.date_naive(), &items, None, day);

        assert_eq!(row.total_views, 3);
        assert_eq!(row.unique_views, 2);
        assert_eq!(row.purchases, 1);
        assert_eq!(row.revenue_cents, 1_999);
        assert_eq!(row.avg_time_on_page, 20.0);
    }

    #[test]
    fn recompute_keeps_row_id() {
        let id = RecordId::new();
        let row = DailyProductView::compute(
            StoreId::new(),
            ProductId::new(),
            Utc::now().date_naive(),
            [],
            Some(id),
            Utc::now(),
        );
        assert_eq!(row.id, id);
        assert_eq!(row.total_views, 0);
    }
}
