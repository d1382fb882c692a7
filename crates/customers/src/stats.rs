//! Store-level shopper statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Customer, Segment};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub count: usize,
    pub avg_value_cents: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerStats {
    pub total_users: usize,
    pub active_users: usize,
    pub new_users_today: usize,
    pub avg_interactions_per_user: f64,
    pub total_value_cents: u64,
    pub segments: BTreeMap<Segment, SegmentStats>,
    pub active_last_7_days: usize,
    pub active_last_30_days: usize,
}

pub fn customer_stats(customers: &[Customer], now: DateTime<Utc>) -> CustomerStats {
    let today = now.date_naive();
    let total = customers.len();
    let total_interactions: u64 = customers.iter().map(|c| c.total_interactions).sum();

    let mut segments: BTreeMap<Segment, (usize, u64)> = BTreeMap::new();
    for c in customers {
        let e = segments.entry(c.segment()).or_default();
        e.0 += 1;
        e.1 += c.total_value_cents;
    }

    CustomerStats {
        total_users: total,
        active_users: customers.iter().filter(|c| c.is_active).count(),
        new_users_today: customers
            .iter()
            .filter(|c| c.first_seen.date_naive() == today)
            .count(),
        avg_interactions_per_user: if total == 0 {
            0.0
        } else {
            total_interactions as f64 / total as f64
        },
        total_value_cents: customers.iter().map(|c| c.total_value_cents).sum(),
        segments: segments
            .into_iter()
            .map(|(seg, (count, value))| {
                (
                    seg,
                    SegmentStats {
                        count,
                        avg_value_cents: value / count as u64,
                    },
                )
            })
            .collect(),
        active_last_7_days: seen_since(customers, now - Duration::days(7)),
        active_last_30_days: seen_since(customers, now - Duration::days(30)),
    }
}

fn seen_since(customers: &[Customer], since: DateTime<Utc>) -> usize {
    customers.iter().filter(|c| c.last_seen >= since).count()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentBreakdown {
    pub segment: Segment,
    pub count: usize,
    pub avg_interactions: f64,
    pub total_value_cents: u64,
    pub avg_order_value_cents: u64,
}

/// Per-segment breakdown; every segment is present, empty ones with zeros.
pub fn segment_breakdown(customers: &[Customer]) -> Vec<SegmentBreakdown> {
    Segment::ALL
        .into_iter()
        .map(|segment| {
            let members: Vec<&Customer> =
                customers.iter().filter(|c| c.segment() == segment).collect();
            let count = members.len();
            let interactions: u64 = members.iter().map(|c| c.total_interactions).sum();
            let value: u64 = members.iter().map(|c| c.total_value_cents).sum();
            let aov: u64 = members.iter().map(|c| c.avg_order_value_cents).sum();
            SegmentBreakdown {
                segment,
                count,
                avg_interactions: if count == 0 { 0.0 } else { interactions as f64 / count as f64 },
                total_value_cents: value,
                avg_order_value_cents: if count == 0 { 0 } else { aov / count as u64 },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storerec_core::StoreId;

    fn customer(purchases: u64, value: u64, days_ago: i64) -> Customer {
        let now = Utc::now();
        let mut c = Customer::first_seen(StoreId::new(), "u", now - Duration::days(days_ago)).unwrap();
        c.total_purchases = purchases;
        c.total_interactions = purchases * 2;
        c.total_value_cents = value;
        c
    }

    #[test]
    fn stats_group_segments_and_recency() {
        let now = Utc::now();
        let customers = vec![customer(0, 0, 0), customer(1, 1_000, 10), customer(7, 9_000, 40)];
        let stats = customer_stats(&customers, now);
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.new_users_today, 1);
        assert_eq!(stats.active_last_7_days, 1);
        assert_eq!(stats.active_last_30_days, 2);
        assert_eq!(stats.total_value_cents, 10_000);
        assert_eq!(stats.segments[&Segment::Vip].avg_value_cents, 9_000);
        assert!(!stats.segments.contains_key(&Segment::Regular));
    }

    #[test]
    fn breakdown_lists_every_segment() {
        let rows = segment_breakdown(&[customer(2, 500, 0)]);
        assert_eq!(rows.len(), 4);
        let regular = rows.iter().find(|r| r.segment == Segment::Regular).unwrap();
        assert_eq!(regular.count, 1);
        assert_eq!(regular.avg_interactions, 4.0);
        let vip = rows.iter().find(|r| r.segment == Segment::Vip).unwrap();
        assert_eq!(vip.count, 0);
    }
}
