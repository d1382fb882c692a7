use serde::{Deserialize, Serialize};

use crate::metrics::DailyMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_revenue_cents: u64,
    /// Sum of daily active users; a shopper active on two days counts twice.
    pub total_active_users: u64,
    pub avg_conversion: f64,
}

impl DashboardSummary {
    pub fn over<'a>(metrics: impl IntoIterator<Item = &'a DailyMetrics>) -> Self {
        let (mut revenue, mut users, mut conversion, mut days) = (0u64, 0u64, 0.0, 0usize);
        for m in metrics {
            revenue += m.revenue_cents;
            users += m.active_users;
            conversion += m.conversion_rate;
            days += 1;
        }
        Self {
            total_revenue_cents: revenue,
            total_active_users: users,
            avg_conversion: if days == 0 { 0.0 } else { conversion / days as f64 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub recent_metrics: Vec<DailyMetrics>,
    pub summary: DashboardSummary,
}

/// The latest `days` metric rows (newest first) and their summary.
pub fn dashboard(mut metrics: Vec<DailyMetrics>, days: usize) -> Dashboard {
    metrics.sort_by(|a, b| b.date.cmp(&a.date));
    metrics.truncate(days);
    let summary = DashboardSummary::over(&metrics);
    Dashboard {
        recent_metrics: metrics,
        summary,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, Utc};
    use storerec_core::StoreId;

    use crate::metrics::DailyMetrics;

    pub fn metrics(store: StoreId, date: NaiveDate, revenue_cents: u64, active: u64, conversion: f64) -> DailyMetrics {
        DailyMetrics {
            id: Default::default(),
            store_id: store,
            date,
            total_users: active,
            active_users: active,
            new_users: 0,
            total_interactions: 0,
            purchases: 0,
            revenue_cents,
            recs_shown: 0,
            recs_clicked: 0,
            rec_revenue: 0,
            click_through_rate: conversion,
            conversion_rate: conversion,
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::metrics;
    use super::*;
    use chrono::{Duration, NaiveDate};
    use storerec_core::StoreId;

    #[test]
    fn keeps_latest_days_newest_first() {
        let store = StoreId::new();
        let base = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let rows = (0..10)
            .map(|d| metrics(store, base + Duration::days(d), 100, 2, d as f64))
            .collect();

        let d = dashboard(rows, 3);
        assert_eq!(d.recent_metrics.len(), 3);
        assert_eq!(d.recent_metrics[0].date, base + Duration::days(9));
        assert_eq!(d.summary.total_revenue_cents, 300);
        assert_eq!(d.summary.total_active_users, 6);
        assert_eq!(d.summary.avg_conversion, 8.0);
    }

    #[test]
    fn empty_dashboard_has_zero_summary() {
        let d = dashboard(Vec::new(), 7);
        assert!(d.recent_metrics.is_empty());
        assert_eq!(d.summary.avg_conversion, 0.0);
    }
}
