use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::StoreId;
use storerec_engine::record::rate;
use storerec_engine::{Algorithm, Recommendation};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallPerformance {
    pub total_recommendations: u64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_purchases: u64,
    pub avg_ctr: f64,
    pub avg_conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmPerformance {
    pub algorithm: Algorithm,
    pub total_shown: u64,
    pub total_clicks: u64,
    pub total_purchases: u64,
    pub ctr: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPerformance {
    pub store_id: StoreId,
    pub time_period_days: i64,
    pub overall_performance: OverallPerformance,
    pub algorithm_performance: Vec<AlgorithmPerformance>,
}

/// Outcomes of recommendations created in the last `days` days.
///
/// The per-algorithm breakdown only counts recommendations that were shown
/// and is ordered by CTR, best first.
pub fn performance(
    store_id: StoreId,
    recommendations: &[Recommendation],
    now: DateTime<Utc>,
    days: i64,
) -> RecommendationPerformance {
    let since = now - Duration::days(days);
    let recent = recommendations
        .iter()
        .filter(|r| r.store_id == store_id && r.created_at >= since);

    let mut overall = OverallPerformance::default();
    let mut per_algorithm: BTreeMap<Algorithm, (u64, u64, u64)> = BTreeMap::new();
    for r in recent {
        overall.total_recommendations += 1;
        overall.total_impressions += r.shown_count;
        overall.total_clicks += r.click_count;
        overall.total_purchases += r.purchase_count;
        if r.shown_count > 0 {
            let e = per_algorithm.entry(r.algorithm).or_default();
            e.0 += r.shown_count;
            e.1 += r.click_count;
            e.2 += r.purchase_count;
        }
    }
    overall.avg_ctr = rate(overall.total_clicks, overall.total_impressions);
    overall.avg_conversion_rate = rate(overall.total_purchases, overall.total_impressions);

    let mut algorithm_performance: Vec<AlgorithmPerformance> = per_algorithm
        .into_iter()
        .map(|(algorithm, (shown, clicks, purchases))| AlgorithmPerformance {
            algorithm,
            total_shown: shown,
            total_clicks: clicks,
            total_purchases: purchases,
            ctr: rate(clicks, shown),
            conversion_rate: rate(purchases, shown),
        })
        .collect();
    algorithm_performance.sort_by(|a, b| b.ctr.total_cmp(&a.ctr).then(a.algorithm.cmp(&b.algorithm)));

    RecommendationPerformance {
        store_id,
        time_period_days: days,
        overall_performance: overall,
        algorithm_performance,
    }
}
