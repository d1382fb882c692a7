use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use storerec_core::{DomainError, ProductId};

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::{ScoredProduct, rank};
use crate::snapshot::StoreSnapshot;

/// Products kept per window.
pub const TRENDING_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrendingWindow {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
}

impl TrendingWindow {
    pub const ALL: [TrendingWindow; 4] = [
        TrendingWindow::Hour,
        TrendingWindow::SixHours,
        TrendingWindow::Day,
        TrendingWindow::Week,
    ];

    pub fn duration(&self) -> Duration {
        match self {
            TrendingWindow::Hour => Duration::hours(1),
            TrendingWindow::SixHours => Duration::hours(6),
            TrendingWindow::Day => Duration::hours(24),
            TrendingWindow::Week => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingWindow::Hour => "1h",
            TrendingWindow::SixHours => "6h",
            TrendingWindow::Day => "24h",
            TrendingWindow::Week => "7d",
        }
    }
}

impl core::str::FromStr for TrendingWindow {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrendingWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown trending window '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub product_id: ProductId,
    pub window: TrendingWindow,
    pub trend_score: f64,
    /// Share of the window's interactions that happened in its recent half.
    pub velocity: f64,
    pub rank: u32,
    pub interaction_count: u64,
    pub purchase_count: u64,
}

/// Trending products for one window.
///
/// The top 50 products by interaction count are kept; each gets
/// `score = count + 5 * purchases + 2 * recent_half_count`. Rank follows the
/// count ordering.
pub fn compute_trending(snapshot: &StoreSnapshot, window: TrendingWindow) -> Vec<TrendingEntry> {
    let since = snapshot.now - window.duration();
    let recent_since = snapshot.now - window.duration() / 2;

    let mut stats: HashMap<ProductId, (u64, u64, u64)> = HashMap::new();
    for i in snapshot.interactions_since(since) {
        let Some(pid) = i.product_id else { continue };
        let e = stats.entry(pid).or_default();
        e.0 += 1;
        if i.is_purchase() {
            e.1 += 1;
        }
        if i.at >= recent_since {
            e.2 += 1;
        }
    }

    let mut rows: Vec<(ProductId, (u64, u64, u64))> = stats.into_iter().collect();
    rows.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.0.cmp(&b.0)));
    rows.truncate(TRENDING_LIMIT);

    rows.into_iter()
        .enumerate()
        .map(|(idx, (pid, (count, purchases, recent)))| TrendingEntry {
            product_id: pid,
            window,
            trend_score: count as f64 + purchases as f64 * 5.0 + recent as f64 * 2.0,
            velocity: recent as f64 / count as f64,
            rank: idx as u32 + 1,
            interaction_count: count,
            purchase_count: purchases,
        })
        .collect()
}

/// Recommends the 24h trending products, scores normalised by the leader.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendingEngine;

impl Recommender for TrendingEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Trending
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let entries: Vec<TrendingEntry> = compute_trending(snapshot, TrendingWindow::Day)
            .into_iter()
            .filter(|e| snapshot.product(&e.product_id).is_some_and(|p| request.filter.allows(p)))
            .collect();
        let top = entries.iter().map(|e| e.trend_score).fold(0.0, f64::max);
        if top <= 0.0 {
            return Vec::new();
        }
        let scored = entries
            .into_iter()
            .map(|e| ScoredProduct::new(e.product_id, e.trend_score / top, "Trending now"))
            .collect();
        rank(scored, request.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use storerec_tracking::InteractionType;

    #[test]
    fn scores_count_purchases_and_velocity() {
        let now = now();
        let (a, b) = (product("a", "X", 1), product("b", "X", 1));
        let interactions = vec![
            event(None, a.id, InteractionType::View, now - Duration::hours(20)),
            event(None, a.id, InteractionType::View, now - Duration::hours(20)),
            event(None, a.id, InteractionType::View, now - Duration::hours(1)),
            event(None, b.id, InteractionType::Purchase, now - Duration::hours(1)),
            event(None, b.id, InteractionType::View, now - Duration::days(3)),
        ];
        let snap = snapshot(now, vec![a.clone(), b.clone()], interactions);

        let day = compute_trending(&snap, TrendingWindow::Day);
        assert_eq!(day[0].product_id, a.id);
        assert_eq!(day[0].rank, 1);
        assert_eq!(day[0].trend_score, 3.0 + 2.0);
        assert!((day[0].velocity - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(day[1].trend_score, 1.0 + 5.0 + 2.0);

        let week = compute_trending(&snap, TrendingWindow::Week);
        assert_eq!(week.iter().find(|e| e.product_id == b.id).unwrap().interaction_count, 2);

        let recs = TrendingEngine.recommend(&snap, &RecommendationRequest::new(None));
        assert_eq!(recs[0].product_id, b.id);
        assert_eq!(recs[0].score, 1.0);
    }

    #[test]
    fn window_names_parse() {
        assert_eq!("6h".parse::<TrendingWindow>().unwrap(), TrendingWindow::SixHours);
        assert!("2h".parse::<TrendingWindow>().is_err());
    }
}
