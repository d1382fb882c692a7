use std::collections::{HashMap, HashSet};

use storerec_core::{ProductId, SessionId};

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::{ScoredProduct, rank};
use crate::snapshot::StoreSnapshot;

/// Item co-occurrence within browsing sessions.
///
/// Products of the current session seed the search. Other sessions that
/// touched any seed product vote for their remaining products; votes are
/// normalised by the strongest candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionEngine;

impl Recommender for SessionEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SessionBased
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let Some(session) = request.session_id else {
            return Vec::new();
        };

        let seeds: HashSet<ProductId> = snapshot
            .interactions
            .iter()
            .filter(|i| i.session_id == Some(session))
            .filter_map(|i| i.product_id)
            .collect();
        if seeds.is_empty() {
            return Vec::new();
        }

        let related: HashSet<SessionId> = snapshot
            .interactions
            .iter()
            .filter(|i| i.session_id != Some(session))
            .filter(|i| i.product_id.is_some_and(|p| seeds.contains(&p)))
            .filter_map(|i| i.session_id)
            .collect();

        let mut votes: HashMap<ProductId, f64> = HashMap::new();
        for i in &snapshot.interactions {
            let (Some(s), Some(pid)) = (i.session_id, i.product_id) else {
                continue;
            };
            if related.contains(&s) && !seeds.contains(&pid) {
                *votes.entry(pid).or_default() += 1.0;
            }
        }
        votes.retain(|pid, _| snapshot.product(pid).is_some_and(|p| request.filter.allows(p)));

        let max = votes.values().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        let scored = votes
            .into_iter()
            .map(|(pid, v)| ScoredProduct::new(pid, v / max, "Viewed together with items in your session"))
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
    fn recommends_items_co_viewed_in_other_sessions() {
        let now = now();
        let (seed, partner, weak, unrelated) = (
            product("seed", "X", 1),
            product("partner", "X", 1),
            product("weak", "X", 1),
            product("unrelated", "X", 1),
        );
        let (mine, s1, s2, s3) = (SessionId::new(), SessionId::new(), SessionId::new(), SessionId::new());
        let view = InteractionType::View;
        let interactions = vec![
            in_session(event(None, seed.id, view, now), mine),
            in_session(event(None, seed.id, view, now), s1),
            in_session(event(None, partner.id, view, now), s1),
            in_session(event(None, seed.id, view, now), s2),
            in_session(event(None, partner.id, view, now), s2),
            in_session(event(None, weak.id, view, now), s2),
            in_session(event(None, unrelated.id, view, now), s3),
        ];
        let snap = snapshot(now, vec![seed, partner.clone(), weak.clone(), unrelated], interactions);

        let out = SessionEngine.recommend(&snap, &RecommendationRequest::new(None).in_session(Some(mine)));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].product_id, partner.id);
        assert_eq!(out[0].score, 1.0);
        assert_eq!(out[1].product_id, weak.id);
        assert_eq!(out[1].score, 0.5);
    }
}
