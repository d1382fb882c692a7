use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use storerec_core::{CustomerId, ProductId};

use crate::recommender::Recommender;
use crate::request::RecommendationRequest;
use crate::snapshot::{InteractionFacts, StoreSnapshot};

/// Cut-off used for offline ranking metrics.
pub const EVALUATION_K: usize = 10;
/// Upper bound on shoppers replayed per evaluation.
pub const MAX_EVALUATED_USERS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub k: usize,
    pub evaluated_users: usize,
    pub hits: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub training_loss: f64,
}

/// Leave-last-out evaluation.
///
/// For each shopper with at least two distinct products, the most recently
/// touched product is hidden; the engine then ranks from the remaining history
/// and a hit is counted when the hidden product appears in the top `k`.
pub fn evaluate(engine: &dyn Recommender, snapshot: &StoreSnapshot, k: usize) -> EvaluationMetrics {
    let k = k.max(1);
    let mut histories: BTreeMap<CustomerId, Vec<&InteractionFacts>> = BTreeMap::new();
    for i in &snapshot.interactions {
        if let (Some(c), Some(_)) = (i.customer_id, i.product_id) {
            histories.entry(c).or_default().push(i);
        }
    }

    let mut evaluated = 0usize;
    let mut hits = 0usize;
    for (customer, history) in histories {
        if evaluated >= MAX_EVALUATED_USERS {
            break;
        }
        let mut distinct: Vec<ProductId> = history.iter().filter_map(|i| i.product_id).collect();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 2 {
            continue;
        }

        let Some(latest) = history
            .iter()
            .max_by(|a, b| a.at.cmp(&b.at).then(a.product_id.cmp(&b.product_id)))
        else {
            continue;
        };
        let (Some(held_out), session) = (latest.product_id, latest.session_id) else {
            continue;
        };

        let reduced = snapshot.retain_interactions(|i| {
            !(i.customer_id == Some(customer) && i.product_id == Some(held_out))
        });
        let request = RecommendationRequest::new(Some(k))
            .for_customer(Some(customer))
            .in_session(session);
        let request = RecommendationRequest { max_results: k, ..request };

        evaluated += 1;
        if engine
            .recommend(&reduced, &request)
            .iter()
            .any(|r| r.product_id == held_out)
        {
            hits += 1;
        }
    }

    metrics(k, evaluated, hits)
}

fn metrics(k: usize, evaluated: usize, hits: usize) -> EvaluationMetrics {
    if evaluated == 0 {
        return EvaluationMetrics {
            k,
            evaluated_users: 0,
            hits: 0,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            training_loss: 0.0,
        };
    }
    let recall = hits as f64 / evaluated as f64;
    let precision = hits as f64 / (evaluated * k) as f64;
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    EvaluationMetrics {
        k,
        evaluated_users: evaluated,
        hits,
        accuracy: recall,
        precision,
        recall,
        f1_score,
        training_loss: 1.0 - recall,
    }
}
