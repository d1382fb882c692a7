//! A/B tests over recommendation strategies and placements.

use std::collections::BTreeMap;
use std::hash::Hasher;

use chrono::{DateTime, Utc};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{DomainError, DomainResult, Entity, RecordId, StoreId, percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    RecommendationAlgorithm,
    UiPlacement,
    Personalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Draft,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAbTest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub test_type: TestType,
    /// Variant name -> variant configuration.
    pub variants: BTreeMap<String, Value>,
    #[serde(default = "default_traffic")]
    pub traffic_percentage: u8,
    #[serde(default)]
    pub variant_weights: BTreeMap<String, f64>,
    #[serde(default = "default_metric")]
    pub primary_metric: String,
}

fn default_traffic() -> u8 {
    100
}

fn default_metric() -> String {
    "conversion_rate".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub participants: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestResults {
    pub metric: String,
    pub variants: BTreeMap<String, VariantResult>,
    pub winner: Option<String>,
    /// One-sided probability that the winner beats the runner-up.
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTest {
    pub id: RecordId,
    pub store_id: StoreId,
    pub name: String,
    pub description: String,
    pub test_type: TestType,
    pub variants: BTreeMap<String, Value>,
    pub traffic_percentage: u8,
    pub variant_weights: BTreeMap<String, f64>,
    pub status: TestStatus,
    pub primary_metric: String,
    pub results: Option<AbTestResults>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AbTest {
    pub fn create(store_id: StoreId, input: NewAbTest, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("test name cannot be empty"));
        }
        if input.variants.len() < 2 {
            return Err(DomainError::validation("a test needs at least two variants"));
        }
        if input.traffic_percentage > 100 {
            return Err(DomainError::validation("traffic_percentage must be 0-100"));
        }
        for (variant, weight) in &input.variant_weights {
            if !input.variants.contains_key(variant) {
                return Err(DomainError::validation(format!(
                    "weight given for unknown variant '{variant}'"
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(DomainError::validation("variant weights must be non-negative"));
            }
        }
        Ok(Self {
            id: RecordId::new(),
            store_id,
            name: name.to_string(),
            description: input.description,
            test_type: input.test_type,
            variants: input.variants,
            traffic_percentage: input.traffic_percentage,
            variant_weights: input.variant_weights,
            status: TestStatus::Draft,
            primary_metric: input.primary_metric,
            results: None,
            start_date: None,
            end_date: None,
            created_at: now,
        })
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != TestStatus::Draft {
            return Err(DomainError::validation("Test can only be started from draft status"));
        }
        self.status = TestStatus::Running;
        self.start_date = Some(now);
        Ok(())
    }

    pub fn pause(&mut self) -> DomainResult<()> {
        if self.status != TestStatus::Running {
            return Err(DomainError::validation("Test is not running"));
        }
        self.status = TestStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> DomainResult<()> {
        if self.status != TestStatus::Paused {
            return Err(DomainError::validation("Test is not paused"));
        }
        self.status = TestStatus::Running;
        Ok(())
    }

    /// Complete the test, scoring each variant from `outcomes`
    /// (participant external id -> converted).
    pub fn end(&mut self, outcomes: &BTreeMap<String, bool>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != TestStatus::Running {
            return Err(DomainError::validation("Test is not running"));
        }
        self.results = Some(self.score(outcomes, now));
        self.status = TestStatus::Completed;
        self.end_date = Some(now);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == TestStatus::Running
    }

    pub fn days_running(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.start_date) {
            (TestStatus::Running, Some(start)) => (now - start).num_days().max(0),
            _ => 0,
        }
    }

    /// Deterministic variant for a participant; `None` when outside the
    /// test's traffic share.
    pub fn assign(&self, participant: &str) -> Option<&str> {
        let id = self.id.to_string();
        let bucket = bucket_hash(&[id.as_bytes(), b":traffic:", participant.as_bytes()]) % 100;
        if bucket >= u64::from(self.traffic_percentage) {
            return None;
        }

        let weights: Vec<(&str, f64)> = self
            .variants
            .keys()
            .map(|name| {
                let w = if self.variant_weights.is_empty() {
                    1.0
                } else {
                    self.variant_weights.get(name).copied().unwrap_or(0.0)
                };
                (name.as_str(), w)
            })
            .collect();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return None;
        }

        let draw = bucket_hash(&[id.as_bytes(), b":variant:", participant.as_bytes()]) % 10_000;
        let point = draw as f64 / 10_000.0 * total;
        let mut acc = 0.0;
        for (name, w) in &weights {
            acc += w;
            if point < acc {
                return Some(*name);
            }
        }
        weights.iter().rev().find(|(_, w)| *w > 0.0).map(|(n, _)| *n)
    }

    fn score(&self, outcomes: &BTreeMap<String, bool>, now: DateTime<Utc>) -> AbTestResults {
        let mut variants: BTreeMap<String, VariantResult> = self
            .variants
            .keys()
            .map(|k| {
                (
                    k.clone(),
                    VariantResult {
                        participants: 0,
                        conversions: 0,
                        conversion_rate: 0.0,
                    },
                )
            })
            .collect();

        for (participant, converted) in outcomes {
            let Some(variant) = self.assign(participant) else {
                continue;
            };
            if let Some(r) = variants.get_mut(variant) {
                r.participants += 1;
                if *converted {
                    r.conversions += 1;
                }
            }
        }
        for r in variants.values_mut() {
            r.conversion_rate = percent(r.conversions as f64, r.participants as f64);
        }

        let mut ranked: Vec<(&String, &VariantResult)> =
            variants.iter().filter(|(_, r)| r.participants > 0).collect();
        ranked.sort_by(|a, b| b.1.conversion_rate.total_cmp(&a.1.conversion_rate));

        let winner = ranked.first().map(|(name, _)| (*name).clone());
        let confidence = match (ranked.first(), ranked.get(1)) {
            (Some((_, best)), Some((_, second))) => two_proportion_confidence(best, second),
            _ => 0.0,
        };

        AbTestResults {
            metric: self.primary_metric.clone(),
            variants,
            winner,
            confidence,
            computed_at: now,
        }
    }
}

impl Entity for AbTest {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn bucket_hash(parts: &[&[u8]]) -> u64 {
    let mut hasher = FnvHasher::default();
    for part in parts {
        hasher.write(part);
    }
    hasher.finish()
}

/// Pooled two-proportion z-test, reported as `Phi(z)`.
fn two_proportion_confidence(a: &VariantResult, b: &VariantResult) -> f64 {
    let (n1, n2) = (a.participants as f64, b.participants as f64);
    let (p1, p2) = (a.conversions as f64 / n1, b.conversions as f64 / n2);
    let pooled = (a.conversions + b.conversions) as f64 / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 {
        return if p1 > p2 { 1.0 } else { 0.5 };
    }
    normal_cdf((p1 - p2) / se)
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let y = 1.0
        - (((((1.061_405_429 * t - 1.453_152_027) * t) + 1.421_413_741) * t - 0.284_496_736) * t
            + 0.254_829_592)
            * t
            * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_test(traffic: u8) -> AbTest {
        AbTest::create(
            StoreId::new(),
            NewAbTest {
                name: "algo".into(),
                description: String::new(),
                test_type: TestType::RecommendationAlgorithm,
                variants: BTreeMap::from([
                    ("control".to_string(), json!({"algorithm": "popularity"})),
                    ("treatment".to_string(), json!({"algorithm": "hybrid"})),
                ]),
                traffic_percentage: traffic,
                variant_weights: BTreeMap::new(),
                primary_metric: default_metric(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn lifecycle_transitions() {
        let mut t = new_test(100);
        assert!(t.end(&BTreeMap::new(), Utc::now()).is_err());
        t.start(Utc::now()).unwrap();
        assert!(t.is_active());
        assert!(t.start(Utc::now()).is_err());
        t.pause().unwrap();
        t.resume().unwrap();
        t.end(&BTreeMap::new(), Utc::now()).unwrap();
        assert_eq!(t.status, TestStatus::Completed);
        assert_eq!(t.days_running(Utc::now()), 0);
    }

    #[test]
    fn create_requires_two_variants() {
        let mut input = NewAbTest {
            name: "x".into(),
            description: String::new(),
            test_type: TestType::UiPlacement,
            variants: BTreeMap::from([("only".to_string(), json!({}))]),
            traffic_percentage: 100,
            variant_weights: BTreeMap::new(),
            primary_metric: default_metric(),
        };
        assert!(AbTest::create(StoreId::new(), input.clone(), Utc::now()).is_err());
        input.variants.insert("b".into(), json!({}));
        input.variant_weights.insert("b".into(), -1.0);
        assert!(AbTest::create(StoreId::new(), input, Utc::now()).is_err());
    }

    #[test]
    fn assignment_is_deterministic_and_respects_traffic() {
        let t = new_test(100);
        for i in 0..50 {
            let p = format!("user-{i}");
            assert_eq!(t.assign(&p), t.assign(&p));
            assert!(t.assign(&p).is_some());
        }
        let closed = new_test(0);
        assert!(closed.assign("user-1").is_none());
    }

    #[test]
    fn traffic_and_variant_splits_follow_the_configured_shares() {
        let t = new_test(50);
        let assigned: Vec<_> = (0..4_000).filter_map(|i| t.assign(&format!("shopper-{i}"))).collect();
        assert!((1_600..=2_400).contains(&assigned.len()), "{}", assigned.len());
        let control = assigned.iter().filter(|v| **v == "control").count();
        let share = control as f64 / assigned.len() as f64;
        assert!((0.4..=0.6).contains(&share), "{share}");
    }

    #[test]
    fn zero_weight_variant_never_assigned() {
        let mut t = new_test(100);
        t.variant_weights = BTreeMap::from([("control".to_string(), 1.0), ("treatment".to_string(), 0.0)]);
        for i in 0..100 {
            assert_eq!(t.assign(&format!("u{i}")), Some("control"));
        }
    }

    #[test]
    fn results_pick_higher_converting_variant() {
        let mut t = new_test(100);
        t.start(Utc::now()).unwrap();
        let mut outcomes = BTreeMap::new();
        for i in 0..400 {
            let p = format!("u{i}");
            let converted = t.assign(&p) == Some("treatment") && i % 2 == 0;
            outcomes.insert(p, converted);
        }
        t.end(&outcomes, Utc::now()).unwrap();
        let results = t.results.unwrap();
        assert_eq!(results.winner.as_deref(), Some("treatment"));
        assert!(results.confidence > 0.99);
        let total: u64 = results.variants.values().map(|v| v.participants).sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
    }
}
