//! Offline trainer: pairwise logistic regression by SGD with an L2 penalty.

use std::collections::{BTreeMap, BTreeSet};

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::pairs::{PairRecord, by_project};
use super::{FeatureMap, MODEL_VERSION, RerankerModel, Weights, sigmoid};
use crate::error::RerankError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub epochs: usize,
    pub lr: f64,
    pub l2: f64,
    pub seed: u64,
    /// Probability that a project lands in the test split.
    pub test_frac: f64,
    /// Learn a bias term. Off by default: a nonzero bias makes
    /// `score(a, b) + score(b, a) != 1`, so search-time order would depend
    /// on which side the baseline is passed as.
    pub fit_bias: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 30,
            lr: 0.05,
            l2: 1e-4,
            seed: 0,
            test_frac: 0.2,
            fit_bias: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub train_projects: usize,
    pub test_projects: usize,
    pub train_pairs: usize,
    pub test_pairs: usize,
    pub train_accuracy: f64,
    /// `None` when the test split is empty.
    pub test_accuracy: Option<f64>,
}

/// A training example: `a − b` over the model's feature keys.
struct Example {
    diff: Vec<f64>,
    label: f64,
}

pub fn train(
    pairs: &[PairRecord],
    opts: &TrainOptions,
) -> Result<(RerankerModel, TrainReport), RerankError> {
    let feature_keys: Vec<String> = pairs
        .iter()
        .flat_map(|p| p.a.features.keys().chain(p.b.features.keys()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Projects are split, not pairs: pairs sharing a project share features.
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut train_set: Vec<&PairRecord> = Vec::new();
    let mut test_set: Vec<&PairRecord> = Vec::new();
    let (mut train_projects, mut test_projects) = (0, 0);
    for (_, project_pairs) in by_project(pairs) {
        if rng.r#gen::<f64>() < opts.test_frac {
            test_projects += 1;
            test_set.extend(project_pairs);
        } else {
            train_projects += 1;
            train_set.extend(project_pairs);
        }
    }
    if train_set.is_empty() {
        return Err(RerankError::NoPairs(format!(
            "{} pairs, none in the training split",
            pairs.len()
        )));
    }

    let mut examples: Vec<Example> = Vec::with_capacity(train_set.len() * 2);
    for pair in &train_set {
        let diff = difference(&feature_keys, &pair.a.features, &pair.b.features);
        let label = f64::from(pair.label);
        examples.push(Example {
            diff: diff.iter().map(|d| -d).collect(),
            label: 1.0 - label,
        });
        examples.push(Example { diff, label });
    }

    let mut w = vec![0.0; feature_keys.len()];
    let mut bias = 0.0;
    for _ in 0..opts.epochs {
        examples.shuffle(&mut rng);
        for ex in &examples {
            let p = sigmoid(bias + dot(&w, &ex.diff));
            let g = p - ex.label;
            for (wi, xi) in w.iter_mut().zip(&ex.diff) {
                *wi -= opts.lr * (g * xi + opts.l2 * *wi);
            }
            if opts.fit_bias {
                bias -= opts.lr * g;
            }
        }
    }

    let model = RerankerModel {
        version: MODEL_VERSION,
        weights: Weights {
            bias,
            w: feature_keys.iter().cloned().zip(w).collect(),
        },
        feature_keys,
        hyperparams: hyperparams(opts),
    };
    let report = TrainReport {
        train_projects,
        test_projects,
        train_pairs: train_set.len(),
        test_pairs: test_set.len(),
        train_accuracy: accuracy(&model, &train_set).unwrap_or(0.0),
        test_accuracy: accuracy(&model, &test_set),
    };
    info!(
        train_pairs = report.train_pairs,
        test_pairs = report.test_pairs,
        train_accuracy = report.train_accuracy,
        "Reranker trained"
    );
    Ok((model, report))
}

fn difference(keys: &[String], a: &FeatureMap, b: &FeatureMap) -> Vec<f64> {
    keys.iter()
        .map(|k| a.get(k).copied().unwrap_or(0.0) - b.get(k).copied().unwrap_or(0.0))
        .collect()
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

#[allow(clippy::cast_precision_loss)]
fn accuracy(model: &RerankerModel, pairs: &[&PairRecord]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let correct = pairs
        .iter()
        .filter(|p| {
            let predicted = model.score(&p.a.features, &p.b.features) >= 0.5;
            predicted == (p.label == 1)
        })
        .count();
    Some(correct as f64 / pairs.len() as f64)
}

fn hyperparams(opts: &TrainOptions) -> BTreeMap<String, serde_json::Value> {
    match serde_json::to_value(opts) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::PairSide;

    /// Candidates with fewer `errors` win.
    fn synthetic(projects: usize) -> Vec<PairRecord> {
        let mut out = Vec::new();
        for p in 0..projects {
            for i in 0..4u32 {
                let (ea, eb) = (f64::from(i), f64::from(i + 1 + (i % 2)));
                let label = u8::from(i % 2 == 0);
                let (fa, fb) = if label == 1 { (ea, eb) } else { (eb, ea) };
                out.push(PairRecord {
                    url: format!("https://example.com/p{p}"),
                    a: PairSide {
                        candidate_id: format!("c{i:03}_anymod"),
                        features: FeatureMap::from([("errors".to_string(), fa), ("noise".to_string(), 1.0)]),
                    },
                    b: PairSide {
                        candidate_id: format!("c{:03}_anymod", i + 1),
                        features: FeatureMap::from([("errors".to_string(), fb)]),
                    },
                    label,
                });
            }
        }
        out
    }

    #[test]
    fn learns_a_separable_preference() {
        let pairs = synthetic(10);
        let (model, report) = train(&pairs, &TrainOptions::default()).unwrap();
        assert_eq!(model.feature_keys, vec!["errors", "noise"]);
        assert!(model.weights.w["errors"] < 0.0);
        assert_eq!(model.weights.bias, 0.0);
        assert_eq!(report.train_accuracy, 1.0);
        assert_eq!(report.train_pairs + report.test_pairs, pairs.len());
        assert_eq!(report.train_projects + report.test_projects, 10);
        assert_eq!(model.hyperparams["epochs"], serde_json::json!(30));
    }

    #[test]
    fn training_is_seed_deterministic() {
        let pairs = synthetic(6);
        let opts = TrainOptions {
            seed: 7,
            ..TrainOptions::default()
        };
        let (a, ra) = train(&pairs, &opts).unwrap();
        let (b, rb) = train(&pairs, &opts).unwrap();
        assert_eq!(a, b);
        assert_eq!(ra, rb);
    }

    #[test]
    fn split_never_divides_a_project() {
        let pairs = synthetic(8);
        let (_, report) = train(
            &pairs,
            &TrainOptions {
                test_frac: 0.5,
                epochs: 1,
                ..TrainOptions::default()
            },
        )
        .unwrap();
        assert_eq!(report.train_pairs % 4, 0);
        assert_eq!(report.test_pairs % 4, 0);
    }

    #[test]
    fn empty_training_split_is_an_error() {
        assert!(matches!(train(&[], &TrainOptions::default()), Err(RerankError::NoPairs(_))));
        let all_test = TrainOptions {
            test_frac: 1.0,
            ..TrainOptions::default()
        };
        assert!(matches!(train(&synthetic(2), &all_test), Err(RerankError::NoPairs(_))));
    }
}
