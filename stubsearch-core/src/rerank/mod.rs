//! Pairwise learned reranker: a logistic model over feature differences,
//! trained offline from trial logs and applied before candidates consume
//! oracle budget.

pub mod features;
pub mod pairs;
pub mod train;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RerankError;
use crate::types::Candidate;

pub use features::{FeatureContext, FeatureMap};
pub use pairs::{PairOptions, PairRecord, PairSide, export_pairs, read_pairs, write_pairs};
pub use train::{TrainOptions, TrainReport, train};

pub const MODEL_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub bias: f64,
    pub w: BTreeMap<String, f64>,
}

/// A trained pairwise preference model. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankerModel {
    pub version: u32,
    pub feature_keys: Vec<String>,
    pub weights: Weights,
    #[serde(default)]
    pub hyperparams: BTreeMap<String, serde_json::Value>,
}

impl RerankerModel {
    pub fn load(path: &Path) -> Result<Self, RerankError> {
        let text = std::fs::read_to_string(path).map_err(|source| RerankError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RerankError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), RerankError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| RerankError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json + "\n").map_err(|source| RerankError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Logit `bias + w·(a − b)` over the model's feature keys. Features
    /// absent from a map count as 0.
    pub fn logit(&self, a: &FeatureMap, b: &FeatureMap) -> f64 {
        let mut z = self.weights.bias;
        for key in &self.feature_keys {
            let Some(w) = self.weights.w.get(key) else {
                continue;
            };
            let diff = a.get(key).copied().unwrap_or(0.0) - b.get(key).copied().unwrap_or(0.0);
            z += w * diff;
        }
        z
    }

    /// `P(a preferred over b)`. `score(a, b) + score(b, a) == 1` holds only
    /// when the bias is 0.
    pub fn score(&self, a: &FeatureMap, b: &FeatureMap) -> f64 {
        sigmoid(self.logit(a, b))
    }
}

/// Logistic function, written so `sigmoid(-z) == 1 - sigmoid(z)` holds
/// without overflow at either tail.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Reorder non-baseline candidates by `P(candidate ≻ top1)`, best first,
/// ties by candidate id. Baseline candidates keep their place at the front.
pub fn rerank(
    top1: &Candidate,
    candidates: Vec<Candidate>,
    model: &RerankerModel,
    ctx: &FeatureContext,
) -> Vec<Candidate> {
    let reference = ctx.features(top1);
    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| (model.score(&ctx.features(&c), &reference), c))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });
    scored.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidatePool;
    use crate::decl::{DeclEdit, parse_declarations};
    use crate::types::{ModuleRank, StrategyTag};
    use proptest::prelude::*;

    fn model(w: &[(&str, f64)]) -> RerankerModel {
        RerankerModel {
            version: MODEL_VERSION,
            feature_keys: w.iter().map(|(k, _)| (*k).to_string()).collect(),
            weights: Weights {
                bias: 0.0,
                w: w.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            },
            hyperparams: BTreeMap::new(),
        }
    }

    fn fmap(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn sigmoid_tails_are_finite() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }

    #[test]
    fn missing_features_count_as_zero() {
        let m = model(&[("x", 2.0), ("y", -1.0)]);
        let a = fmap(&[("x", 1.0)]);
        let b = fmap(&[("y", 1.0), ("unknown", 99.0)]);
        assert!((m.logit(&a, &b) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn json_round_trip_preserves_scores_exactly() {
        let mut m = model(&[("a", 0.1 + 0.2), ("b", -1.0 / 3.0), ("c", 1e-17)]);
        m.hyperparams.insert("lr".into(), serde_json::json!(0.05));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        m.save(&path).unwrap();
        let back = RerankerModel::load(&path).unwrap();
        assert_eq!(back, m);

        let a = fmap(&[("a", 3.0), ("b", 7.0), ("c", 1.0)]);
        let b = fmap(&[("a", -1.0), ("c", 4.0)]);
        assert_eq!(back.score(&a, &b).to_bits(), m.score(&a, &b).to_bits());
    }

    #[test]
    fn load_reports_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(RerankerModel::load(&path), Err(RerankError::Json { .. })));
        assert!(matches!(
            RerankerModel::load(&dir.path().join("missing.json")),
            Err(RerankError::Io { .. })
        ));
    }

    #[test]
    fn rerank_orders_by_preference_then_id() {
        let baseline = parse_declarations(
            "declare module 'a' {\n  export const __any: any;\n}\n\ndeclare module 'b' {\n  export const __any: any;\n}\n",
        );
        let mut pool = CandidatePool::new(baseline, 8);
        pool.push(StrategyTag::AnyMod, DeclEdit::ModuleAny { modules: vec!["a".into()] }, None);
        pool.push(StrategyTag::AnyMod, DeclEdit::ModuleAny { modules: vec!["b".into()] }, None);
        pool.push(
            StrategyTag::AnyPair,
            DeclEdit::ModuleAny {
                modules: vec!["a".into(), "b".into()],
            },
            None,
        );
        let ranked = vec![
            ModuleRank {
                module: "a".into(),
                rank: 1,
                files: 1,
                errors: 1,
            },
            ModuleRank {
                module: "b".into(),
                rank: 2,
                files: 1,
                errors: 1,
            },
        ];
        let ctx = FeatureContext::new(&ranked, Vec::new(), BTreeMap::new(), &[], BTreeMap::new(), 2);
        // Prefers higher best-rank numbers; the pair ties with `a` and loses on id.
        let m = model(&[("override_best_rank", 1.0)]);
        let top1 = pool.top1().clone();
        let order: Vec<String> = rerank(&top1, pool.generated().to_vec(), &m, &ctx)
            .into_iter()
            .map(|c| c.candidate_id)
            .collect();
        assert_eq!(order, vec!["c002_anymod", "c001_anymod", "c003_anypair"]);
    }

    #[test]
    fn nonzero_bias_breaks_antisymmetry() {
        let mut m = model(&[("k", 1.0)]);
        m.weights.bias = 1.0;
        let f = fmap(&[("k", 2.0)]);
        // Identical features: both orders score sigmoid(bias).
        assert_eq!(m.score(&f, &f), sigmoid(1.0));
        assert!(m.score(&f, &f) + m.score(&f, &f) > 1.0);
    }

    proptest! {
        #[test]
        fn bias_free_score_is_antisymmetric(
            w in proptest::collection::vec(-5.0f64..5.0, 3),
            a in proptest::collection::vec(-10.0f64..10.0, 3),
            b in proptest::collection::vec(-10.0f64..10.0, 3),
        ) {
            let keys = ["k0", "k1", "k2"];
            let m = model(&keys.iter().zip(&w).map(|(k, v)| (*k, *v)).collect::<Vec<_>>());
            prop_assert_eq!(m.weights.bias, 0.0);
            let fa = fmap(&keys.iter().zip(&a).map(|(k, v)| (*k, *v)).collect::<Vec<_>>());
            let fb = fmap(&keys.iter().zip(&b).map(|(k, v)| (*k, *v)).collect::<Vec<_>>());
            let sum = m.score(&fa, &fb) + m.score(&fb, &fa);
            prop_assert!((sum - 1.0).abs() < 1e-12);
        }
    }
}
