//! Pairwise training export from trial logs.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::FeatureMap;
use crate::error::RerankError;
use crate::store::ProjectRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSide {
    pub candidate_id: String,
    pub features: FeatureMap,
}

/// One comparable pair. `label` is 1 when `a` ended with fewer core
/// diagnostics (then fewer total diagnostics) than `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub url: String,
    pub a: PairSide,
    pub b: PairSide,
    pub label: u8,
}

#[derive(Debug, Clone, Default)]
pub struct PairOptions {
    /// Cap on pairs emitted per project, `None` for all.
    pub max_pairs_per_project: Option<usize>,
    /// Keep trials whose injection was invalid.
    pub allow_invalid: bool,
}

/// Every pair `i < j` of logged trials per project, skipping pairs whose
/// outcomes tie on both keys.
pub fn export_pairs(records: &[ProjectRecord], opts: &PairOptions) -> Vec<PairRecord> {
    let mut out = Vec::new();
    for record in records {
        let trials: Vec<_> = record
            .trials
            .iter()
            .filter(|t| opts.allow_invalid || t.trial.valid_injection)
            .collect();
        let mut emitted = 0usize;
        'project: for (i, a) in trials.iter().enumerate() {
            for b in &trials[i + 1..] {
                if opts.max_pairs_per_project.is_some_and(|cap| emitted >= cap) {
                    break 'project;
                }
                let key_a = (a.trial.core_diagnostic_count, a.trial.total_diagnostic_count);
                let key_b = (b.trial.core_diagnostic_count, b.trial.total_diagnostic_count);
                if key_a == key_b {
                    continue;
                }
                out.push(PairRecord {
                    url: record.project.clone(),
                    a: PairSide {
                        candidate_id: a.trial.candidate_id.clone(),
                        features: a.features.clone(),
                    },
                    b: PairSide {
                        candidate_id: b.trial.candidate_id.clone(),
                        features: b.features.clone(),
                    },
                    label: u8::from(key_a < key_b),
                });
                emitted += 1;
            }
        }
    }
    out
}

pub fn write_pairs(path: &Path, pairs: &[PairRecord]) -> Result<(), RerankError> {
    let io_err = |source| RerankError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for pair in pairs {
        let line = serde_json::to_string(pair).map_err(|source| RerankError::Json {
            path: path.display().to_string(),
            source,
        })?;
        writeln!(writer, "{line}").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Read a pair export; blank lines are skipped.
pub fn read_pairs(path: &Path) -> Result<Vec<PairRecord>, RerankError> {
    let io_err = |source| RerankError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line).map_err(|source| RerankError::Json {
            path: path.display().to_string(),
            source,
        })?);
    }
    Ok(out)
}

/// Pairs grouped by project url, in url order.
pub fn by_project(pairs: &[PairRecord]) -> BTreeMap<&str, Vec<&PairRecord>> {
    let mut out: BTreeMap<&str, Vec<&PairRecord>> = BTreeMap::new();
    for pair in pairs {
        out.entry(pair.url.as_str()).or_default().push(pair);
    }
    out
}
