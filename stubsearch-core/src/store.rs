//! Flat line-delimited JSON trial log: one [`ProjectRecord`] per project,
//! appended as each project finishes. Also writes the chosen patches.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use uuid::Uuid;

use crate::error::StoreError;
use crate::rerank::FeatureMap;
use crate::types::{Candidate, ModuleRank, SelectionOutcome, SymbolOverride, Trial};

/// The un-injected checker run of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSummary {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub counts: BTreeMap<String, usize>,
    pub core_total: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    /// Baseline-trial diagnostics the resolver was asked about.
    pub attempted: usize,
    /// Of those, how many resolved to an import binding.
    pub resolved: usize,
    /// Repair candidates that made it into the pool.
    pub candidates: usize,
}

/// One executed trial with its candidate's provenance and pre-trial features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    #[serde(flatten)]
    pub trial: Trial,
    pub strategy: String,
    pub features: FeatureMap,
    pub symbol_override: Option<SymbolOverride>,
    pub module_overrides: Option<BTreeSet<String>>,
    /// Unified diff against the baseline declaration text.
    pub diff_from_top1: Option<String>,
}

impl TrialRecord {
    /// Diagnostics beyond `diagnostics_limit` are dropped; counts stay exact.
    pub fn new(
        mut trial: Trial,
        candidate: &Candidate,
        features: FeatureMap,
        top1_text: &str,
        diagnostics_limit: usize,
    ) -> Self {
        trial.diagnostics.truncate(diagnostics_limit);
        let diff_from_top1 = (!candidate.is_baseline()).then(|| {
            TextDiff::from_lines(top1_text, &candidate.declaration_text)
                .unified_diff()
                .context_radius(2)
                .header("c000_top1", &candidate.candidate_id)
                .to_string()
        });
        Self {
            trial,
            strategy: candidate.strategy.as_str().to_string(),
            features,
            symbol_override: candidate.symbol_override.clone(),
            module_overrides: candidate.module_overrides.clone(),
            diff_from_top1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub run_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Set when the project was not searched at all.
    pub skip_reason: Option<String>,
    pub baseline: Option<BaselineSummary>,
    pub localized: Vec<ModuleRank>,
    pub stub_modules: Vec<String>,
    pub trials: Vec<TrialRecord>,
    pub outcome: Option<SelectionOutcome>,
    pub repair: RepairSummary,
}

impl ProjectRecord {
    pub fn new(run_id: &str, project: &Path, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            project: project.display().to_string(),
            started_at,
            duration_ms: 0,
            skip_reason: None,
            baseline: None,
            localized: Vec::new(),
            stub_modules: Vec::new(),
            trials: Vec::new(),
            outcome: None,
            repair: RepairSummary::default(),
        }
    }

    pub fn skipped(mut self, reason: &str) -> Self {
        self.skip_reason = Some(reason.to_string());
        self
    }

    pub fn chosen_trial(&self) -> Option<&TrialRecord> {
        let id = self.outcome.as_ref()?.chosen_candidate_id.as_deref()?;
        self.trials.iter().find(|t| t.trial.candidate_id == id)
    }
}

/// Append-only writer for one run's log file. Shared across project workers.
#[derive(Debug)]
pub struct TrialLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TrialLog {
    /// Create `<dir>/results-<YYYYmmddTHHMMSS>-<run8>.jsonl`.
    pub fn create(dir: &Path, run_id: &Uuid, now: DateTime<Utc>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let run8: String = run_id.simple().to_string().chars().take(8).collect();
        let path = dir.join(format!("results-{}-{run8}.jsonl", now.format("%Y%m%dT%H%M%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ProjectRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record).map_err(|source| StoreError::Serialization {
            path: self.path.display().to_string(),
            line: 0,
            source,
        })?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| StoreError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// Every record in a log file; blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<ProjectRecord>, StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| StoreError::Serialization {
            path: path.display().to_string(),
            line: idx + 1,
            source,
        })?;
        out.push(record);
    }
    Ok(out)
}

/// Write the chosen declaration to `<dir>/patches/<slug>.d.ts`.
pub fn write_patch(dir: &Path, project: &str, text: &str) -> Result<PathBuf, StoreError> {
    let patches = dir.join("patches");
    let path = patches.join(format!("{}.d.ts", slug(project)));
    std::fs::create_dir_all(&patches)
        .and_then(|()| std::fs::write(&path, text))
        .map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(path)
}

/// File-name-safe form of a project path or url.
pub fn slug(project: &str) -> String {
    let mut out = String::with_capacity(project.len());
    for c in project.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
pub(crate) fn test_record(project: &str) -> ProjectRecord {
    use chrono::TimeZone;
    let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    ProjectRecord::new("00000000-0000-4000-8000-000000000000", Path::new(project), started)
}
