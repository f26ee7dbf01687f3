//! Pre-trial candidate features. Nothing here may depend on a trial's
//! outcome: the same map is computed at search time, before the oracle runs.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Candidate, Diagnostic, ModuleRank, SymbolOverride};

pub type FeatureMap = BTreeMap<String, f64>;

/// Project-level facts every candidate's features are computed from.
#[derive(Debug, Clone, Default)]
pub struct FeatureContext {
    ranks: BTreeMap<String, ModuleRank>,
    core_codes: Vec<String>,
    baseline_counts: BTreeMap<String, usize>,
    baseline_core_total: usize,
    baseline_total: usize,
    /// Core diagnostic codes per file, from the un-injected run.
    file_codes: BTreeMap<String, BTreeMap<String, usize>>,
    /// External modules imported per diagnostic-bearing file.
    file_modules: BTreeMap<String, BTreeSet<String>>,
    top1_declaration_count: usize,
}

impl FeatureContext {
    /// `core_diagnostics` are the un-injected run's core diagnostics;
    /// `baseline_counts` holds every code's count from that run.
    pub fn new(
        ranked: &[ModuleRank],
        core_codes: impl IntoIterator<Item = String>,
        baseline_counts: BTreeMap<String, usize>,
        core_diagnostics: &[&Diagnostic],
        file_modules: BTreeMap<String, BTreeSet<String>>,
        top1_declaration_count: usize,
    ) -> Self {
        let mut file_codes: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for diag in core_diagnostics {
            *file_codes
                .entry(diag.file.clone())
                .or_default()
                .entry(diag.code.clone())
                .or_insert(0) += 1;
        }
        Self {
            ranks: ranked.iter().map(|r| (r.module.clone(), r.clone())).collect(),
            core_codes: core_codes.into_iter().collect(),
            baseline_total: baseline_counts.values().sum(),
            baseline_core_total: core_diagnostics.len(),
            baseline_counts,
            file_codes,
            file_modules,
            top1_declaration_count,
        }
    }

    pub fn features(&self, candidate: &Candidate) -> FeatureMap {
        let mut f = FeatureMap::new();
        f.insert("is_top1".into(), flag(candidate.is_baseline()));
        f.insert(format!("strategy_{}", candidate.strategy.as_str()), 1.0);

        let touched = candidate.touched_modules();
        let ranks: Vec<&ModuleRank> = touched.iter().filter_map(|m| self.ranks.get(*m)).collect();
        f.insert("override_modules".into(), count(touched.len()));
        f.insert(
            "override_best_rank".into(),
            count(ranks.iter().map(|r| r.rank).min().unwrap_or(0)),
        );
        f.insert("override_files".into(), count(ranks.iter().map(|r| r.files).sum()));
        f.insert("override_errors".into(), count(ranks.iter().map(|r| r.errors).sum()));

        f.insert("declaration_count".into(), count(candidate.declaration_count));
        f.insert(
            "declaration_delta".into(),
            count(candidate.declaration_count) - count(self.top1_declaration_count),
        );

        f.insert("baseline_core_total".into(), count(self.baseline_core_total));
        f.insert("baseline_total".into(), count(self.baseline_total));
        for code in &self.core_codes {
            let n = self.baseline_counts.get(code).copied().unwrap_or(0);
            f.insert(format!("baseline_{code}"), count(n));
        }

        for (code, n) in self.mentions(&touched) {
            f.insert(format!("mention_{code}"), count(n));
        }

        if let Some(SymbolOverride::RepairFromTop1 {
            code,
            arity,
            chain_depth,
            ..
        }) = &candidate.symbol_override
        {
            f.insert(format!("repair_code_{code}"), 1.0);
            f.insert("repair_arity".into(), arity.map_or(-1.0, count));
            f.insert("repair_chain_depth".into(), count(*chain_depth));
        }
        f
    }

    /// Core diagnostics by code in files importing any of `modules`.
    fn mentions(&self, modules: &BTreeSet<&str>) -> BTreeMap<&str, usize> {
        let mut out: BTreeMap<&str, usize> = self.core_codes.iter().map(|c| (c.as_str(), 0)).collect();
        if modules.is_empty() {
            return out;
        }
        for (file, imported) in &self.file_modules {
            if !imported.iter().any(|m| modules.contains(m.as_str())) {
                continue;
            }
            if let Some(codes) = self.file_codes.get(file) {
                for (code, n) in codes {
                    if let Some(slot) = out.get_mut(code.as_str()) {
                        *slot += n;
                    }
                }
            }
        }
        out
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[allow(clippy::cast_precision_loss)]
fn count(n: usize) -> f64 {
    n as f64
}
