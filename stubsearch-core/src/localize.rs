//! Rank external modules by how strongly the failing diagnostics implicate
//! them.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::LocalizeMode;
use crate::types::ModuleRank;

/// Accumulates per-module frequencies for one project run.
#[derive(Debug, Default)]
pub struct Localizer {
    files: BTreeMap<String, BTreeSet<String>>,
    errors: BTreeMap<String, usize>,
}

impl Localizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one diagnostic-bearing file, the modules it imports, and how
    /// many core diagnostics it carries.
    pub fn observe_file<'a>(
        &mut self,
        file: &str,
        modules: impl IntoIterator<Item = &'a str>,
        core_diagnostics: usize,
    ) {
        let modules: BTreeSet<&str> = modules.into_iter().collect();
        for module in modules {
            self.files
                .entry(module.to_string())
                .or_default()
                .insert(file.to_string());
            *self.errors.entry(module.to_string()).or_insert(0) += core_diagnostics;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Rank modules, descending by the mode's score, ties by module name.
    /// With `top_m`, modules past the first `top_m` are dropped.
    pub fn rank(&self, mode: LocalizeMode, top_m: Option<usize>) -> Vec<ModuleRank> {
        let mut scored: Vec<(usize, usize, &str)> = self
            .files
            .iter()
            .map(|(module, files)| {
                let errors = self.errors.get(module).copied().unwrap_or(0);
                (files.len(), errors, module.as_str())
            })
            .collect();

        scored.sort_by(|a, b| {
            let key = |s: &(usize, usize, &str)| match mode {
                LocalizeMode::PerFile => s.0,
                LocalizeMode::PerError => s.1,
            };
            key(b).cmp(&key(a)).then_with(|| a.2.cmp(b.2))
        });

        let limit = top_m.unwrap_or(usize::MAX);
        scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (files, errors, module))| ModuleRank {
                module: module.to_string(),
                rank: i + 1,
                files,
                errors,
            })
            .collect()
    }
}
