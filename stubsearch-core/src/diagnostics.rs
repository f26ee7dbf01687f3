//! The checker's diagnostic line grammar and code taxonomy.
//!
//! This is the only module that looks at diagnostic text.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TaxonomySection;
use crate::types::Diagnostic;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)\((\d+),(\d+)\):\s+error\s+(TS\d{4,5}):\s+(.*)$").expect("valid regex")
});

static MISSING_MEMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Module '"([^"]+)"' has no exported member '([^']+)'"#).expect("valid regex")
});

static MISSING_DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Module '"([^"]+)"' has no default export"#).expect("valid regex")
});

/// Parse every diagnostic line in `output`. Unmatched lines (summaries,
/// continuation lines of multi-line messages) are ignored.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let caps = LINE_RE.captures(line)?;
            Some(Diagnostic {
                file: caps[1].trim().to_string(),
                line: caps[2].parse().ok()?,
                col: caps[3].parse().ok()?,
                code: caps[4].to_string(),
                message: caps[5].to_string(),
            })
        })
        .collect()
}

/// Parse the combined output of one checker run.
pub fn parse_output(stdout: &str, stderr: &str) -> Vec<Diagnostic> {
    parse_diagnostics(&format!("{stdout}\n{stderr}"))
}

/// `(module, export)` named by a missing-export diagnostic. A missing default
/// export is reported with the export name `default`.
pub fn missing_export(diag: &Diagnostic) -> Option<(String, String)> {
    if let Some(caps) = MISSING_MEMBER_RE.captures(&diag.message) {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }
    MISSING_DEFAULT_RE
        .captures(&diag.message)
        .map(|caps| (caps[1].to_string(), "default".to_string()))
}

/// Core and parser-level code sets.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    core: BTreeSet<String>,
    parser: BTreeSet<String>,
}

impl Taxonomy {
    pub fn new(core: impl IntoIterator<Item = String>, parser: impl IntoIterator<Item = String>) -> Self {
        Self {
            core: core.into_iter().collect(),
            parser: parser.into_iter().collect(),
        }
    }

    pub fn from_config(section: &TaxonomySection) -> Self {
        Self::new(section.core_codes.iter().cloned(), section.parser_codes.iter().cloned())
    }

    pub fn is_core(&self, code: &str) -> bool {
        self.core.contains(code)
    }

    pub fn is_parser(&self, code: &str) -> bool {
        self.parser.contains(code)
    }

    pub fn core_codes(&self) -> impl Iterator<Item = &str> {
        self.core.iter().map(String::as_str)
    }

    pub fn core_count(&self, diags: &[Diagnostic]) -> usize {
        diags.iter().filter(|d| self.is_core(&d.code)).count()
    }

    pub fn has_parser_codes(&self, diags: &[Diagnostic]) -> bool {
        diags.iter().any(|d| self.is_parser(&d.code))
    }

    pub fn core_diagnostics<'a>(&self, diags: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
        diags.iter().filter(|d| self.is_core(&d.code)).collect()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::from_config(&TaxonomySection::default())
    }
}

/// Occurrences per code.
pub fn code_counts(diags: &[Diagnostic]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for d in diags {
        *counts.entry(d.code.clone()).or_insert(0) += 1;
    }
    counts
}
