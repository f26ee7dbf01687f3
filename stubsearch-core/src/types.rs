use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use stubsearch_graphs::{ImportBinding, ImportKind};

use crate::decl::DeclEdit;

// ── Diagnostics ────────────────────────────────────────────────────

/// One checker diagnostic. `line` and `col` are 1-based as printed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub code: String,
    pub message: String,
}

// ── Per-module import facts ────────────────────────────────────────

/// Everything the diagnostic-bearing files reference on one module.
///
/// Member accesses are keyed by export name: `default` for the default
/// binding, `*` for namespace/require bindings, otherwise the imported name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStubInfo {
    pub has_default_import: bool,
    pub has_namespace_import: bool,
    pub named_value_names: BTreeSet<String>,
    pub named_type_names: BTreeSet<String>,
    pub member_accesses_by_export_name: BTreeMap<String, BTreeSet<String>>,
    /// Observed argument counts of direct calls, keyed like member accesses.
    pub call_arities: BTreeMap<String, BTreeSet<usize>>,
}

impl ModuleStubInfo {
    /// Names the module is expected to export as values, namespace member
    /// accesses included.
    pub fn referenced_value_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.named_value_names.iter().map(String::as_str).collect();
        if let Some(members) = self.member_accesses_by_export_name.get("*") {
            names.extend(members.iter().map(String::as_str));
        }
        names
    }
}

/// A localized module with the frequencies that ranked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRank {
    pub module: String,
    /// 1-based position in the ranking.
    pub rank: usize,
    /// Distinct diagnostic-bearing files importing the module.
    pub files: usize,
    /// Core diagnostics located in those files.
    pub errors: usize,
}

// ── Candidates ─────────────────────────────────────────────────────

/// Reserved id of the baseline candidate.
pub const BASELINE_ID: &str = "c000_top1";

/// Which strategy produced a candidate; doubles as the id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyTag {
    Top1,
    Repair,
    AnyMod,
    AnyPair,
    AnyTopK,
    Idx,
    NsMerge,
    FnAny,
    Missing,
    Widen,
    TAny,
}

impl StrategyTag {
    pub const ALL: [Self; 11] = [
        Self::Top1,
        Self::Repair,
        Self::AnyMod,
        Self::AnyPair,
        Self::AnyTopK,
        Self::Idx,
        Self::NsMerge,
        Self::FnAny,
        Self::Missing,
        Self::Widen,
        Self::TAny,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top1 => "top1",
            Self::Repair => "repair",
            Self::AnyMod => "anymod",
            Self::AnyPair => "anypair",
            Self::AnyTopK => "anytopk",
            Self::Idx => "idx",
            Self::NsMerge => "nsmerge",
            Self::FnAny => "fnany",
            Self::Missing => "missing",
            Self::Widen => "widen",
            Self::TAny => "tany",
        }
    }

    /// Candidate id for the `seq`-th generated candidate.
    pub fn candidate_id(self, seq: usize) -> String {
        format!("c{seq:03}_{}", self.as_str())
    }
}

/// Targeted edit chosen from one resolved diagnostic of the baseline trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairOp {
    AddExport,
    ExportToAny,
    DefaultToAny,
    FunctionAnyOverload,
    NamespaceMerge,
}

/// Symbol-level provenance of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SymbolOverride {
    InterfaceIndexer {
        module: String,
        name: String,
    },
    NamespaceMembers {
        module: String,
        name: String,
        members: Vec<String>,
    },
    FunctionAnyOverload {
        module: String,
        name: String,
        arity: Option<usize>,
    },
    MissingExports {
        module: String,
        names: Vec<String>,
    },
    ExportToAny {
        module: String,
        name: String,
    },
    TypeToAny {
        module: String,
        name: String,
    },
    RepairFromTop1 {
        code: String,
        module: String,
        #[serde(rename = "symbolPath")]
        symbol_path: Vec<String>,
        operation: RepairOp,
        arity: Option<usize>,
        #[serde(rename = "chainDepth")]
        chain_depth: usize,
    },
}

impl SymbolOverride {
    pub fn module(&self) -> &str {
        match self {
            Self::InterfaceIndexer { module, .. }
            | Self::NamespaceMembers { module, .. }
            | Self::FunctionAnyOverload { module, .. }
            | Self::MissingExports { module, .. }
            | Self::ExportToAny { module, .. }
            | Self::TypeToAny { module, .. }
            | Self::RepairFromTop1 { module, .. } => module,
        }
    }
}

/// One hypothesis to verify against the oracle. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub candidate_id: String,
    pub strategy: StrategyTag,
    pub declaration_text: String,
    /// SHA-256 hex of `declaration_text`.
    pub declaration_hash: String,
    /// Top-level statements across all module blocks.
    pub declaration_count: usize,
    pub module_overrides: Option<BTreeSet<String>>,
    pub symbol_override: Option<SymbolOverride>,
    pub edit: Option<DeclEdit>,
}

impl Candidate {
    pub fn is_baseline(&self) -> bool {
        self.candidate_id == BASELINE_ID
    }

    /// Modules this candidate changes relative to the baseline.
    pub fn touched_modules(&self) -> BTreeSet<&str> {
        let mut out: BTreeSet<&str> = BTreeSet::new();
        if let Some(modules) = &self.module_overrides {
            out.extend(modules.iter().map(String::as_str));
        }
        if let Some(sym) = &self.symbol_override {
            out.insert(sym.module());
        }
        out
    }
}

// ── Trials ─────────────────────────────────────────────────────────

/// Why a trial can never be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidReason {
    Timeout,
    ParserDiagnostics,
    OracleCrash,
}

/// Result of executing one candidate. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    /// 1-based execution order within the project.
    pub trial_id: usize,
    pub candidate_id: String,
    pub injected_declaration_hash: String,
    pub declaration_count: usize,
    pub oracle_exit_code: Option<i32>,
    pub timed_out: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: BTreeMap<String, usize>,
    pub core_diagnostic_count: usize,
    pub total_diagnostic_count: usize,
    /// `core_diagnostic_count` minus the un-injected baseline core count.
    pub delta_from_baseline: i64,
    pub valid_injection: bool,
    pub invalid_reason: Option<InvalidReason>,
    pub duration_ms: u64,
}

// ── Selection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    BaselineClean,
    Improved,
    TieStreak,
    Exhausted,
    ProjectTimeout,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaselineClean => "baseline-clean",
            Self::Improved => "improved",
            Self::TieStreak => "tie-streak",
            Self::Exhausted => "exhausted",
            Self::ProjectTimeout => "project-timeout",
        }
    }
}

/// One per project run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionOutcome {
    pub chosen_candidate_id: Option<String>,
    pub trials_run: usize,
    pub stop_reason: StopReason,
}
