//! Candidate generation: the dedup-and-budget pool plus the strategies that
//! fill it.

pub mod repair;
pub mod sweep;
pub mod widen;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::StrategiesSection;
use crate::decl::{DeclEdit, DeclarationFile};
use crate::types::{BASELINE_ID, Candidate, ModuleRank, ModuleStubInfo, StrategyTag, SymbolOverride};

pub use repair::{RepairPlan, SiteResolver, TreeSitterResolver, plan_repairs};
pub use sweep::{ModuleSweep, TopKAtOnce};
pub use widen::SymbolWiden;

/// SHA-256 hex digest of declaration text.
pub fn declaration_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// What happened to one proposed edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Added(String),
    /// Same normalized edit or same rendered text as an earlier candidate.
    Duplicate,
    /// The edit does not apply to the baseline or changes nothing.
    Inapplicable,
    BudgetExhausted,
}

/// Candidates for one project run, baseline first. Every candidate's text
/// hash is unique within the pool.
#[derive(Debug)]
pub struct CandidatePool {
    baseline: DeclarationFile,
    top1: Candidate,
    budget: usize,
    seq: usize,
    keys: HashSet<String>,
    hashes: HashSet<String>,
    generated: Vec<Candidate>,
}

impl CandidatePool {
    /// `trial_max` counts the baseline, so at most `trial_max - 1` further
    /// candidates are accepted.
    pub fn new(baseline: DeclarationFile, trial_max: usize) -> Self {
        let text = baseline.render();
        let hash = declaration_hash(&text);
        let top1 = Candidate {
            candidate_id: BASELINE_ID.to_string(),
            strategy: StrategyTag::Top1,
            declaration_count: baseline.declaration_count(),
            declaration_text: text,
            declaration_hash: hash.clone(),
            module_overrides: None,
            symbol_override: None,
            edit: None,
        };
        Self {
            baseline,
            top1,
            budget: trial_max.saturating_sub(1),
            seq: 0,
            keys: HashSet::new(),
            hashes: HashSet::from([hash]),
            generated: Vec::new(),
        }
    }

    pub fn baseline(&self) -> &DeclarationFile {
        &self.baseline
    }

    pub fn top1(&self) -> &Candidate {
        &self.top1
    }

    pub fn generated(&self) -> &[Candidate] {
        &self.generated
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.generated.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Apply `edit` to the baseline and keep the result unless it is a
    /// duplicate, a no-op, or over budget.
    pub fn push(
        &mut self,
        tag: StrategyTag,
        edit: DeclEdit,
        symbol_override: Option<SymbolOverride>,
    ) -> PushOutcome {
        if self.is_full() {
            return PushOutcome::BudgetExhausted;
        }
        let key = edit.key();
        if !self.keys.insert(key.clone()) {
            return PushOutcome::Duplicate;
        }
        let Some(file) = edit.apply(&self.baseline) else {
            debug!(edit = %key, "Edit does not apply");
            return PushOutcome::Inapplicable;
        };
        let text = file.render();
        let hash = declaration_hash(&text);
        if !self.hashes.insert(hash.clone()) {
            debug!(edit = %key, "Edit renders to an existing declaration");
            return PushOutcome::Duplicate;
        }

        self.seq += 1;
        let id = tag.candidate_id(self.seq);
        let module_overrides = match &edit {
            DeclEdit::ModuleAny { modules } => Some(modules.iter().cloned().collect::<BTreeSet<_>>()),
            _ => None,
        };
        self.generated.push(Candidate {
            candidate_id: id.clone(),
            strategy: tag,
            declaration_count: file.declaration_count(),
            declaration_text: text,
            declaration_hash: hash,
            module_overrides,
            symbol_override,
            edit: Some(edit),
        });
        PushOutcome::Added(id)
    }

    /// Baseline followed by generated candidates in generation order.
    pub fn into_candidates(self) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(self.generated.len() + 1);
        out.push(self.top1);
        out.extend(self.generated);
        out
    }
}

/// Inputs every blind strategy reads.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub ranked: &'a [ModuleRank],
    pub infos: &'a BTreeMap<String, ModuleStubInfo>,
    pub config: &'a StrategiesSection,
}

/// A blind candidate strategy. Strategies only add to the pool.
pub trait CandidateStrategy: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Push candidates; returns how many were added.
    fn generate(&self, ctx: &StrategyContext<'_>, pool: &mut CandidatePool) -> usize;
}

/// Blind strategies enabled by `config`, in queueing order: sweep, top-K,
/// symbol widening.
pub fn blind_strategies(config: &StrategiesSection) -> Vec<Box<dyn CandidateStrategy>> {
    let mut out: Vec<Box<dyn CandidateStrategy>> = Vec::new();
    if config.sweep {
        out.push(Box::new(ModuleSweep {
            arity: config.sweep_arity,
        }));
    }
    if let Some(k) = config.top_k {
        out.push(Box::new(TopKAtOnce { k }));
    }
    if let Some(mode) = config.widen {
        out.push(Box::new(SymbolWiden {
            mode,
            max: config.symbol_widen_max,
            use_arity: config.widen_use_arity,
        }));
    }
    out
}

/// Run every blind strategy against the pool until the budget is spent.
pub fn generate_blind(ctx: &StrategyContext<'_>, pool: &mut CandidatePool) -> usize {
    let mut total = 0;
    for strategy in blind_strategies(ctx.config) {
        if pool.is_full() {
            break;
        }
        let added = strategy.generate(ctx, pool);
        debug!(strategy = strategy.name(), added, "Strategy finished");
        total += added;
    }
    total
}
