//! Module-level widening: rewrite whole blocks to `declare module 'm';`.

use crate::decl::DeclEdit;
use crate::types::StrategyTag;

use super::{CandidatePool, CandidateStrategy, PushOutcome, StrategyContext};

/// One candidate per localized module (`arity = 1`) or per pair of modules
/// (`arity = 2`), in ranked order.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSweep {
    pub arity: usize,
}

impl CandidateStrategy for ModuleSweep {
    fn name(&self) -> &'static str {
        "module-any-sweep"
    }

    fn generate(&self, ctx: &StrategyContext<'_>, pool: &mut CandidatePool) -> usize {
        let modules: Vec<&str> = ctx.ranked.iter().map(|r| r.module.as_str()).collect();
        let mut groups: Vec<(StrategyTag, Vec<String>)> = Vec::new();
        if self.arity >= 2 {
            for (i, a) in modules.iter().enumerate() {
                for b in &modules[i + 1..] {
                    groups.push((StrategyTag::AnyPair, vec![(*a).to_string(), (*b).to_string()]));
                }
            }
        } else {
            groups.extend(modules.iter().map(|m| (StrategyTag::AnyMod, vec![(*m).to_string()])));
        }

        let mut added = 0;
        for (tag, modules) in groups {
            match pool.push(tag, DeclEdit::ModuleAny { modules }, None) {
                PushOutcome::Added(_) => added += 1,
                PushOutcome::BudgetExhausted => break,
                PushOutcome::Duplicate | PushOutcome::Inapplicable => {}
            }
        }
        added
    }
}

/// A single candidate widening the first `k` ranked modules at once.
#[derive(Debug, Clone, Copy)]
pub struct TopKAtOnce {
    pub k: usize,
}

impl CandidateStrategy for TopKAtOnce {
    fn name(&self) -> &'static str {
        "top-k-at-once"
    }

    fn generate(&self, ctx: &StrategyContext<'_>, pool: &mut CandidatePool) -> usize {
        if self.k == 0 || ctx.ranked.is_empty() {
            return 0;
        }
        let modules = ctx.ranked.iter().take(self.k).map(|r| r.module.clone()).collect();
        usize::from(matches!(
            pool.push(StrategyTag::AnyTopK, DeclEdit::ModuleAny { modules }, None),
            PushOutcome::Added(_)
        ))
    }
}
