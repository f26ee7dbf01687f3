//! Symbol-level widening. One sub-mode per run; modules in ranked order and
//! names in lexicographic order, capped at `max` added candidates.

use std::collections::BTreeSet;

use crate::config::WidenMode;
use crate::decl::{ANY, CATCH_ALL, DeclEdit, Member, ModuleBlock};
use crate::types::{ModuleStubInfo, StrategyTag, SymbolOverride};

use super::{CandidatePool, CandidateStrategy, PushOutcome, StrategyContext};

#[derive(Debug, Clone, Copy)]
pub struct SymbolWiden {
    pub mode: WidenMode,
    pub max: usize,
    pub use_arity: bool,
}

impl SymbolWiden {
    fn tag(&self) -> StrategyTag {
        match self.mode {
            WidenMode::InterfaceIndexer => StrategyTag::Idx,
            WidenMode::NamespaceMembers => StrategyTag::NsMerge,
            WidenMode::FunctionAnyOverload => StrategyTag::FnAny,
            WidenMode::MissingExports => StrategyTag::Missing,
            WidenMode::ExportToAny => StrategyTag::Widen,
            WidenMode::TypeToAny => StrategyTag::TAny,
        }
    }

    /// Proposed edits for one module, already in name order.
    fn proposals(&self, block: &ModuleBlock, info: &ModuleStubInfo) -> Vec<(DeclEdit, SymbolOverride)> {
        let module = block.name.clone();
        match self.mode {
            WidenMode::InterfaceIndexer => type_names(block)
                .into_iter()
                .map(|name| {
                    (
                        DeclEdit::AddIndexSignature {
                            module: module.clone(),
                            name: name.clone(),
                        },
                        SymbolOverride::InterfaceIndexer {
                            module: module.clone(),
                            name,
                        },
                    )
                })
                .collect(),
            WidenMode::NamespaceMembers => info
                .member_accesses_by_export_name
                .iter()
                .filter(|(name, members)| {
                    name.as_str() != "default" && name.as_str() != "*" && !members.is_empty()
                })
                .map(|(name, members)| {
                    let members: Vec<String> = members.iter().cloned().collect();
                    (
                        DeclEdit::NamespaceMerge {
                            module: module.clone(),
                            name: name.clone(),
                            members: members.clone(),
                        },
                        SymbolOverride::NamespaceMembers {
                            module: module.clone(),
                            name: name.clone(),
                            members,
                        },
                    )
                })
                .collect(),
            WidenMode::FunctionAnyOverload => {
                let mut out = Vec::new();
                for name in value_names(block) {
                    let arities: Vec<Option<usize>> = match info.call_arities.get(&name) {
                        Some(set) if self.use_arity && !set.is_empty() => set.iter().copied().map(Some).collect(),
                        _ => vec![None],
                    };
                    for arity in arities {
                        out.push((
                            DeclEdit::FunctionAnyOverload {
                                module: module.clone(),
                                name: name.clone(),
                                arity,
                            },
                            SymbolOverride::FunctionAnyOverload {
                                module: module.clone(),
                                name: name.clone(),
                                arity,
                            },
                        ));
                    }
                }
                out
            }
            WidenMode::MissingExports => {
                let mut names: BTreeSet<String> = info
                    .referenced_value_names()
                    .into_iter()
                    .filter(|n| !block.has_export(n))
                    .map(str::to_string)
                    .collect();
                if info.has_default_import && !block.has_export("default") {
                    names.insert("default".into());
                }
                if names.is_empty() {
                    return Vec::new();
                }
                let names: Vec<String> = names.into_iter().collect();
                vec![(
                    DeclEdit::AddExports {
                        module: module.clone(),
                        names: names.clone(),
                    },
                    SymbolOverride::MissingExports { module, names },
                )]
            }
            WidenMode::ExportToAny => widenable_values(block)
                .into_iter()
                .map(|name| {
                    (
                        DeclEdit::ExportToAny {
                            module: module.clone(),
                            name: name.clone(),
                        },
                        SymbolOverride::ExportToAny {
                            module: module.clone(),
                            name,
                        },
                    )
                })
                .collect(),
            WidenMode::TypeToAny => type_names(block)
                .into_iter()
                .map(|name| {
                    (
                        DeclEdit::TypeToAny {
                            module: module.clone(),
                            name: name.clone(),
                        },
                        SymbolOverride::TypeToAny {
                            module: module.clone(),
                            name,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl CandidateStrategy for SymbolWiden {
    fn name(&self) -> &'static str {
        "symbol-widen"
    }

    fn generate(&self, ctx: &StrategyContext<'_>, pool: &mut CandidatePool) -> usize {
        let empty = ModuleStubInfo::default();
        let mut added = 0;
        for rank in ctx.ranked {
            let Some(block) = pool.baseline().block(&rank.module).cloned() else {
                continue;
            };
            if block.shorthand {
                continue;
            }
            let info = ctx.infos.get(&rank.module).unwrap_or(&empty);
            for (edit, symbol) in self.proposals(&block, info) {
                if added >= self.max {
                    return added;
                }
                match pool.push(self.tag(), edit, Some(symbol)) {
                    PushOutcome::Added(_) => added += 1,
                    PushOutcome::BudgetExhausted => return added,
                    PushOutcome::Duplicate | PushOutcome::Inapplicable => {}
                }
            }
        }
        added
    }
}

/// Interfaces and type aliases not already `any`.
fn type_names(block: &ModuleBlock) -> BTreeSet<String> {
    block
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Interface { name, .. } => Some(name.clone()),
            Member::TypeAlias { name, ty, .. } if ty != ANY => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn value_names(block: &ModuleBlock) -> BTreeSet<String> {
    block
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Value { name, .. } | Member::Function { name, .. } if name != CATCH_ALL => {
                Some(name.clone())
            }
            _ => None,
        })
        .collect()
}

/// Value exports whose declared type is not already `any`, plus `default`.
fn widenable_values(block: &ModuleBlock) -> BTreeSet<String> {
    block
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Default { ty } if ty != ANY => Some("default".to_string()),
            Member::Value { name, ty } if ty != ANY => Some(name.clone()),
            Member::Function { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}
