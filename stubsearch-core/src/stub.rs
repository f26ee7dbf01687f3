//! Baseline ("top1") declaration synthesis from extracted import facts.

use std::collections::BTreeMap;

use crate::decl::{ANY, CATCH_ALL, DeclarationFile, Member, ModuleBlock, is_bindable};
use crate::types::{ModuleRank, ModuleStubInfo};

const HEADER: &str = "Generated by stubsearch (baseline stub)";

/// One permissive block per localized module. Output is byte-identical for
/// identical inputs: blocks render sorted by module name, members sorted by
/// export name.
pub fn build_baseline(
    localized: &[ModuleRank],
    infos: &BTreeMap<String, ModuleStubInfo>,
) -> DeclarationFile {
    let empty = ModuleStubInfo::default();
    DeclarationFile {
        header: vec![HEADER.to_string()],
        prelude: Vec::new(),
        modules: localized
            .iter()
            .map(|rank| module_block(&rank.module, infos.get(&rank.module).unwrap_or(&empty)))
            .collect(),
    }
}

pub fn module_block(module: &str, info: &ModuleStubInfo) -> ModuleBlock {
    let mut block = ModuleBlock::new(module);
    if info.has_default_import {
        block.members.push(Member::Default { ty: ANY.into() });
    }
    block.members.push(Member::any_value(CATCH_ALL));

    // BTreeSet iteration is already sorted.
    for name in &info.named_value_names {
        if name != CATCH_ALL && is_bindable(name) {
            block.members.push(Member::any_value(name.as_str()));
        }
    }
    for name in &info.named_type_names {
        if is_bindable(name) {
            block.members.push(Member::any_type(name.as_str()));
        }
    }
    block
}
