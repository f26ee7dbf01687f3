//! Edit descriptors: pure `DeclarationFile -> DeclarationFile` transforms.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::parse::matching_angle;
use super::{ANY, ANY_SIGNATURE, DeclarationFile, INDEX_SIGNATURE, Member, ModuleBlock, is_bindable};

/// One structured change to a declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DeclEdit {
    /// Replace each module's block with `declare module 'm';`.
    ModuleAny { modules: Vec<String> },
    /// Add `[key: string]: any` to an exported interface.
    AddIndexSignature { module: String, name: String },
    /// Merge a namespace of permissive members into a value export.
    NamespaceMerge {
        module: String,
        name: String,
        members: Vec<String>,
    },
    /// Prepend a permissive overload, arity-specific when known.
    FunctionAnyOverload {
        module: String,
        name: String,
        arity: Option<usize>,
    },
    /// Declare permissive value exports the block is missing.
    AddExports { module: String, names: Vec<String> },
    /// Rewrite a value export's type to `any` in place.
    ExportToAny { module: String, name: String },
    /// Rewrite a type alias or interface to an alias of `any`.
    TypeToAny { module: String, name: String },
    /// Rewrite the default export's type to `any`.
    DefaultToAny { module: String },
}

impl DeclEdit {
    /// Normalized description used for deduplication. Equivalent edits share
    /// a key regardless of argument order.
    pub fn key(&self) -> String {
        fn sorted(items: &[String]) -> String {
            let set: BTreeSet<&str> = items.iter().map(String::as_str).collect();
            set.into_iter().collect::<Vec<_>>().join(",")
        }
        match self {
            Self::ModuleAny { modules } => format!("module-any:{}", sorted(modules)),
            Self::AddIndexSignature { module, name } => format!("add-index-signature:{module}:{name}"),
            Self::NamespaceMerge {
                module,
                name,
                members,
            } => format!("namespace-merge:{module}:{name}:{}", sorted(members)),
            Self::FunctionAnyOverload {
                module,
                name,
                arity,
            } => match arity {
                Some(n) => format!("function-any-overload:{module}:{name}:{n}"),
                None => format!("function-any-overload:{module}:{name}:*"),
            },
            Self::AddExports { module, names } => format!("add-exports:{module}:{}", sorted(names)),
            Self::ExportToAny { module, name } if name == "default" => {
                format!("default-to-any:{module}")
            }
            Self::ExportToAny { module, name } => format!("export-to-any:{module}:{name}"),
            Self::TypeToAny { module, name } => format!("type-to-any:{module}:{name}"),
            Self::DefaultToAny { module } => format!("default-to-any:{module}"),
        }
    }

    /// Modules the edit touches.
    pub fn modules(&self) -> Vec<&str> {
        match self {
            Self::ModuleAny { modules } => modules.iter().map(String::as_str).collect(),
            Self::AddIndexSignature { module, .. }
            | Self::NamespaceMerge { module, .. }
            | Self::FunctionAnyOverload { module, .. }
            | Self::AddExports { module, .. }
            | Self::ExportToAny { module, .. }
            | Self::TypeToAny { module, .. }
            | Self::DefaultToAny { module } => vec![module.as_str()],
        }
    }

    /// Apply to `base`. `None` when the edit does not apply or would change
    /// nothing.
    pub fn apply(&self, base: &DeclarationFile) -> Option<DeclarationFile> {
        let mut file = base.clone();
        if let Self::ModuleAny { modules } = self {
            for module in modules {
                match file.block_mut(module) {
                    Some(block) => {
                        block.shorthand = true;
                        block.members.clear();
                    }
                    None => file.modules.push(ModuleBlock {
                        name: module.clone(),
                        shorthand: true,
                        members: Vec::new(),
                    }),
                }
            }
            return (file != *base).then_some(file);
        }

        let module = self.modules()[0];
        if let Self::AddExports { module, names } = self {
            if file.block(module).is_none() {
                file.modules.push(ModuleBlock::new(module.clone()));
            }
            let block = file.block_mut(module)?;
            return add_exports(block, names).then_some(file);
        }

        let block = file.block_mut(module)?;
        if block.shorthand {
            return None;
        }
        let changed = match self {
            Self::AddIndexSignature { name, .. } => add_index_signature(block, name),
            Self::NamespaceMerge { name, members, .. } => namespace_merge(block, name, members),
            Self::FunctionAnyOverload { name, arity, .. } => {
                let sig = arity.map_or_else(|| ANY_SIGNATURE.to_string(), arity_signature);
                function_overload(block, name, sig)
            }
            Self::ExportToAny { name, .. } if name == "default" => default_to_any(block),
            Self::ExportToAny { name, .. } => export_to_any(block, name),
            Self::TypeToAny { name, .. } => type_to_any(block, name),
            Self::DefaultToAny { .. } => default_to_any(block),
            Self::ModuleAny { .. } | Self::AddExports { .. } => false,
        };
        (changed && file != *base).then_some(file)
    }
}

/// `(a0: any, a1: any): any` for a call with `arity` arguments.
pub fn arity_signature(arity: usize) -> String {
    let params: Vec<String> = (0..arity).map(|i| format!("a{i}: any")).collect();
    format!("({}): any", params.join(", "))
}

fn value_index(block: &ModuleBlock, name: &str) -> Option<usize> {
    block
        .members
        .iter()
        .position(|m| matches!(m, Member::Value { .. } | Member::Function { .. }) && m.name() == Some(name))
}

fn namespace_index(block: &ModuleBlock, name: &str) -> Option<usize> {
    block
        .members
        .iter()
        .position(|m| matches!(m, Member::Namespace { name: n, .. } if n == name))
}

fn add_exports(block: &mut ModuleBlock, names: &[String]) -> bool {
    if block.shorthand {
        return false;
    }
    let before = block.members.len();
    let names: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    for name in names {
        if name == "default" {
            if block.member("default").is_none() {
                block.members.push(Member::Default { ty: ANY.into() });
            }
        } else if is_bindable(name) && block.value_member(name).is_none() {
            block.members.push(Member::any_value(name));
        }
    }
    block.members.len() > before
}

fn add_index_signature(block: &mut ModuleBlock, name: &str) -> bool {
    for member in &mut block.members {
        match member {
            Member::Interface { name: n, body, .. } if n == name => {
                if body.iter().any(|line| is_string_indexer(line)) {
                    return false;
                }
                body.push(INDEX_SIGNATURE.into());
                return true;
            }
            Member::TypeAlias { name: n, ty, .. } if n == name => {
                if ty == ANY {
                    return false;
                }
                *ty = format!("({ty}) & {{ {INDEX_SIGNATURE} }}");
                return true;
            }
            _ => {}
        }
    }
    false
}

fn is_string_indexer(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('[') && line.contains(": string]")
}

fn namespace_merge(block: &mut ModuleBlock, name: &str, members: &[String]) -> bool {
    if !is_bindable(name) {
        return false;
    }
    let wanted: BTreeSet<&str> = members.iter().map(String::as_str).filter(|m| is_bindable(m)).collect();
    if wanted.is_empty() {
        return false;
    }
    let lines = |existing: &[String]| -> Vec<String> {
        wanted
            .iter()
            .filter(|m| !existing.iter().any(|l| declares(l, m)))
            .map(|m| format!("export const {m}: any"))
            .collect()
    };

    if let Some(i) = namespace_index(block, name) {
        let Member::Namespace { body, .. } = &mut block.members[i] else {
            return false;
        };
        let added = lines(body);
        if added.is_empty() {
            return false;
        }
        body.extend(added);
        return true;
    }

    let namespace = Member::Namespace {
        name: name.into(),
        body: lines(&[]),
    };
    match value_index(block, name) {
        Some(i) => {
            // A namespace cannot merge with a const; the value becomes a
            // callable so the merge stays legal.
            if matches!(block.members[i], Member::Value { .. }) {
                block.members[i] = any_function(name);
            }
            block.members.insert(i + 1, namespace);
        }
        None => {
            block.members.push(any_function(name));
            block.members.push(namespace);
        }
    }
    true
}

fn declares(line: &str, member: &str) -> bool {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .any(|word| word == member)
}

fn any_function(name: &str) -> Member {
    Member::Function {
        name: name.into(),
        signatures: vec![ANY_SIGNATURE.into()],
    }
}

fn function_overload(block: &mut ModuleBlock, name: &str, sig: String) -> bool {
    if !is_bindable(name) {
        return false;
    }
    match value_index(block, name) {
        Some(i) => match &mut block.members[i] {
            Member::Function { signatures, .. } => {
                if signatures.contains(&sig) || signatures.iter().any(|s| s == ANY_SIGNATURE) {
                    return false;
                }
                signatures.insert(0, sig);
                true
            }
            Member::Value { ty, .. } if ty == ANY => false,
            member => {
                *member = Member::Function {
                    name: name.into(),
                    signatures: vec![sig],
                };
                true
            }
        },
        None => {
            let at = namespace_index(block, name).unwrap_or(block.members.len());
            block.members.insert(
                at,
                Member::Function {
                    name: name.into(),
                    signatures: vec![sig],
                },
            );
            true
        }
    }
}

fn export_to_any(block: &mut ModuleBlock, name: &str) -> bool {
    if let Some(i) = value_index(block, name) {
        if let Member::Value { ty, .. } = &mut block.members[i] {
            if ty == ANY {
                return false;
            }
            *ty = ANY.into();
            return true;
        }
        block.members[i] = Member::any_value(name);
        if let Some(ns) = namespace_index(block, name) {
            block.members.remove(ns);
        }
        return true;
    }
    match namespace_index(block, name) {
        Some(ns) => {
            block.members[ns] = Member::any_value(name);
            true
        }
        None => false,
    }
}

fn type_to_any(block: &mut ModuleBlock, name: &str) -> bool {
    let Some(i) = block
        .members
        .iter()
        .position(|m| matches!(m, Member::TypeAlias { .. } | Member::Interface { .. }) && m.name() == Some(name))
    else {
        return false;
    };
    let replacement = match &block.members[i] {
        Member::TypeAlias { ty, .. } if ty == ANY => return false,
        Member::TypeAlias { params, .. } => Member::TypeAlias {
            name: name.into(),
            params: params.clone(),
            ty: ANY.into(),
        },
        Member::Interface { head, .. } => Member::TypeAlias {
            name: name.into(),
            params: generic_params(head),
            ty: ANY.into(),
        },
        _ => return false,
    };
    block.members[i] = replacement;
    // Later declarations merging into the same interface go with it.
    let mut j = i + 1;
    while j < block.members.len() {
        if matches!(&block.members[j], Member::Interface { name: n, .. } if n == name) {
            block.members.remove(j);
        } else {
            j += 1;
        }
    }
    true
}

fn generic_params(head: &str) -> Option<String> {
    if !head.starts_with('<') {
        return None;
    }
    let end = matching_angle(head)?;
    Some(head[..=end].to_string())
}

fn default_to_any(block: &mut ModuleBlock) -> bool {
    for member in &mut block.members {
        if let Member::Default { ty } = member {
            if ty == ANY {
                return false;
            }
            *ty = ANY.into();
            return true;
        }
    }
    false
}
