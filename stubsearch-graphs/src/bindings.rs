//! Import and `require` binding discovery over a parsed tree.
//!
//! Unlike the lexical extractor in core, this walks the real syntax tree so
//! the resolver can map a local identifier back to the binding that
//! introduced it.

use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use crate::helpers::{
    MemberPath, child_by_field, find_child_by_kind, has_token, member_path, node_range,
    node_text, string_value, unwrap_expression,
};
use crate::{ImportBinding, ImportKind, TextRange};

/// A local variable initialized by a call: `const c = createClient()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInitializer {
    pub callee: MemberPath,
    pub range: TextRange,
}

/// All bindings discovered in one file.
#[derive(Debug, Clone, Default)]
pub struct FileBindings {
    pub imports: Vec<ImportBinding>,
    pub initializers: HashMap<String, CallInitializer>,
}

impl FileBindings {
    /// The binding that introduced `local`, preferring value bindings over
    /// type-only ones.
    pub fn lookup(&self, local: &str) -> Option<&ImportBinding> {
        let mut candidates = self.imports.iter().filter(|b| b.local_name == local);
        let first = candidates.next()?;
        if !first.is_type_only {
            return Some(first);
        }
        candidates.find(|b| !b.is_type_only).or(Some(first))
    }

    pub fn initializer(&self, local: &str) -> Option<&CallInitializer> {
        self.initializers.get(local)
    }
}

/// Collect every import/require binding and call initializer in `tree`.
pub fn collect(tree: &Tree, source: &str) -> FileBindings {
    let mut out = FileBindings::default();
    let mut stack = vec![tree.root_node()];

    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => collect_import(node, source, &mut out.imports),
            "variable_declarator" => collect_declarator(node, source, &mut out),
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        // Reverse so nodes are visited in source order.
        stack.extend(children.into_iter().rev());
    }
    out
}

// ── import statements ──────────────────────────────────────────────

fn collect_import(node: Node<'_>, source: &str, out: &mut Vec<ImportBinding>) {
    if let Some(clause) = find_child_by_kind(node, "import_require_clause") {
        // import N = require('m')
        let module = child_by_field(clause, "source")
            .or_else(|| find_child_by_kind(clause, "string"))
            .and_then(|s| string_value(s, source));
        let local = find_child_by_kind(clause, "identifier");
        if let (Some(module), Some(local)) = (module, local) {
            out.push(ImportBinding::new(
                module,
                ImportKind::Require,
                "*",
                node_text(local, source),
            ));
        }
        return;
    }

    let Some(module) = child_by_field(node, "source").and_then(|s| string_value(s, source))
    else {
        return;
    };
    let Some(clause) = find_child_by_kind(node, "import_clause") else {
        return; // Side-effect import: import 'polyfill'
    };
    let type_only = has_token(node, "type");

    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(
                ImportBinding::new(&module, ImportKind::Default, "default", node_text(child, source))
                    .type_only(type_only),
            ),
            "namespace_import" => {
                if let Some(ident) = find_child_by_kind(child, "identifier") {
                    out.push(
                        ImportBinding::new(&module, ImportKind::Namespace, "*", node_text(ident, source))
                            .type_only(type_only),
                    );
                }
            }
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(name) = child_by_field(spec, "name") else {
                        continue;
                    };
                    let name = node_text(name, source);
                    let alias = child_by_field(spec, "alias").map_or(name, |n| node_text(n, source));
                    let spec_type_only = type_only || has_token(spec, "type");
                    out.push(
                        ImportBinding::new(&module, ImportKind::Named, name, alias)
                            .type_only(spec_type_only),
                    );
                }
            }
            _ => {}
        }
    }
}

// ── variable declarators ───────────────────────────────────────────

fn collect_declarator(node: Node<'_>, source: &str, out: &mut FileBindings) {
    let (Some(name), Some(value)) = (child_by_field(node, "name"), child_by_field(node, "value"))
    else {
        return;
    };
    let value = unwrap_expression(value);

    if let Some(module) = require_target(value, source) {
        collect_require_pattern(name, &module, source, &mut out.imports);
        return;
    }

    // const x = require('m').member
    if value.kind() == "member_expression" {
        if let (Some(object), Some(prop)) =
            (child_by_field(value, "object"), child_by_field(value, "property"))
        {
            if let Some(module) = require_target(unwrap_expression(object), source) {
                if name.kind() == "identifier" {
                    out.imports.push(ImportBinding::new(
                        module,
                        ImportKind::Named,
                        node_text(prop, source),
                        node_text(name, source),
                    ));
                }
                return;
            }
        }
    }

    if name.kind() != "identifier" {
        return; // Destructured call results are not tracked
    }
    let callee = match value.kind() {
        "call_expression" => child_by_field(value, "function"),
        "new_expression" => child_by_field(value, "constructor"),
        _ => None,
    };
    if let Some(path) = callee.and_then(|c| member_path(c, source)) {
        out.initializers.insert(
            node_text(name, source).to_string(),
            CallInitializer {
                callee: path,
                range: node_range(value),
            },
        );
    }
}

/// `require('m')` → `Some("m")`.
fn require_target(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = child_by_field(node, "function")?;
    if function.kind() != "identifier" || node_text(function, source) != "require" {
        return None;
    }
    let args = child_by_field(node, "arguments")?;
    let first = args.named_child(0)?;
    string_value(first, source)
}

fn collect_require_pattern(
    name: Node<'_>,
    module: &str,
    source: &str,
    out: &mut Vec<ImportBinding>,
) {
    match name.kind() {
        "identifier" => out.push(ImportBinding::new(
            module,
            ImportKind::Require,
            "*",
            node_text(name, source),
        )),
        "object_pattern" => {
            let mut cursor = name.walk();
            for prop in name.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier_pattern" => {
                        let n = node_text(prop, source);
                        out.push(ImportBinding::new(module, ImportKind::Named, n, n));
                    }
                    "pair_pattern" => {
                        let key = child_by_field(prop, "key");
                        let value = child_by_field(prop, "value");
                        if let (Some(key), Some(value)) = (key, value) {
                            if value.kind() == "identifier" {
                                out.push(ImportBinding::new(
                                    module,
                                    ImportKind::Named,
                                    node_text(key, source),
                                    node_text(value, source),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}
