//! Map a checker diagnostic position back to the import binding it is
//! about.
//!
//! Two site classes are understood. Property sites (`x.missing`,
//! `x["key"]`) resolve the accessed object to its root binding. Call sites
//! resolve the enclosing call's callee through member chains and record the
//! argument count. Anything else yields `None`; the caller treats that as
//! "no targeted repair for this diagnostic".
//!
//! Resolution is syntactic: it walks the tree-sitter tree and the file's
//! own import and `const x = f(…)` bindings, not the checker's symbol
//! tables. Names are matched by text, so a local that shadows an import is
//! taken for the import. Values reached through other files or through
//! types resolve to `None`.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Point};

use crate::helpers::{
    child_by_field, member_path, node_text, string_value, unwrap_expression, utf16_col_to_byte,
};
use crate::parse::ParsedSource;
use crate::ImportBinding;

/// Which structural question to ask about a diagnostic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteClass {
    Property,
    Call,
}

/// Number of arguments at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "count")]
pub enum CallArity {
    Exact(usize),
    /// At least one spread argument; the count is unknown.
    Spread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "site")]
pub enum ResolvedSite {
    /// `root.chain….property` where `root` is an import binding. With
    /// `via_call`, the object was the result of calling `root.chain…`.
    Property {
        binding: ImportBinding,
        chain: Vec<String>,
        property: Option<String>,
        via_call: bool,
    },
    /// A call or `new` whose callee is `root.chain…`.
    Call {
        binding: ImportBinding,
        chain: Vec<String>,
        arity: CallArity,
        via_call: bool,
    },
}

impl ResolvedSite {
    pub fn binding(&self) -> &ImportBinding {
        match self {
            Self::Property { binding, .. } | Self::Call { binding, .. } => binding,
        }
    }

    pub fn chain(&self) -> &[String] {
        match self {
            Self::Property { chain, .. } | Self::Call { chain, .. } => chain,
        }
    }

    pub fn chain_depth(&self) -> usize {
        self.chain().len()
    }

    pub fn via_call(&self) -> bool {
        match self {
            Self::Property { via_call, .. } | Self::Call { via_call, .. } => *via_call,
        }
    }
}

// Nodes a call-site search never climbs past.
const CALL_BOUNDARIES: &[&str] = &["statement_block", "class_body", "program"];

impl ParsedSource {
    /// Resolve the diagnostic at 1-based `line`/`column` (UTF-16 columns,
    /// as the checker reports them).
    pub fn resolve_site(&self, line: usize, column: usize, class: SiteClass) -> Option<ResolvedSite> {
        let node = self.node_at(line, column)?;
        match class {
            SiteClass::Property => self.resolve_property(node),
            SiteClass::Call => self.resolve_call(node),
        }
    }

    fn node_at(&self, line: usize, column: usize) -> Option<Node<'_>> {
        let row = line.checked_sub(1)?;
        let text = self.source.split('\n').nth(row)?;
        let point = Point {
            row,
            column: utf16_col_to_byte(text, column),
        };
        self.tree.root_node().named_descendant_for_point_range(point, point)
    }

    fn resolve_property(&self, node: Node<'_>) -> Option<ResolvedSite> {
        let access = enclosing_access(node)?;
        let object = child_by_field(access, "object")?;
        let property = match access.kind() {
            "member_expression" => {
                child_by_field(access, "property").map(|p| node_text(p, &self.source).to_string())
            }
            _ => child_by_field(access, "index").and_then(|i| string_value(i, &self.source)),
        };
        let (binding, chain, via_call) = self.resolve_root(object)?;
        Some(ResolvedSite::Property {
            binding,
            chain,
            property,
            via_call,
        })
    }

    fn resolve_call(&self, node: Node<'_>) -> Option<ResolvedSite> {
        let call = enclosing_call(node)?;
        let callee = match call.kind() {
            "new_expression" => child_by_field(call, "constructor")?,
            _ => child_by_field(call, "function")?,
        };
        let callee = unwrap_expression(callee);
        if matches!(callee.kind(), "call_expression" | "new_expression") {
            return None; // Curried calls are out of reach
        }
        let (binding, chain, via_call) = self.resolve_root(callee)?;
        Some(ResolvedSite::Call {
            binding,
            chain,
            arity: call_arity(call),
            via_call,
        })
    }

    /// Resolve an object/callee expression to `(binding, chain, via_call)`,
    /// following at most one call result.
    fn resolve_root(&self, expr: Node<'_>) -> Option<(ImportBinding, Vec<String>, bool)> {
        let expr = unwrap_expression(expr);
        let bindings = &self.bindings;

        let callee = match expr.kind() {
            "call_expression" => child_by_field(expr, "function"),
            "new_expression" => child_by_field(expr, "constructor"),
            _ => None,
        };
        if let Some(callee) = callee {
            let path = member_path(callee, &self.source)?;
            let binding = bindings.lookup(&path.root)?;
            return Some((binding.clone(), path.chain, true));
        }

        let path = member_path(expr, &self.source)?;
        if let Some(binding) = bindings.lookup(&path.root) {
            return Some((binding.clone(), path.chain, false));
        }
        let init = bindings.initializer(&path.root)?;
        let binding = bindings.lookup(&init.callee.root)?;
        Some((binding.clone(), init.callee.chain.clone(), true))
    }
}

/// The member or element access a property diagnostic points into.
fn enclosing_access(node: Node<'_>) -> Option<Node<'_>> {
    if matches!(node.kind(), "property_identifier" | "private_property_identifier") {
        let parent = node.parent()?;
        if parent.kind() == "member_expression" {
            return Some(parent);
        }
    }

    // Positioned at the start of the access (element access diagnostics):
    // take the outermost access whose object chain starts here.
    let mut current = node;
    let mut found = None;
    while let Some(parent) = current.parent() {
        let is_access = matches!(parent.kind(), "member_expression" | "subscript_expression");
        if !is_access || child_by_field(parent, "object") != Some(current) {
            if !is_wrapper(parent) {
                break;
            }
        } else {
            found = Some(parent);
        }
        current = parent;
    }
    found
}

fn is_wrapper(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "parenthesized_expression" | "non_null_expression" | "as_expression" | "satisfies_expression"
    )
}

/// The nearest call or `new` around `node`, falling back to the initializer
/// of an enclosing declaration or assignment.
fn enclosing_call(node: Node<'_>) -> Option<Node<'_>> {
    let mut fallback = None;
    let mut current = Some(node);
    while let Some(n) = current {
        match n.kind() {
            "call_expression" | "new_expression" => return Some(n),
            "variable_declarator" => {
                fallback = fallback.or_else(|| child_by_field(n, "value"));
            }
            "assignment_expression" => {
                fallback = fallback.or_else(|| child_by_field(n, "right"));
            }
            "return_statement" => {
                fallback = fallback.or_else(|| n.named_child(0));
            }
            kind if CALL_BOUNDARIES.contains(&kind) => break,
            _ => {}
        }
        current = n.parent();
    }
    let value = unwrap_expression(fallback?);
    matches!(value.kind(), "call_expression" | "new_expression").then_some(value)
}

fn call_arity(call: Node<'_>) -> CallArity {
    let Some(args) = child_by_field(call, "arguments") else {
        return CallArity::Exact(0);
    };
    let mut cursor = args.walk();
    let mut count = 0;
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "comment" => {}
            "spread_element" => return CallArity::Spread,
            _ => count += 1,
        }
    }
    CallArity::Exact(count)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parse::parse_source;
    use crate::ImportKind;

    fn parsed(source: &str) -> ParsedSource {
        parse_source(Path::new("src/index.ts"), source.to_string()).unwrap()
    }

    #[test]
    fn namespace_property_access() {
        let p = parsed("import * as pkg from 'pkg';\npkg.bar();\n");
        let site = p.resolve_site(2, 5, SiteClass::Property).unwrap();
        assert_eq!(
            site,
            ResolvedSite::Property {
                binding: ImportBinding::new("pkg", ImportKind::Namespace, "*", "pkg"),
                chain: vec![],
                property: Some("bar".into()),
                via_call: false,
            }
        );
    }

    #[test]
    fn nested_property_keeps_chain() {
        let p = parsed("import * as pkg from 'pkg';\nconst v = pkg.a.b.missing;\n");
        // "const v = pkg.a.b.missing": 'missing' starts at column 19
        let site = p.resolve_site(2, 19, SiteClass::Property).unwrap();
        assert_eq!(site.chain(), ["a", "b"]);
        assert_eq!(site.chain_depth(), 2);
        let ResolvedSite::Property { property, .. } = site else {
            panic!("expected property site");
        };
        assert_eq!(property.as_deref(), Some("missing"));
    }

    #[test]
    fn property_on_call_result() {
        let p = parsed(
            "import { createClient } from 'db';\nconst c = createClient();\nc.query;\n",
        );
        let site = p.resolve_site(3, 3, SiteClass::Property).unwrap();
        assert!(site.via_call());
        assert_eq!(site.binding().imported_name, "createClient");
        assert_eq!(site.binding().module, "db");
    }

    #[test]
    fn property_on_inline_call_result() {
        let p = parsed("import * as db from 'db';\ndb.open().query;\n");
        // "db.open().query": 'query' at column 11
        let site = p.resolve_site(2, 11, SiteClass::Property).unwrap();
        assert!(site.via_call());
        assert_eq!(site.chain(), ["open"]);
    }

    #[test]
    fn element_access_at_expression_start() {
        let p = parsed("import cfg from 'cfg';\nconst v = cfg[\"key\"];\n");
        let site = p.resolve_site(2, 11, SiteClass::Property).unwrap();
        let ResolvedSite::Property { binding, property, .. } = site else {
            panic!("expected property site");
        };
        assert_eq!(binding.kind, ImportKind::Default);
        assert_eq!(property.as_deref(), Some("key"));
    }

    #[test]
    fn call_site_with_chain_and_arity() {
        let p = parsed("import * as pkg from 'pkg';\npkg.util.run(1, 2);\n");
        let site = p.resolve_site(2, 17, SiteClass::Call).unwrap();
        assert_eq!(
            site,
            ResolvedSite::Call {
                binding: ImportBinding::new("pkg", ImportKind::Namespace, "*", "pkg"),
                chain: vec!["util".into(), "run".into()],
                arity: CallArity::Exact(2),
                via_call: false,
            }
        );
    }

    #[test]
    fn spread_call_and_wrappers() {
        let p = parsed("import f from 'f';\n(f as any)!(...args);\n");
        let site = p.resolve_site(2, 1, SiteClass::Call).unwrap();
        let ResolvedSite::Call { binding, arity, .. } = site else {
            panic!("expected call site");
        };
        assert_eq!(binding.local_name, "f");
        assert_eq!(arity, CallArity::Spread);
    }

    #[test]
    fn new_expression_site() {
        let p = parsed("import { Client } from 'db';\nconst c = new Client({ port: 1 });\n");
        // 'port' at column 24
        let site = p.resolve_site(2, 24, SiteClass::Call).unwrap();
        let ResolvedSite::Call { binding, arity, .. } = site else {
            panic!("expected call site");
        };
        assert_eq!(binding.imported_name, "Client");
        assert_eq!(arity, CallArity::Exact(1));
    }

    #[test]
    fn assignment_falls_back_to_initializer() {
        let p = parsed("import { make } from 'm';\nconst n: number = make('a');\n");
        let site = p.resolve_site(2, 7, SiteClass::Call).unwrap();
        assert_eq!(site.binding().imported_name, "make");
    }

    #[test]
    fn call_search_stops_at_blocks() {
        let p = parsed("import { on } from 'ev';\non('x', () => {\n  const y: number = 'a';\n});\n");
        assert!(p.resolve_site(3, 9, SiteClass::Call).is_none());
    }

    #[test]
    fn local_objects_do_not_resolve() {
        let p = parsed("const local = {};\nlocal.x;\n");
        assert!(p.resolve_site(2, 7, SiteClass::Property).is_none());
        assert!(p.resolve_site(9, 1, SiteClass::Property).is_none());
    }

    proptest::proptest! {
        #[test]
        fn any_position_resolves_or_declines(line in 0usize..6, col in 0usize..40, call in proptest::bool::ANY) {
            let p = parsed("import * as pkg from 'pkg';\nimport { make } from 'm';\npkg.a.b(make(1, 2));\nconst v: string = make();\n");
            let class = if call { SiteClass::Call } else { SiteClass::Property };
            if let Some(site) = p.resolve_site(line, col, class) {
                proptest::prop_assert!(["pkg", "m"].contains(&site.binding().module.as_str()));
            }
        }
    }
}
