use tree_sitter::Node;

use crate::TextRange;

/// Extract the source text for a tree-sitter node.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Find the first child with a specific kind.
pub fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|child| child.kind() == kind)
}

/// Find a child by field name.
pub fn child_by_field<'a>(node: Node<'a>, field: &str) -> Option<Node<'a>> {
    node.child_by_field_name(field)
}

/// Whether `node` has an anonymous child token with the given text.
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token)
}

pub fn node_range(node: Node<'_>) -> TextRange {
    TextRange::from(node.range())
}

/// Value of a string literal node without its quotes.
pub fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" && node.kind() != "template_string" {
        return None;
    }
    let text = node_text(node, source);
    if text.len() < 2 {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    if node.kind() == "template_string" && inner.contains("${") {
        return None;
    }
    Some(inner.to_string())
}

/// Strip expression wrappers that do not change which symbol is referenced:
/// parentheses, `as`/`satisfies` assertions, `<T>x` assertions, non-null
/// `x!` and `await`.
pub fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    loop {
        let inner = match node.kind() {
            "parenthesized_expression" | "non_null_expression" | "await_expression" => {
                node.named_child(0)
            }
            "as_expression" | "satisfies_expression" => node.named_child(0),
            // `<T>expr`: the type comes first, the expression last.
            "type_assertion" => {
                let count = node.named_child_count();
                count.checked_sub(1).and_then(|i| node.named_child(i))
            }
            _ => None,
        };
        match inner {
            Some(next) => node = next,
            None => return node,
        }
    }
}

/// A dotted access path rooted at an identifier: `a.b.c` → `("a", ["b", "c"])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPath {
    pub root: String,
    pub chain: Vec<String>,
}

/// Walk a callee or object expression down to its root identifier.
///
/// Computed accesses with a literal key (`a["b"]`) count as members; any
/// other shape (calls, `this`, dynamic keys) yields `None`.
pub fn member_path(node: Node<'_>, source: &str) -> Option<MemberPath> {
    let node = unwrap_expression(node);
    match node.kind() {
        "identifier" => Some(MemberPath {
            root: node_text(node, source).to_string(),
            chain: Vec::new(),
        }),
        "member_expression" => {
            let object = child_by_field(node, "object")?;
            let property = child_by_field(node, "property")?;
            let mut path = member_path(object, source)?;
            path.chain.push(node_text(property, source).to_string());
            Some(path)
        }
        "subscript_expression" => {
            let object = child_by_field(node, "object")?;
            let index = child_by_field(node, "index")?;
            let key = string_value(index, source)?;
            let mut path = member_path(object, source)?;
            path.chain.push(key);
            Some(path)
        }
        _ => None,
    }
}

/// Convert a 1-based UTF-16 column, as reported by the checker, into a
/// 0-based byte column within `line`.
pub fn utf16_col_to_byte(line: &str, col: usize) -> usize {
    let target = col.saturating_sub(1);
    let mut units = 0;
    for (byte, ch) in line.char_indices() {
        if units >= target {
            return byte;
        }
        units += ch.len_utf16();
    }
    line.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(source: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    fn first_expression(tree: &tree_sitter::Tree) -> Node<'_> {
        let stmt = tree.root_node().named_child(0).unwrap();
        assert_eq!(stmt.kind(), "expression_statement");
        stmt.named_child(0).unwrap()
    }

    #[test]
    fn member_path_through_wrappers() {
        let source = "((pkg as any).a!)[\"b\"].c;";
        let tree = parse_ts(source);
        let path = member_path(first_expression(&tree), source).unwrap();
        assert_eq!(path.root, "pkg");
        assert_eq!(path.chain, vec!["a", "b", "c"]);
    }

    #[test]
    fn member_path_rejects_dynamic_keys() {
        let source = "pkg[key].c;";
        let tree = parse_ts(source);
        assert!(member_path(first_expression(&tree), source).is_none());
    }

    #[test]
    fn member_path_rejects_call_roots() {
        let source = "make().c;";
        let tree = parse_ts(source);
        assert!(member_path(first_expression(&tree), source).is_none());
    }

    #[test]
    fn utf16_columns() {
        assert_eq!(utf16_col_to_byte("abc", 1), 0);
        assert_eq!(utf16_col_to_byte("abc", 3), 2);
        // 'é' is two bytes but one UTF-16 unit.
        assert_eq!(utf16_col_to_byte("é.x", 2), 2);
        // Past the end clamps to the line length.
        assert_eq!(utf16_col_to_byte("ab", 10), 2);
    }

    proptest::proptest! {
        #[test]
        fn utf16_column_lands_on_char_boundary(line in "\\PC{0,24}", col in 0usize..40) {
            let byte = utf16_col_to_byte(&line, col);
            proptest::prop_assert!(byte <= line.len());
            proptest::prop_assert!(line.is_char_boundary(byte));
        }
    }

    #[test]
    fn string_values() {
        let source = "import x from 'pkg';";
        let tree = parse_ts(source);
        let stmt = tree.root_node().named_child(0).unwrap();
        let src = child_by_field(stmt, "source").unwrap();
        assert_eq!(string_value(src, source).as_deref(), Some("pkg"));
    }
}
