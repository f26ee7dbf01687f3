//! Structured model of an injected declaration file.
//!
//! Candidates are produced as `edit(baseline) → render`, never by splicing
//! strings, so every rendered text is a well-formed set of `declare module`
//! blocks.

pub mod edit;
pub mod parse;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub use edit::DeclEdit;
pub use parse::parse_declarations;

/// The maximally permissive type.
pub const ANY: &str = "any";

/// Catch-all value export emitted in every stub block.
pub const CATCH_ALL: &str = "__any";

/// Rest signature used for permissive function overloads.
pub const ANY_SIGNATURE: &str = "(...args: any[]): any";

/// Index signature used when widening interfaces.
pub const INDEX_SIGNATURE: &str = "[key: string]: any";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationFile {
    /// Comment lines rendered above the module blocks, without `//`.
    pub header: Vec<String>,
    /// Top-level statements outside any module block, kept verbatim.
    pub prelude: Vec<String>,
    pub modules: Vec<ModuleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleBlock {
    pub name: String,
    /// `declare module 'm';`: everything the module exports is `any`.
    pub shorthand: bool,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Member {
    /// `const __default: T; export default __default;`
    Default { ty: String },
    /// `export const name: T;`
    Value { name: String, ty: String },
    /// One `export function name…;` line per signature.
    Function { name: String, signatures: Vec<String> },
    /// `export type Name<params> = T;`
    TypeAlias {
        name: String,
        params: Option<String>,
        ty: String,
    },
    /// `export interface Name<head> { body }`
    Interface {
        name: String,
        head: String,
        body: Vec<String>,
    },
    /// `export namespace Name { body }`
    Namespace { name: String, body: Vec<String> },
    /// Anything else, kept as written.
    Raw { text: String },
}

impl Member {
    /// Export name, `default` for the default export.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default { .. } => Some("default"),
            Self::Value { name, .. }
            | Self::Function { name, .. }
            | Self::TypeAlias { name, .. }
            | Self::Interface { name, .. }
            | Self::Namespace { name, .. } => Some(name),
            Self::Raw { .. } => None,
        }
    }

    /// Whether the member lives in the value space (as opposed to types).
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Self::Default { .. } | Self::Value { .. } | Self::Function { .. } | Self::Namespace { .. }
        )
    }

    pub fn any_value(name: impl Into<String>) -> Self {
        Self::Value {
            name: name.into(),
            ty: ANY.into(),
        }
    }

    pub fn any_type(name: impl Into<String>) -> Self {
        Self::TypeAlias {
            name: name.into(),
            params: None,
            ty: ANY.into(),
        }
    }

    /// Number of top-level statements this member renders to.
    pub fn statement_count(&self) -> usize {
        match self {
            Self::Default { .. } => 2,
            Self::Function { signatures, .. } => signatures.len(),
            _ => 1,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Default { ty } => {
                let _ = writeln!(out, "  const __default: {ty};");
                out.push_str("  export default __default;\n");
            }
            Self::Value { name, ty } => {
                let _ = writeln!(out, "  export const {name}: {ty};");
            }
            Self::Function { name, signatures } => {
                for sig in signatures {
                    let _ = writeln!(out, "  export function {name}{sig};");
                }
            }
            Self::TypeAlias { name, params, ty } => {
                let params = params.as_deref().unwrap_or("");
                let _ = writeln!(out, "  export type {name}{params} = {ty};");
            }
            Self::Interface { name, head, body } => {
                let sep = if head.is_empty() || head.starts_with('<') { "" } else { " " };
                let head = if head.is_empty() { String::new() } else { format!("{head} ") };
                let _ = writeln!(out, "  export interface {name}{sep}{head}{{");
                for line in body {
                    let _ = writeln!(out, "    {line};");
                }
                out.push_str("  }\n");
            }
            Self::Namespace { name, body } => {
                let _ = writeln!(out, "  export namespace {name} {{");
                for line in body {
                    let _ = writeln!(out, "    {}", terminate(line));
                }
                out.push_str("  }\n");
            }
            Self::Raw { text } => {
                let _ = writeln!(out, "  {}", terminate(text));
            }
        }
    }
}

/// Append `;` unless the statement already ends a block or statement.
fn terminate(stmt: &str) -> String {
    let trimmed = stmt.trim_end();
    if trimmed.ends_with(';') || trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

impl ModuleBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shorthand: false,
            members: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name() == Some(name))
    }

    /// Value-space member with `name`, skipping same-named type aliases and
    /// interfaces.
    pub fn value_member(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.is_value() && m.name() == Some(name))
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.shorthand || self.member(name).is_some()
    }

    fn render(&self, out: &mut String) {
        let quoted = quote_module(&self.name);
        if self.shorthand {
            let _ = writeln!(out, "declare module {quoted};");
        } else {
            let _ = writeln!(out, "declare module {quoted} {{");
            for member in &self.members {
                member.render(out);
            }
            out.push_str("}\n");
        }
    }
}

/// Single-quoted module specifier with `\` and `'` escaped.
pub fn quote_module(name: &str) -> String {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl DeclarationFile {
    pub fn block(&self, module: &str) -> Option<&ModuleBlock> {
        self.modules.iter().find(|m| m.name == module)
    }

    pub fn block_mut(&mut self, module: &str) -> Option<&mut ModuleBlock> {
        self.modules.iter_mut().find(|m| m.name == module)
    }

    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Top-level statements across all blocks; a shorthand block counts as one.
    pub fn declaration_count(&self) -> usize {
        self.modules
            .iter()
            .map(|m| {
                if m.shorthand {
                    1
                } else {
                    m.members.iter().map(Member::statement_count).sum()
                }
            })
            .sum()
    }

    /// Deterministic text: header, prelude, then blocks sorted by module name.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            let _ = writeln!(out, "// {line}");
        }
        for stmt in &self.prelude {
            let _ = writeln!(out, "{}", terminate(stmt));
        }
        let mut blocks: Vec<&ModuleBlock> = self.modules.iter().collect();
        blocks.sort_by(|a, b| a.name.cmp(&b.name));
        for block in blocks {
            if !out.is_empty() {
                out.push('\n');
            }
            block.render(&mut out);
        }
        out
    }
}

// ── Identifier hygiene ─────────────────────────────────────────────

const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Whether `name` may be emitted as an exported binding.
pub fn is_bindable(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeclarationFile {
        DeclarationFile {
            header: vec!["generated".into()],
            prelude: vec![],
            modules: vec![
                ModuleBlock {
                    name: "zed".into(),
                    shorthand: true,
                    members: vec![],
                },
                ModuleBlock {
                    name: "alpha".into(),
                    shorthand: false,
                    members: vec![
                        Member::Default { ty: ANY.into() },
                        Member::any_value(CATCH_ALL),
                        Member::Function {
                            name: "run".into(),
                            signatures: vec![ANY_SIGNATURE.into(), "(x: number): void".into()],
                        },
                        Member::Interface {
                            name: "Opts".into(),
                            head: "<T> extends Base".into(),
                            body: vec!["a: T".into()],
                        },
                        Member::Namespace {
                            name: "run".into(),
                            body: vec!["export const helper: any".into()],
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn renders_sorted_blocks() {
        insta::assert_snapshot!(sample().render(), @r"
        // generated

        declare module 'alpha' {
          const __default: any;
          export default __default;
          export const __any: any;
          export function run(...args: any[]): any;
          export function run(x: number): void;
          export interface Opts<T> extends Base {
            a: T;
          }
          export namespace run {
            export const helper: any;
          }
        }

        declare module 'zed';
        ");
    }

    #[test]
    fn declaration_counts() {
        // default(2) + __any + two signatures + interface + namespace, plus shorthand
        assert_eq!(sample().declaration_count(), 8);
    }

    #[test]
    fn module_names_are_escaped() {
        assert_eq!(quote_module("it's"), "'it\\'s'");
        assert_eq!(quote_module("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn bindable_names() {
        assert!(is_bindable("foo"));
        assert!(is_bindable("$el"));
        assert!(is_bindable("_private2"));
        assert!(!is_bindable("default"));
        assert!(!is_bindable("class"));
        assert!(!is_bindable("2fast"));
        assert!(!is_bindable("kebab-case"));
        assert!(!is_bindable(""));
    }

    #[test]
    fn value_member_skips_types() {
        let block = ModuleBlock {
            name: "m".into(),
            shorthand: false,
            members: vec![Member::any_type("Foo"), Member::any_value("Foo")],
        };
        assert!(matches!(block.member("Foo"), Some(Member::TypeAlias { .. })));
        assert!(matches!(block.value_member("Foo"), Some(Member::Value { .. })));
    }
}
