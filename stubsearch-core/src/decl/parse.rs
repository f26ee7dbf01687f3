//! Parse declaration text (typically produced by an external adapter) into
//! the structured model so every strategy can edit it.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{DeclarationFile, Member, ModuleBlock};

static DEFAULT_CONST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:declare\s+)?const\s+__default\s*:\s*([\s\S]+)$").expect("valid regex")
});
static DEFAULT_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+default\s+__default$").expect("valid regex"));
static VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*:\s*([\s\S]+)$")
        .expect("valid regex")
});
static FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?function\s+([A-Za-z_$][\w$]*)\s*([<(][\s\S]*)$")
        .expect("valid regex")
});
static TYPE_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?type\s+([A-Za-z_$][\w$]*)\s*([\s\S]*)$")
        .expect("valid regex")
});
static INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?interface\s+([A-Za-z_$][\w$]*)([\s\S]*)$")
        .expect("valid regex")
});
static NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?namespace\s+([A-Za-z_$][\w$.]*)\s*\{([\s\S]*)\}$")
        .expect("valid regex")
});

const BLOCK_KEYWORDS: &[&str] = &[
    "module ", "namespace ", "interface ", "class ", "abstract class ", "enum ", "const enum ",
    "global",
];

/// Parse declaration text. Never fails: anything unrecognized is kept as a
/// raw statement, at top level or inside its module block.
pub fn parse_declarations(text: &str) -> DeclarationFile {
    let (statements, header) = split_statements(text, true);
    let mut file = DeclarationFile {
        header,
        ..DeclarationFile::default()
    };

    for stmt in statements {
        match parse_module_block(&stmt) {
            Some(block) => match file.block_mut(&block.name) {
                // Repeated blocks for one module merge in order.
                Some(existing) => {
                    existing.shorthand |= block.shorthand;
                    existing.members.extend(block.members);
                }
                None => file.modules.push(block),
            },
            None => file.prelude.push(stmt),
        }
    }
    file
}

fn parse_module_block(stmt: &str) -> Option<ModuleBlock> {
    let rest = stmt.strip_prefix("declare")?.trim_start();
    let rest = rest.strip_prefix("module")?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let (name, rest) = read_quoted(&rest[1..], quote)?;
    let rest = rest.trim();

    if rest.is_empty() {
        return Some(ModuleBlock {
            name,
            shorthand: true,
            members: Vec::new(),
        });
    }
    let body = rest.strip_prefix('{')?.strip_suffix('}')?;
    let mut block = ModuleBlock::new(name);
    let (statements, _) = split_statements(body, false);
    for stmt in statements {
        push_member(&mut block.members, classify(&stmt));
    }
    Some(block)
}

/// Read up to the closing `quote`, unescaping `\x`. Returns the value and
/// the text after the quote.
fn read_quoted(s: &str, quote: char) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?.1),
            c if c == quote => return Some((value, &s[i + 1..])),
            '\n' => return None,
            c => value.push(c),
        }
    }
    None
}

fn push_member(members: &mut Vec<Member>, member: Option<Member>) {
    let Some(member) = member else {
        return; // `export default __default` is implied by `Default`
    };
    if let Member::Function { name, signatures } = &member {
        let existing = members.iter_mut().find_map(|m| match m {
            Member::Function {
                name: n,
                signatures: s,
            } if n == name => Some(s),
            _ => None,
        });
        if let Some(existing) = existing {
            existing.extend(signatures.iter().cloned());
            return;
        }
    }
    members.push(member);
}

fn classify(stmt: &str) -> Option<Member> {
    if let Some(c) = DEFAULT_CONST.captures(stmt) {
        return Some(Member::Default {
            ty: c[1].trim().to_string(),
        });
    }
    if DEFAULT_EXPORT.is_match(stmt) {
        return None;
    }
    if let Some(c) = VALUE.captures(stmt) {
        return Some(Member::Value {
            name: c[1].to_string(),
            ty: c[2].trim().to_string(),
        });
    }
    if let Some(c) = FUNCTION.captures(stmt) {
        if !stmt.trim_end().ends_with('}') {
            return Some(Member::Function {
                name: c[1].to_string(),
                signatures: vec![c[2].trim().to_string()],
            });
        }
    }
    if let Some(c) = TYPE_ALIAS.captures(stmt) {
        if let Some(member) = type_alias(&c[1], &c[2]) {
            return Some(member);
        }
    }
    if let Some(c) = INTERFACE.captures(stmt) {
        if let Some(member) = interface(&c[1], &c[2]) {
            return Some(member);
        }
    }
    if let Some(c) = NAMESPACE.captures(stmt) {
        let (body, _) = split_statements(&c[2], false);
        return Some(Member::Namespace {
            name: c[1].to_string(),
            body,
        });
    }
    Some(Member::Raw {
        text: stmt.to_string(),
    })
}

fn type_alias(name: &str, rest: &str) -> Option<Member> {
    let rest = rest.trim();
    let (params, rest) = if rest.starts_with('<') {
        let end = matching_angle(rest)?;
        (Some(rest[..=end].to_string()), rest[end + 1..].trim_start())
    } else {
        (None, rest)
    };
    let ty = rest.strip_prefix('=')?.trim();
    if ty.is_empty() {
        return None;
    }
    Some(Member::TypeAlias {
        name: name.to_string(),
        params,
        ty: ty.to_string(),
    })
}

fn interface(name: &str, rest: &str) -> Option<Member> {
    let rest = rest.trim();
    let open = if rest.starts_with('<') {
        let end = matching_angle(rest)?;
        end + 1 + rest[end + 1..].find('{')?
    } else {
        rest.find('{')?
    };
    let body = rest[open + 1..].strip_suffix('}')?;
    Some(Member::Interface {
        name: name.to_string(),
        head: rest[..open].trim().to_string(),
        body: split_members(body),
    })
}

/// Index of the `>` closing the `<` at position 0. `=>` arrows inside are
/// not counted.
pub(super) fn matching_angle(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'=' => {}
            b'>' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Interface members: split on `;`, `,` and newlines at depth 0.
fn split_members(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in body.chars() {
        match c {
            '{' | '(' | '[' | '<' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            '>' if !current.ends_with('=') => depth -= 1,
            _ => {}
        }
        if depth <= 0 && matches!(c, ';' | ',' | '\n') {
            let item = current.trim().to_string();
            if !item.is_empty() {
                out.push(item);
            }
            current.clear();
            depth = 0;
            continue;
        }
        current.push(c);
    }
    let item = current.trim().to_string();
    if !item.is_empty() {
        out.push(item);
    }
    out
}

fn is_block_statement(stmt: &str) -> bool {
    let mut s = stmt.trim_start();
    for prefix in ["export ", "declare ", "default "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start();
        }
    }
    BLOCK_KEYWORDS.iter().any(|k| s.starts_with(k))
}

#[derive(Clone, Copy, PartialEq)]
enum Scan {
    Code,
    Str(char),
    LineComment,
    BlockComment,
}

/// Split text into top-level statements, dropping comments. Statements end
/// at `;` or at the `}` closing a block-form statement. With
/// `collect_header`, line comments before the first statement are returned.
fn split_statements(text: &str, collect_header: bool) -> (Vec<String>, Vec<String>) {
    let mut statements = Vec::new();
    let mut header = Vec::new();
    let mut current = String::new();
    let mut comment = String::new();
    let mut depth = 0usize;
    let mut angle = 0usize;
    let mut state = Scan::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Scan::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = Scan::LineComment;
                    comment.clear();
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Scan::BlockComment;
                }
                '\'' | '"' | '`' => {
                    current.push(c);
                    state = Scan::Str(c);
                }
                '{' | '(' | '[' => {
                    depth += 1;
                    current.push(c);
                }
                '<' => {
                    angle += 1;
                    current.push(c);
                }
                '>' => {
                    if !current.ends_with('=') {
                        angle = angle.saturating_sub(1);
                    }
                    current.push(c);
                }
                '}' | ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                    if c == '}' && depth == 0 && angle == 0 && is_block_statement(&current) {
                        flush(&mut current, &mut statements);
                    }
                }
                ';' if depth == 0 => flush(&mut current, &mut statements),
                _ => current.push(c),
            },
            Scan::Str(quote) => {
                current.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if c == quote {
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    if collect_header && statements.is_empty() && current.trim().is_empty() {
                        let line = comment.trim();
                        header.push(line.to_string());
                    }
                    current.push('\n');
                    state = Scan::Code;
                } else {
                    comment.push(c);
                }
            }
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = Scan::Code;
                }
            }
        }
    }
    flush(&mut current, &mut statements);
    (statements, header)
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let stmt = current.trim().to_string();
    if !stmt.is_empty() {
        statements.push(stmt);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::decl::{ANY_SIGNATURE, CATCH_ALL};

    #[test]
    fn parses_stub_shaped_text() {
        let text = "\
// generated header
declare module 'pkg' {
  const __default: any;
  export default __default;
  export const __any: any;
  export const run: any;
  export type Opts = any;
}

declare module \"other\";
";
        let file = parse_declarations(text);
        assert_eq!(file.header, vec!["generated header"]);
        assert_eq!(file.modules.len(), 2);
        let pkg = file.block("pkg").unwrap();
        assert_eq!(pkg.members.len(), 4);
        assert!(matches!(pkg.members[0], Member::Default { .. }));
        assert_eq!(pkg.members[1], Member::any_value(CATCH_ALL));
        assert_eq!(pkg.members[3], Member::any_type("Opts"));
        assert!(file.block("other").unwrap().shorthand);
    }

    #[test]
    fn parses_typed_adapter_output() {
        let text = "\
declare module 'lib' {
  export interface Options<T = {}> extends Base {
    timeout?: number;
    map: (x: T) => string
  }
  export function create(opts: Options): Client;
  export function create(): Client;
  export type Handler<E extends Event = Event> = (e: E) => void;
  export declare const VERSION: string;
  export namespace util {
    export function noop(): void;
  }
  export class Client { send(): void }
  export = Client;
}
";
        let file = parse_declarations(text);
        let lib = file.block("lib").unwrap();
        let Member::Interface { name, head, body } = &lib.members[0] else {
            panic!("expected interface, got {:?}", lib.members[0]);
        };
        assert_eq!(name, "Options");
        assert_eq!(head, "<T = {}> extends Base");
        assert_eq!(body, &vec!["timeout?: number".to_string(), "map: (x: T) => string".into()]);

        let Member::Function { signatures, .. } = &lib.members[1] else {
            panic!("expected function");
        };
        assert_eq!(signatures, &vec!["(opts: Options): Client".to_string(), "(): Client".into()]);

        assert_eq!(
            lib.members[2],
            Member::TypeAlias {
                name: "Handler".into(),
                params: Some("<E extends Event = Event>".into()),
                ty: "(e: E) => void".into(),
            }
        );
        assert_eq!(
            lib.members[3],
            Member::Value {
                name: "VERSION".into(),
                ty: "string".into()
            }
        );
        assert!(matches!(&lib.members[4], Member::Namespace { name, body } if name == "util" && body.len() == 1));
        assert!(matches!(&lib.members[5], Member::Raw { text } if text.starts_with("export class Client")));
        assert!(matches!(&lib.members[6], Member::Raw { text } if text == "export = Client"));
    }

    #[test]
    fn unknown_top_level_statements_go_to_prelude() {
        let file = parse_declarations("declare global { interface Window { x: any } }\ntype T = 1;\n");
        assert_eq!(file.prelude.len(), 2);
        assert!(file.modules.is_empty());
    }

    #[test]
    fn repeated_blocks_merge() {
        let file = parse_declarations(
            "declare module 'a' { export const x: any; }\ndeclare module 'a' { export const y: any; }\n",
        );
        assert_eq!(file.modules.len(), 1);
        assert_eq!(file.modules[0].members.len(), 2);
    }

    #[test]
    fn escaped_module_names() {
        let file = parse_declarations("declare module 'it\\'s' { export const x: any; }\n");
        assert_eq!(file.modules[0].name, "it's");
    }

    #[test]
    fn unterminated_block_stays_raw() {
        let file = parse_declarations("declare module 'a' {\n  export const x: any;\n");
        assert!(file.modules.is_empty());
        assert_eq!(file.prelude.len(), 1);
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_]{0,6}".prop_filter("bindable", |n| crate::decl::is_bindable(n))
    }

    fn arb_member() -> impl Strategy<Value = Member> {
        prop_oneof![
            Just(Member::Default { ty: "any".into() }),
            arb_name().prop_map(Member::any_value),
            arb_name().prop_map(Member::any_type),
            arb_name().prop_map(|name| Member::Function {
                name,
                signatures: vec![ANY_SIGNATURE.into(), "(a0: any): any".into()],
            }),
            arb_name().prop_map(|name| Member::Interface {
                name,
                head: String::new(),
                body: vec!["[key: string]: any".into()],
            }),
            arb_name().prop_map(|name| Member::Namespace {
                name,
                body: vec!["export const inner: any".into()],
            }),
        ]
    }

    fn arb_file() -> impl Strategy<Value = DeclarationFile> {
        prop::collection::btree_map(
            "[a-z@/-]{1,10}",
            (any::<bool>(), prop::collection::vec(arb_member(), 0..5)),
            1..4,
        )
        .prop_map(|blocks| DeclarationFile {
            header: vec!["generated".into()],
            prelude: vec![],
            modules: blocks
                .into_iter()
                .map(|(name, (shorthand, members))| {
                    let mut deduped: Vec<Member> = Vec::new();
                    for m in members {
                        if !deduped.iter().any(|d| d.name() == m.name()) {
                            deduped.push(m);
                        }
                    }
                    ModuleBlock {
                        name,
                        shorthand,
                        members: if shorthand { vec![] } else { deduped },
                    }
                })
                .collect(),
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn render_parse_is_stable(file in arb_file()) {
            let text = file.render();
            let reparsed = parse_declarations(&text);
            prop_assert_eq!(&reparsed, &file);
            prop_assert_eq!(reparsed.render(), text);
        }
    }
}
