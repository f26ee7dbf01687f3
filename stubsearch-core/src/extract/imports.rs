//! Lexical import scanning.
//!
//! No syntax tree is built here: comments are masked, import and `require`
//! forms are matched with regexes, and member accesses / calls on the bound
//! names are collected textually. Malformed forms are skipped, so the
//! scanner may under-report but never invents a binding.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{ImportBinding, ImportKind};

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(type\s+)?([\w$*{},\s]+?)\s*\bfrom\s*['"]([^'"\n]+)['"]"#)
        .expect("valid import regex")
});

static IMPORT_EQUALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+([A-Za-z_$][\w$]*)\s*=\s*require\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#)
        .expect("valid import-equals regex")
});

static REQUIRE_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*require\s*\(\s*['"]([^'"\n]+)['"]\s*\)(\s*[.(\[?])?"#,
    )
    .expect("valid require regex")
});

static REQUIRE_DESTRUCTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:const|let|var)\s*\{([^{}]*)\}\s*=\s*require\s*\(\s*['"]([^'"\n]+)['"]\s*\)(\s*[.(\[?])?"#,
    )
    .expect("valid destructuring require regex")
});

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("valid identifier regex"));

/// Imports found in one file, plus what the file does with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileImports {
    pub bindings: Vec<ImportBinding>,
    /// Local name → members accessed as `local.member`.
    pub members: BTreeMap<String, BTreeSet<String>>,
    /// Local name → argument counts of direct calls `local(…)`.
    pub arities: BTreeMap<String, BTreeSet<usize>>,
}

impl FileImports {
    pub fn modules(&self) -> BTreeSet<&str> {
        self.bindings.iter().map(|b| b.module.as_str()).collect()
    }
}

/// Specifiers that name a package rather than a project path or alias.
pub fn is_external_specifier(spec: &str) -> bool {
    !spec.is_empty()
        && ![".", "/", "node:", "@/", "~/", "#"]
            .iter()
            .any(|prefix| spec.starts_with(prefix))
}

/// Scan one source text.
pub fn extract_imports(source: &str, max_members: usize) -> FileImports {
    let code = mask_comments(source);
    let mut out = FileImports::default();

    for caps in IMPORT_FROM.captures_iter(&code) {
        let type_only = caps.get(1).is_some();
        parse_import_clause(&caps[2], &caps[3], type_only, &mut out.bindings);
    }
    for caps in IMPORT_EQUALS.captures_iter(&code) {
        out.bindings
            .push(ImportBinding::new(&caps[2], ImportKind::Require, "*", &caps[1]));
    }
    // `require('m').x` and `require('m')(…)` bind something other than the
    // module object; they are skipped.
    for caps in REQUIRE_IDENT.captures_iter(&code) {
        if caps.get(3).is_some() {
            continue;
        }
        out.bindings
            .push(ImportBinding::new(&caps[2], ImportKind::Require, "*", &caps[1]));
    }
    for caps in REQUIRE_DESTRUCTURE.captures_iter(&code) {
        if caps.get(3).is_some() {
            continue;
        }
        for part in caps[1].split(',') {
            let (imported, local) = match part.split_once(':') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part.trim(), part.trim()),
            };
            if is_ident(imported) && is_ident(local) {
                out.bindings
                    .push(ImportBinding::new(&caps[2], ImportKind::Named, imported, local));
            }
        }
    }

    let body = mask_strings(&code);
    collect_usage(&body, max_members, &mut out);
    out
}

fn is_ident(s: &str) -> bool {
    IDENT.is_match(s)
}

/// `D`, `* as N`, `{ a, b as c, type T }`, or `D, {…}` / `D, * as N`.
fn parse_import_clause(clause: &str, module: &str, type_only: bool, out: &mut Vec<ImportBinding>) {
    let clause = clause.trim();
    let (head, named) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (&clause[..open], Some(&clause[open + 1..close])),
        (None, None) => (clause, None),
        _ => return,
    };

    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix('*') {
            let local = ns.trim().strip_prefix("as").map(str::trim);
            if let Some(local) = local.filter(|l| is_ident(l)) {
                out.push(ImportBinding::new(module, ImportKind::Namespace, "*", local).type_only(type_only));
            }
        } else if is_ident(part) {
            out.push(
                ImportBinding::new(module, ImportKind::Default, "default", part).type_only(type_only),
            );
        }
    }

    for spec in named.into_iter().flat_map(|n| n.split(',')) {
        let mut spec = spec.trim();
        let mut spec_type_only = type_only;
        if let Some(rest) = spec.strip_prefix("type ") {
            spec = rest.trim();
            spec_type_only = true;
        }
        let (imported, local) = match spec.split_once(" as ") {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (spec, spec),
        };
        if is_ident(imported) && is_ident(local) {
            out.push(
                ImportBinding::new(module, ImportKind::Named, imported, local)
                    .type_only(spec_type_only),
            );
        }
    }
}

/// Member accesses and call arities on every value binding.
fn collect_usage(body: &str, max_members: usize, out: &mut FileImports) {
    let locals: BTreeSet<&str> = out
        .bindings
        .iter()
        .filter(|b| !b.is_type_only)
        .map(|b| b.local_name.as_str())
        .collect();

    for local in locals {
        let escaped = regex::escape(local);
        let Ok(access) = Regex::new(&format!(
            r"(?:^|[^\w$.])\s*{escaped}\s*(?:\?\.|\.)\s*([A-Za-z_$][\w$]*)"
        )) else {
            continue;
        };
        let mut members = BTreeSet::new();
        for caps in access.captures_iter(body) {
            if members.len() >= max_members {
                break;
            }
            members.insert(caps[1].to_string());
        }
        if !members.is_empty() {
            out.members.insert(local.to_string(), members);
        }

        let Ok(call) = Regex::new(&format!(r"(?:^|[^\w$.]){escaped}\s*\(")) else {
            continue;
        };
        let mut arities = BTreeSet::new();
        for m in call.find_iter(body) {
            if arities.len() >= max_members {
                break;
            }
            if let Some(n) = count_arguments(&body[m.end()..]) {
                arities.insert(n);
            }
        }
        if !arities.is_empty() {
            out.arities.insert(local.to_string(), arities);
        }
    }
}

/// Count top-level arguments after an opening parenthesis. `None` for spread
/// arguments or unbalanced text.
fn count_arguments(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut commas = 0;
    let mut saw_token = false;
    let mut at_arg_start = true;
    for ch in rest.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                saw_token = true;
                at_arg_start = false;
            }
            ')' | ']' | '}' => {
                if depth == 0 {
                    if ch != ')' {
                        return None;
                    }
                    return Some(if saw_token { commas + 1 } else { 0 });
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                commas += 1;
                at_arg_start = true;
            }
            '.' if depth == 0 && at_arg_start => return None,
            c if c.is_whitespace() => {}
            _ => {
                saw_token = true;
                at_arg_start = false;
            }
        }
    }
    None
}

#[derive(Clone, Copy, PartialEq)]
enum Lex {
    Code,
    Str(char),
    LineComment,
    BlockComment,
}

/// Replace comment text with spaces, keeping newlines and byte offsets.
pub fn mask_comments(source: &str) -> String {
    mask(source, false)
}

/// Like [`mask_comments`], also blanking string literal contents.
fn mask_strings(source: &str) -> String {
    mask(source, true)
}

fn mask(source: &str, blank_strings: bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = Lex::Code;
    let mut chars = source.chars().peekable();
    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    };

    while let Some(c) = chars.next() {
        match state {
            Lex::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = Lex::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = Lex::BlockComment;
                }
                '\'' | '"' | '`' => {
                    out.push(c);
                    state = Lex::Str(c);
                }
                _ => out.push(c),
            },
            Lex::Str(quote) => {
                if c == '\\' {
                    let next = chars.next();
                    if blank_strings {
                        blank(&mut out, c);
                        if let Some(n) = next {
                            blank(&mut out, n);
                        }
                    } else {
                        out.push(c);
                        if let Some(n) = next {
                            out.push(n);
                        }
                    }
                } else if c == quote {
                    out.push(c);
                    state = Lex::Code;
                } else if c == '\n' && quote != '`' {
                    out.push(c);
                    state = Lex::Code;
                } else if blank_strings {
                    blank(&mut out, c);
                } else {
                    out.push(c);
                }
            }
            Lex::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = Lex::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            Lex::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = Lex::Code;
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(imports: &FileImports) -> Vec<(String, ImportKind, String, String, bool)> {
        imports
            .bindings
            .iter()
            .map(|b| {
                (
                    b.module.clone(),
                    b.kind,
                    b.imported_name.clone(),
                    b.local_name.clone(),
                    b.is_type_only,
                )
            })
            .collect()
    }

    #[test]
    fn es_import_forms() {
        let src = "\
import D from 'a';
import * as N from \"b\";
import { x, y as z, type T } from 'c';
import type { U } from 'd';
import type V from 'e';
import E, { w } from 'f';
import F, * as G from 'g';
import 'side-effect';
";
        let got = summary(&extract_imports(src, 64));
        let s = |m: &str, k, i: &str, l: &str, t| (m.to_string(), k, i.to_string(), l.to_string(), t);
        assert_eq!(
            got,
            vec![
                s("a", ImportKind::Default, "default", "D", false),
                s("b", ImportKind::Namespace, "*", "N", false),
                s("c", ImportKind::Named, "x", "x", false),
                s("c", ImportKind::Named, "y", "z", false),
                s("c", ImportKind::Named, "T", "T", true),
                s("d", ImportKind::Named, "U", "U", true),
                s("e", ImportKind::Default, "default", "V", true),
                s("f", ImportKind::Default, "default", "E", false),
                s("f", ImportKind::Named, "w", "w", false),
                s("g", ImportKind::Default, "default", "F", false),
                s("g", ImportKind::Namespace, "*", "G", false),
            ]
        );
    }

    #[test]
    fn multi_line_named_imports() {
        let src = "import {\n  alpha,\n  beta as b,\n} from '@scope/pkg';\n";
        let got = extract_imports(src, 64);
        let names: Vec<_> = got.bindings.iter().map(|b| b.imported_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(got.bindings[0].module, "@scope/pkg");
    }

    #[test]
    fn require_forms() {
        let src = "\
import fs = require('fs-extra');
const m = require('m');
const { a, b: c } = require('n');
";
        let got = summary(&extract_imports(src, 64));
        assert_eq!(got.len(), 4);
        assert_eq!(got[0].0, "fs-extra");
        assert_eq!(got[0].1, ImportKind::Require);
        assert_eq!(got[1].3, "m");
        assert_eq!((got[3].2.as_str(), got[3].3.as_str()), ("b", "c"));
    }

    #[test]
    fn require_results_used_in_place_are_not_bindings() {
        let src = "\
const helper = require('pkg').helper;
const make = require('factory')({ debug: true });
const first = require('list')[0];
const { run } = require('tasks').default;
const ok = require('ok');
helper.run();
ok.go();
";
        let got = extract_imports(src, 64);
        let locals: Vec<_> = got.bindings.iter().map(|b| b.local_name.as_str()).collect();
        assert_eq!(locals, vec!["ok"]);
        assert!(!got.members.contains_key("helper"));
        assert_eq!(got.members["ok"], BTreeSet::from(["go".to_string()]));
    }

    #[test]
    fn commented_imports_are_ignored() {
        let src = "// import A from 'a';\n/* import * as B from 'b'; */\nimport C from 'c';\n";
        let got = extract_imports(src, 64);
        assert_eq!(got.bindings.len(), 1);
        assert_eq!(got.bindings[0].module, "c");
    }

    #[test]
    fn malformed_imports_are_skipped() {
        let src = "import { a as } from 'x';\nimport {{ from 'y';\nimport 1bad from 'z';\n";
        let got = extract_imports(src, 64);
        assert!(got.bindings.is_empty(), "{:?}", got.bindings);
    }

    #[test]
    fn member_accesses_and_arities() {
        let src = "\
import * as pkg from 'pkg';
import { run } from 'runner';
pkg.foo();
pkg?.bar.baz;
const s = 'pkg.notAMember';
run(1, [2, 3], { a: 4 });
run();
run(...args);
xpkg.other;
";
        let got = extract_imports(src, 64);
        let pkg: Vec<_> = got.members["pkg"].iter().map(String::as_str).collect();
        assert_eq!(pkg, vec!["bar", "foo"]);
        let arities: Vec<_> = got.arities["run"].iter().copied().collect();
        assert_eq!(arities, vec![0, 3]);
        assert!(!got.members.contains_key("xpkg"));
    }

    #[test]
    fn member_cap_is_respected() {
        let mut src = String::from("import * as big from 'big';\n");
        for i in 0..100 {
            src.push_str(&format!("big.m{i};\n"));
        }
        let got = extract_imports(&src, 10);
        assert_eq!(got.members["big"].len(), 10);
    }

    #[test]
    fn external_specifiers() {
        for ext in ["react", "@scope/pkg", "lodash/fp"] {
            assert!(is_external_specifier(ext), "{ext}");
        }
        for local in ["./a", "../b", "/abs", "node:fs", "@/components", "~/lib", "#internal", ""] {
            assert!(!is_external_specifier(local), "{local}");
        }
    }

    #[test]
    fn masking_preserves_offsets() {
        let src = "a // c\n/* x\ny */ 'str'";
        let masked = mask_comments(src);
        assert_eq!(masked.len(), src.len());
        assert_eq!(masked.matches('\n').count(), 2);
        assert!(masked.contains("'str'"));
        assert!(!masked.contains('c'));
    }
}
