//! Targeted candidates from the baseline trial's own diagnostics.
//!
//! Each core diagnostic of the top1 trial is classified (property site,
//! call site, missing export), resolved back to the import binding it is
//! about, and mapped to one edit on that module's block. Diagnostics that do
//! not resolve are skipped; the blind strategies still cover them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stubsearch_graphs::parse::parse_file;
use stubsearch_graphs::{CallArity, ImportBinding, ImportKind, ParsedSource, ResolvedSite, SiteClass};
use tracing::debug;

use crate::decl::{DeclEdit, DeclarationFile};
use crate::diagnostics::{Taxonomy, missing_export};
use crate::extract::is_external_specifier;
use crate::types::{Diagnostic, RepairOp, SymbolOverride};

/// Maps a diagnostic position to the binding it is about.
pub trait SiteResolver: Send {
    fn resolve(&mut self, diag: &Diagnostic, class: SiteClass) -> Option<ResolvedSite>;
}

/// Resolver over the project's sources, parsed with the bundled grammars.
/// Each file is parsed at most once per project run.
#[derive(Debug)]
pub struct TreeSitterResolver {
    root: PathBuf,
    max_file_bytes: u64,
    cache: HashMap<PathBuf, Option<ParsedSource>>,
}

impl TreeSitterResolver {
    pub fn new(root: impl Into<PathBuf>, max_file_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_file_bytes,
            cache: HashMap::new(),
        }
    }

    fn parsed(&mut self, file: &str) -> Option<&ParsedSource> {
        let path = self.root.join(file);
        if !self.cache.contains_key(&path) {
            let parsed = load(&path, self.max_file_bytes);
            self.cache.insert(path.clone(), parsed);
        }
        self.cache.get(&path)?.as_ref()
    }
}

fn load(path: &Path, max_bytes: u64) -> Option<ParsedSource> {
    let meta = std::fs::metadata(path).ok()?;
    if meta.len() > max_bytes {
        debug!(path = %path.display(), "Skipping oversized file for site resolution");
        return None;
    }
    match parse_file(path) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot parse file for site resolution");
            None
        }
    }
}

impl SiteResolver for TreeSitterResolver {
    fn resolve(&mut self, diag: &Diagnostic, class: SiteClass) -> Option<ResolvedSite> {
        self.parsed(&diag.file)?.resolve_site(diag.line, diag.col, class)
    }
}

/// Which structural question a diagnostic code asks, if any.
pub fn site_class(code: &str) -> Option<SiteClass> {
    match code {
        "TS2339" | "TS7053" => Some(SiteClass::Property),
        "TS2345" | "TS2322" | "TS2554" | "TS2769" | "TS2353" | "TS2741" => Some(SiteClass::Call),
        _ => None,
    }
}

fn is_missing_export_code(code: &str) -> bool {
    matches!(code, "TS2305" | "TS2613" | "TS2614")
}

/// One targeted edit with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    pub edit: DeclEdit,
    pub symbol: SymbolOverride,
}

/// Planning counters, persisted with the project record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Core diagnostics with a repairable code.
    pub attempted: usize,
    /// Of those, how many mapped to a plan.
    pub resolved: usize,
    pub plans: Vec<RepairPlan>,
}

/// Plan repairs for the top1 trial's diagnostics, in diagnostic order.
/// Only modules with a block in `baseline` are targeted.
pub fn plan_repairs(
    diagnostics: &[Diagnostic],
    taxonomy: &Taxonomy,
    baseline: &DeclarationFile,
    resolver: &mut dyn SiteResolver,
    only_external: bool,
) -> RepairReport {
    let mut report = RepairReport::default();
    for diag in diagnostics.iter().filter(|d| taxonomy.is_core(&d.code)) {
        let plan = if is_missing_export_code(&diag.code) {
            report.attempted += 1;
            missing_export(diag).map(|(module, name)| RepairPlan {
                edit: DeclEdit::AddExports {
                    module: module.clone(),
                    names: vec![name.clone()],
                },
                symbol: provenance(diag, &module, vec![name], RepairOp::AddExport, None, 0),
            })
        } else if let Some(class) = site_class(&diag.code) {
            report.attempted += 1;
            resolver
                .resolve(diag, class)
                .and_then(|site| plan_for_site(diag, &site, baseline))
        } else {
            None
        };

        let Some(plan) = plan else {
            continue;
        };
        let module = plan.symbol.module();
        if baseline.block(module).is_none() || (only_external && !is_external_specifier(module)) {
            debug!(module, code = %diag.code, "Repair targets a module outside the baseline");
            continue;
        }
        report.resolved += 1;
        report.plans.push(plan);
    }
    report
}

fn provenance(
    diag: &Diagnostic,
    module: &str,
    symbol_path: Vec<String>,
    operation: RepairOp,
    arity: Option<usize>,
    chain_depth: usize,
) -> SymbolOverride {
    SymbolOverride::RepairFromTop1 {
        code: diag.code.clone(),
        module: module.to_string(),
        symbol_path,
        operation,
        arity,
        chain_depth,
    }
}

/// The export a binding's uses go through: `default`, the imported name, or
/// the first chain segment for module objects.
fn root_export(binding: &ImportBinding, chain: &[String]) -> Option<String> {
    if binding.is_module_object() {
        chain.first().cloned()
    } else if binding.kind == ImportKind::Default {
        Some("default".into())
    } else {
        Some(binding.imported_name.clone())
    }
}

fn widen_root(diag: &Diagnostic, binding: &ImportBinding, chain: &[String], path: Vec<String>) -> Option<RepairPlan> {
    let module = binding.module.clone();
    let name = root_export(binding, chain)?;
    let (edit, op) = if name == "default" {
        (DeclEdit::DefaultToAny { module: module.clone() }, RepairOp::DefaultToAny)
    } else {
        (
            DeclEdit::ExportToAny {
                module: module.clone(),
                name,
            },
            RepairOp::ExportToAny,
        )
    };
    Some(RepairPlan {
        edit,
        symbol: provenance(diag, &module, path, op, None, chain.len()),
    })
}

fn plan_for_site(diag: &Diagnostic, site: &ResolvedSite, baseline: &DeclarationFile) -> Option<RepairPlan> {
    let binding = site.binding();
    let module = binding.module.clone();
    let chain = site.chain();

    match site {
        ResolvedSite::Property { property, via_call, .. } => {
            let mut path: Vec<String> = chain.to_vec();
            path.extend(property.iter().cloned());
            if *via_call || !chain.is_empty() {
                return widen_root(diag, binding, chain, path);
            }
            if binding.is_module_object() {
                let prop = property.clone()?;
                let exists = baseline
                    .block(&module)
                    .is_some_and(|b| b.value_member(&prop).is_some());
                let (edit, op) = if exists {
                    (
                        DeclEdit::ExportToAny {
                            module: module.clone(),
                            name: prop.clone(),
                        },
                        RepairOp::ExportToAny,
                    )
                } else {
                    (
                        DeclEdit::AddExports {
                            module: module.clone(),
                            names: vec![prop.clone()],
                        },
                        RepairOp::AddExport,
                    )
                };
                return Some(RepairPlan {
                    edit,
                    symbol: provenance(diag, &module, vec![prop], op, None, 0),
                });
            }
            if binding.kind == ImportKind::Default {
                return widen_root(diag, binding, chain, path);
            }
            // Static-style access on a named import: `Foo.bar`.
            match property {
                Some(prop) => {
                    let name = binding.imported_name.clone();
                    Some(RepairPlan {
                        edit: DeclEdit::NamespaceMerge {
                            module: module.clone(),
                            name: name.clone(),
                            members: vec![prop.clone()],
                        },
                        symbol: provenance(diag, &module, vec![name, prop.clone()], RepairOp::NamespaceMerge, None, 0),
                    })
                }
                None => widen_root(diag, binding, chain, path),
            }
        }
        ResolvedSite::Call { arity, via_call, .. } => {
            let arity = match arity {
                CallArity::Exact(n) => Some(*n),
                CallArity::Spread => None,
            };
            if *via_call || binding.kind == ImportKind::Default {
                return widen_root(diag, binding, chain, chain.to_vec());
            }
            let target = if binding.is_module_object() {
                match chain {
                    [] => return None,
                    [name] => name.clone(),
                    _ => return widen_root(diag, binding, chain, chain.to_vec()),
                }
            } else if chain.is_empty() {
                binding.imported_name.clone()
            } else {
                let mut path = vec![binding.imported_name.clone()];
                path.extend(chain.iter().cloned());
                return widen_root(diag, binding, chain, path);
            };
            Some(RepairPlan {
                edit: DeclEdit::FunctionAnyOverload {
                    module: module.clone(),
                    name: target.clone(),
                    arity,
                },
                symbol: provenance(diag, &module, vec![target], RepairOp::FunctionAnyOverload, arity, chain.len()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::decl::parse_declarations;

    fn diag(file: &str, line: usize, col: usize, code: &str, message: &str) -> Diagnostic {
        Diagnostic {
            file: file.into(),
            line,
            col,
            code: code.into(),
            message: message.into(),
        }
    }

    fn baseline() -> DeclarationFile {
        parse_declarations(
            "declare module 'pkg' {\n  const __default: any;\n  export default __default;\n  export const __any: any;\n  export const foo: any;\n}\n",
        )
    }

    /// Resolver answering from a fixed table.
    struct Fixed(Vec<ResolvedSite>);

    impl SiteResolver for Fixed {
        fn resolve(&mut self, _diag: &Diagnostic, _class: SiteClass) -> Option<ResolvedSite> {
            if self.0.is_empty() { None } else { Some(self.0.remove(0)) }
        }
    }

    fn namespace() -> ImportBinding {
        ImportBinding::new("pkg", ImportKind::Namespace, "*", "pkg")
    }

    fn plan_one(site: ResolvedSite, code: &str) -> Option<RepairPlan> {
        let mut resolver = Fixed(vec![site]);
        let report = plan_repairs(
            &[diag("a.ts", 1, 1, code, "")],
            &Taxonomy::default(),
            &baseline(),
            &mut resolver,
            true,
        );
        report.plans.into_iter().next()
    }

    #[test]
    fn namespace_property_adds_export() {
        let plan = plan_one(
            ResolvedSite::Property {
                binding: namespace(),
                chain: vec![],
                property: Some("bar".into()),
                via_call: false,
            },
            "TS2339",
        )
        .unwrap();
        assert_eq!(
            plan.edit,
            DeclEdit::AddExports {
                module: "pkg".into(),
                names: vec!["bar".into()]
            }
        );
        assert!(matches!(
            plan.symbol,
            SymbolOverride::RepairFromTop1 { operation: RepairOp::AddExport, ref symbol_path, .. } if symbol_path == &vec!["bar".to_string()]
        ));
    }

    #[test]
    fn existing_export_is_widened_instead() {
        let plan = plan_one(
            ResolvedSite::Property {
                binding: namespace(),
                chain: vec![],
                property: Some("foo".into()),
                via_call: false,
            },
            "TS2339",
        )
        .unwrap();
        assert!(matches!(plan.edit, DeclEdit::ExportToAny { ref name, .. } if name == "foo"));
    }

    #[test]
    fn named_static_access_merges_namespace() {
        let plan = plan_one(
            ResolvedSite::Property {
                binding: ImportBinding::new("pkg", ImportKind::Named, "Foo", "F"),
                chain: vec![],
                property: Some("bar".into()),
                via_call: false,
            },
            "TS2339",
        )
        .unwrap();
        assert_eq!(
            plan.edit,
            DeclEdit::NamespaceMerge {
                module: "pkg".into(),
                name: "Foo".into(),
                members: vec!["bar".into()]
            }
        );
    }

    #[test]
    fn call_sites_map_to_overloads() {
        let plan = plan_one(
            ResolvedSite::Call {
                binding: namespace(),
                chain: vec!["run".into()],
                arity: CallArity::Exact(2),
                via_call: false,
            },
            "TS2554",
        )
        .unwrap();
        assert_eq!(
            plan.edit,
            DeclEdit::FunctionAnyOverload {
                module: "pkg".into(),
                name: "run".into(),
                arity: Some(2)
            }
        );
        assert!(matches!(plan.symbol, SymbolOverride::RepairFromTop1 { chain_depth: 1, arity: Some(2), .. }));

        let deep = plan_one(
            ResolvedSite::Call {
                binding: namespace(),
                chain: vec!["db".into(), "query".into()],
                arity: CallArity::Spread,
                via_call: false,
            },
            "TS2345",
        )
        .unwrap();
        assert!(matches!(deep.edit, DeclEdit::ExportToAny { ref name, .. } if name == "db"));

        let default = plan_one(
            ResolvedSite::Call {
                binding: ImportBinding::new("pkg", ImportKind::Default, "default", "p"),
                chain: vec![],
                arity: CallArity::Exact(0),
                via_call: false,
            },
            "TS2345",
        )
        .unwrap();
        assert_eq!(default.edit, DeclEdit::DefaultToAny { module: "pkg".into() });
    }

    #[test]
    fn missing_export_needs_no_resolver() {
        let mut resolver = Fixed(vec![]);
        let report = plan_repairs(
            &[diag(
                "a.ts",
                1,
                10,
                "TS2305",
                "Module '\"pkg\"' has no exported member 'bar'.",
            )],
            &Taxonomy::default(),
            &baseline(),
            &mut resolver,
            true,
        );
        assert_eq!((report.attempted, report.resolved), (1, 1));
        assert!(matches!(&report.plans[0].edit, DeclEdit::AddExports { names, .. } if names == &vec!["bar".to_string()]));
    }

    #[test]
    fn unresolved_and_foreign_modules_are_skipped() {
        let mut resolver = Fixed(vec![ResolvedSite::Property {
            binding: ImportBinding::new("./local", ImportKind::Namespace, "*", "l"),
            chain: vec![],
            property: Some("x".into()),
            via_call: false,
        }]);
        let diags = [
            diag("a.ts", 1, 1, "TS2339", ""),
            diag("a.ts", 2, 1, "TS2339", ""),
            diag("a.ts", 3, 1, "TS9999", ""),
        ];
        let report = plan_repairs(&diags, &Taxonomy::default(), &baseline(), &mut resolver, true);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.resolved, 0);
        assert!(report.plans.is_empty());
    }

    #[test]
    fn tree_sitter_resolver_reads_project_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index.ts"),
            "import * as pkg from 'pkg';\npkg.bar();\n",
        )
        .unwrap();
        let mut resolver = TreeSitterResolver::new(dir.path(), 1_000_000);
        let report = plan_repairs(
            &[diag("index.ts", 2, 5, "TS2339", "Property 'bar' does not exist")],
            &Taxonomy::default(),
            &baseline(),
            &mut resolver,
            true,
        );
        assert_eq!(report.plans.len(), 1);
        assert_eq!(
            report.plans[0].edit,
            DeclEdit::AddExports {
                module: "pkg".into(),
                names: vec!["bar".into()]
            }
        );

        // Missing files resolve to nothing and are cached as such.
        assert!(resolver.resolve(&diag("gone.ts", 1, 1, "TS2339", ""), SiteClass::Property).is_none());
        assert_eq!(resolver.cache.len(), 2);
    }
}
