//! Import extraction over a project's diagnostic-bearing files.

pub mod imports;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::ExtractionSection;
use crate::types::{ImportKind, ModuleStubInfo};

pub use imports::{FileImports, extract_imports, is_external_specifier};

/// Extracts imports file by file, caching results by absolute path for the
/// lifetime of one project run.
#[derive(Debug)]
pub struct ImportExtractor {
    max_members: usize,
    max_file_bytes: u64,
    cache: HashMap<PathBuf, Arc<FileImports>>,
}

impl ImportExtractor {
    pub fn new(config: &ExtractionSection) -> Self {
        Self {
            max_members: config.max_members_per_import,
            max_file_bytes: config.max_file_bytes,
            cache: HashMap::new(),
        }
    }

    /// Extract every path, reading uncached files in parallel. Unreadable or
    /// oversized files are skipped.
    pub fn extract_files(&mut self, paths: &[PathBuf]) -> Vec<(PathBuf, Arc<FileImports>)> {
        let missing: Vec<&PathBuf> = paths.iter().filter(|p| !self.cache.contains_key(*p)).collect();

        let max_members = self.max_members;
        let max_bytes = self.max_file_bytes;
        let fresh: Vec<(PathBuf, FileImports)> = missing
            .par_iter()
            .filter_map(|path| {
                let meta = std::fs::metadata(path).ok()?;
                if meta.len() > max_bytes {
                    debug!(path = %path.display(), bytes = meta.len(), "Skipping oversized file");
                    return None;
                }
                match std::fs::read_to_string(path) {
                    Ok(source) => Some(((*path).clone(), extract_imports(&source, max_members))),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot read source file");
                        None
                    }
                }
            })
            .collect();

        for (path, imports) in fresh {
            self.cache.insert(path, Arc::new(imports));
        }

        paths
            .iter()
            .filter_map(|p| self.cache.get(p).map(|i| (p.clone(), Arc::clone(i))))
            .collect()
    }

    pub fn cached(&self, path: &Path) -> Option<Arc<FileImports>> {
        self.cache.get(path).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Accumulates [`ModuleStubInfo`] across files for one project run.
#[derive(Debug, Default)]
pub struct StubInfoBuilder {
    only_external: bool,
    infos: BTreeMap<String, ModuleStubInfo>,
}

impl StubInfoBuilder {
    pub fn new(only_external: bool) -> Self {
        Self {
            only_external,
            infos: BTreeMap::new(),
        }
    }

    pub fn absorb(&mut self, file: &FileImports) {
        for binding in &file.bindings {
            if self.only_external && !is_external_specifier(&binding.module) {
                continue;
            }
            let info = self.infos.entry(binding.module.clone()).or_default();
            let key = match binding.kind {
                ImportKind::Default => {
                    info.has_default_import = true;
                    "default"
                }
                ImportKind::Namespace => {
                    info.has_namespace_import = true;
                    "*"
                }
                ImportKind::Require if binding.imported_name == "*" => {
                    info.has_namespace_import = true;
                    "*"
                }
                ImportKind::Named | ImportKind::Require => {
                    if binding.is_type_only {
                        info.named_type_names.insert(binding.imported_name.clone());
                    } else {
                        info.named_value_names.insert(binding.imported_name.clone());
                    }
                    binding.imported_name.as_str()
                }
            };
            if binding.is_type_only {
                continue;
            }
            if let Some(members) = file.members.get(&binding.local_name) {
                info.member_accesses_by_export_name
                    .entry(key.to_string())
                    .or_default()
                    .extend(members.iter().cloned());
            }
            if let Some(arities) = file.arities.get(&binding.local_name) {
                info.call_arities
                    .entry(key.to_string())
                    .or_default()
                    .extend(arities.iter().copied());
            }
        }
    }

    pub fn finish(self) -> BTreeMap<String, ModuleStubInfo> {
        self.infos
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn builder_aggregates_across_files() {
        let a = extract_imports(
            "import D, { run } from 'pkg';\nimport type { Opts } from 'pkg';\nD.start();\nrun(1);\n",
            64,
        );
        let b = extract_imports(
            "import * as pkg from 'pkg';\nimport local from './local';\npkg.extra;\n",
            64,
        );
        let mut builder = StubInfoBuilder::new(true);
        builder.absorb(&a);
        builder.absorb(&b);
        let infos = builder.finish();

        assert_eq!(infos.keys().collect::<Vec<_>>(), vec!["pkg"]);
        let pkg = &infos["pkg"];
        assert!(pkg.has_default_import);
        assert!(pkg.has_namespace_import);
        assert!(pkg.named_value_names.contains("run"));
        assert!(pkg.named_type_names.contains("Opts"));
        assert!(pkg.member_accesses_by_export_name["default"].contains("start"));
        assert!(pkg.member_accesses_by_export_name["*"].contains("extra"));
        assert!(pkg.call_arities["run"].contains(&1));
    }

    #[test]
    fn relative_modules_kept_when_not_filtering() {
        let a = extract_imports("import local from './local';\n", 64);
        let mut builder = StubInfoBuilder::new(false);
        builder.absorb(&a);
        assert!(builder.finish().contains_key("./local"));
    }

    #[test]
    fn extractor_caches_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "import x from 'x';\n").unwrap();

        let mut extractor = ImportExtractor::new(&ExtractionSection::default());
        let first = extractor.extract_files(&[file.clone()]);
        assert_eq!(first[0].1.bindings.len(), 1);

        // Later edits are not observed within the same run.
        fs::write(&file, "import y from 'y';\nimport z from 'z';\n").unwrap();
        let second = extractor.extract_files(&[file.clone()]);
        assert_eq!(second[0].1.bindings[0].module, "x");
        assert_eq!(extractor.cache_len(), 1);
    }

    #[test]
    fn extractor_skips_missing_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.js");
        fs::write(&big, "import a from 'a';\n".repeat(10)).unwrap();
        let config = ExtractionSection {
            max_file_bytes: 16,
            ..ExtractionSection::default()
        };
        let mut extractor = ImportExtractor::new(&config);
        let out = extractor.extract_files(&[big, dir.path().join("missing.ts")]);
        assert!(out.is_empty());
    }
}
