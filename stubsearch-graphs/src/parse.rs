use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bindings::{self, FileBindings};
use crate::{GraphError, Result, SourceDialect};

/// A parsed source file together with the import bindings found in it.
#[derive(Debug)]
pub struct ParsedSource {
    pub path: PathBuf,
    pub dialect: SourceDialect,
    pub source: String,
    pub tree: tree_sitter::Tree,
    pub bindings: FileBindings,
}

/// Parse `source` with the grammar matching `path`'s extension.
pub fn parse_source(path: &Path, source: String) -> Result<ParsedSource> {
    let dialect = SourceDialect::from_path(path)
        .ok_or_else(|| GraphError::UnsupportedDialect(path.display().to_string()))?;

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&dialect.language())
        .map_err(|e| GraphError::TreeSitter(e.to_string()))?;
    let tree = parser.parse(&source, None).ok_or_else(|| GraphError::Parse {
        path: path.display().to_string(),
        message: "parser returned no tree".into(),
    })?;

    if tree.root_node().has_error() {
        debug!(path = %path.display(), "source has syntax errors, continuing best-effort");
    }

    let bindings = bindings::collect(&tree, &source);
    Ok(ParsedSource {
        path: path.to_path_buf(),
        dialect,
        source,
        tree,
        bindings,
    })
}

/// Read and parse a file from disk.
pub fn parse_file(path: &Path) -> Result<ParsedSource> {
    let source = std::fs::read_to_string(path)?;
    parse_source(path, source)
}
