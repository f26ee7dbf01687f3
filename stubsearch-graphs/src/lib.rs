pub mod bindings;
pub mod helpers;
pub mod parse;
pub mod resolve;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use bindings::{CallInitializer, FileBindings};
pub use parse::{ParsedSource, parse_source};
pub use resolve::{CallArity, ResolvedSite, SiteClass};

/// Error type for source parsing and site resolution.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Unsupported source dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

// ── Source dialects ────────────────────────────────────────────────

/// Grammar used to parse a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceDialect {
    TypeScript,
    Tsx,
    JavaScript,
}

impl SourceDialect {
    /// Pick a dialect from a file extension. Returns `None` for files the
    /// checker would not look at.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            _ => None,
        }
    }

    pub fn language(self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

// ── Span type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl From<tree_sitter::Range> for TextRange {
    fn from(r: tree_sitter::Range) -> Self {
        Self {
            start_byte: r.start_byte,
            end_byte: r.end_byte,
            start_row: r.start_point.row,
            start_col: r.start_point.column,
            end_row: r.end_point.row,
            end_col: r.end_point.column,
        }
    }
}

// ── Import bindings ────────────────────────────────────────────────

/// How a local name was bound to an external module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Default,
    Namespace,
    Named,
    Require,
}

/// One local binding introduced by an `import` or `require` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub module: String,
    pub kind: ImportKind,
    /// Exported name on the module side; `default` or `*` for the
    /// default and namespace forms.
    pub imported_name: String,
    pub local_name: String,
    pub is_type_only: bool,
}

impl ImportBinding {
    pub fn new(
        module: impl Into<String>,
        kind: ImportKind,
        imported_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            kind,
            imported_name: imported_name.into(),
            local_name: local_name.into(),
            is_type_only: false,
        }
    }

    #[must_use]
    pub fn type_only(mut self, flag: bool) -> Self {
        self.is_type_only = flag;
        self
    }

    /// Whether member accesses on the local name land on the module object
    /// itself rather than on a single export.
    pub fn is_module_object(&self) -> bool {
        matches!(self.kind, ImportKind::Namespace | ImportKind::Require)
            && self.imported_name == "*"
    }
}
