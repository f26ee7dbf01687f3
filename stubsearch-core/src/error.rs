/// Top-level stubsearch error type.
///
/// All fallible operations in `stubsearch-core` return [`Result<T, SearchError>`](Result).
/// Each variant wraps a concern-specific enum so callers (notably the CLI's
/// exit-code mapping) can match on the source without string inspection.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The type-checker oracle could not be run.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Error reading or writing trial logs and patches.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error loading, training or applying the reranker.
    #[error("Rerank error: {0}")]
    Rerank(#[from] RerankError),

    /// Error from source parsing (tree-sitter).
    #[error("Graph engine error: {0}")]
    Graph(#[from] stubsearch_graphs::GraphError),

    /// Filesystem I/O outside the store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Whether this error means the checker cannot be started at all, which
    /// aborts the whole run rather than one project.
    pub fn is_oracle_unavailable(&self) -> bool {
        matches!(self, Self::Oracle(OracleError::Unavailable { .. }))
    }
}

/// Errors in configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors from invoking the type checker.
#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    /// The checker binary is missing or not executable.
    #[error("Oracle `{command}` unavailable: {reason}")]
    Unavailable {
        /// Program that failed to start.
        command: String,
        /// Underlying spawn failure.
        reason: String,
    },

    /// The checker started but its process could not be driven.
    #[error("Oracle process error: {0}")]
    Process(String),

    /// The project's `tsconfig.json` could not be read or parsed.
    #[error("Invalid tsconfig at {path}: {message}")]
    Tsconfig {
        /// Path of the offending file.
        path: String,
        /// Parse failure description.
        message: String,
    },

    /// Filesystem I/O while preparing the injection layout.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the external baseline adapter.
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    /// The adapter did not answer within its timeout.
    #[error("Adapter timed out")]
    Timeout,

    /// The adapter could not be started or exited unsuccessfully.
    #[error("Adapter failed: {0}")]
    Failed(String),

    /// The adapter answered with something other than `{"ok": true, "dts": ...}`.
    #[error("Adapter returned invalid output: {0}")]
    InvalidOutput(String),
}

impl AdapterError {
    /// Skip reason recorded on the project when the adapter fails.
    pub fn skip_reason(&self) -> &'static str {
        match self {
            Self::Timeout => "adapter-timeout",
            Self::Failed(_) => "adapter-failed",
            Self::InvalidOutput(_) => "adapter-invalid-output",
        }
    }
}

/// Errors from the line-delimited JSON trial log and patch output.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Filesystem I/O on a log or patch file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File being read or written.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A log line could not be decoded, or a record could not be encoded.
    #[error("Serialization error at {path}:{line}: {source}")]
    Serialization {
        /// File being read or written.
        path: String,
        /// 1-based line number, 0 when writing.
        line: usize,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Errors from reranker training and scoring.
#[derive(thiserror::Error, Debug)]
pub enum RerankError {
    /// Model or pair file could not be read or written.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File being read or written.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Model or pair JSON could not be decoded.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        /// File being decoded.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Training was asked to run without any usable pairs.
    #[error("No training pairs: {0}")]
    NoPairs(String),
}

/// Convenience alias for `Result<T, SearchError>`.
pub type Result<T> = std::result::Result<T, SearchError>;
