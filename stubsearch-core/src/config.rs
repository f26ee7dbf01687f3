use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "stubsearch.toml";

/// Top-level stubsearch configuration, matching `stubsearch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub localizer: LocalizerSection,
    #[serde(default)]
    pub strategies: StrategiesSection,
    #[serde(default)]
    pub selection: SelectionSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub taxonomy: TaxonomySection,
    #[serde(default)]
    pub baseline: BaselineSection,
    #[serde(default)]
    pub rerank: RerankSection,
    #[serde(default)]
    pub output: OutputSection,
}

impl SearchConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject values that parse but cannot drive a search.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.trial_max == 0 {
            return Err(ConfigError::Invalid(
                "search.trial_max must be at least 1 (the baseline trial)".into(),
            ));
        }
        if self.search.concurrency == 0 {
            return Err(ConfigError::Invalid("search.concurrency must be at least 1".into()));
        }
        if !(1..=2).contains(&self.strategies.sweep_arity) {
            return Err(ConfigError::Invalid(format!(
                "strategies.sweep_arity must be 1 or 2, got {}",
                self.strategies.sweep_arity
            )));
        }
        if self.localizer.top_m == Some(0) {
            return Err(ConfigError::Invalid("localizer.top_m must be positive when set".into()));
        }
        if self.selection.tie_streak == Some(0) {
            return Err(ConfigError::Invalid("selection.tie_streak must be positive when set".into()));
        }
        if self.oracle.command.is_empty() {
            return Err(ConfigError::Invalid("oracle.command must name a program".into()));
        }
        if self.baseline.source == BaselineSource::Adapter && self.baseline.adapter_command.is_empty()
        {
            return Err(ConfigError::Invalid(
                "baseline.adapter_command is required when baseline.source = \"adapter\"".into(),
            ));
        }
        for pattern in &self.search.exclude_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("search.exclude_patterns: {pattern}: {e}"))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Oracle calls per project, baseline included.
    pub trial_max: usize,
    /// Projects processed in parallel.
    pub concurrency: usize,
    pub project_timeout_secs: u64,
    /// Ignore relative and aliased specifiers.
    pub only_external: bool,
    /// Diagnostic files matching these globs are not scanned for imports.
    pub exclude_patterns: Vec<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            trial_max: 8,
            concurrency: 4,
            project_timeout_secs: 1800,
            only_external: true,
            exclude_patterns: vec!["**/node_modules/**".into(), "**/*.d.ts".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub max_members_per_import: usize,
    /// Larger files are skipped (usually bundles or generated code).
    pub max_file_bytes: u64,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            max_members_per_import: 64,
            max_file_bytes: 2_000_000,
        }
    }
}

/// How the localizer weighs a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LocalizeMode {
    /// Distinct diagnostic-bearing files importing the module.
    #[default]
    PerFile,
    /// Core diagnostics located in files importing the module.
    PerError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerSection {
    pub mode: LocalizeMode,
    /// Working-set size; unset keeps every module.
    pub top_m: Option<usize>,
}

/// Symbol-level widening sub-mode. At most one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidenMode {
    InterfaceIndexer,
    NamespaceMembers,
    FunctionAnyOverload,
    MissingExports,
    ExportToAny,
    TypeToAny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct StrategiesSection {
    pub repair: bool,
    pub repair_max: usize,
    pub sweep: bool,
    /// 1 for single-module sweeps, 2 for pairs.
    pub sweep_arity: usize,
    /// Apply module-any to the first K ranked modules at once.
    pub top_k: Option<usize>,
    pub widen: Option<WidenMode>,
    /// Emit arity-specific overloads from observed calls.
    pub widen_use_arity: bool,
    pub symbol_widen_max: usize,
}

impl Default for StrategiesSection {
    fn default() -> Self {
        Self {
            repair: true,
            repair_max: 4,
            sweep: true,
            sweep_arity: 1,
            top_k: Some(3),
            widen: Some(WidenMode::MissingExports),
            widen_use_arity: false,
            symbol_widen_max: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    pub stop_on_improve: bool,
    /// Stop after this many consecutive exact ties; unset disables.
    pub tie_streak: Option<usize>,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            stop_on_improve: true,
            tie_streak: Some(3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    /// Program and leading arguments; the fixed flags are appended.
    pub command: Vec<String>,
    /// Use `<project>/node_modules/.bin/tsc` when present.
    pub prefer_local: bool,
    pub trial_timeout_secs: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            command: vec!["tsc".into()],
            prefer_local: true,
            trial_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomySection {
    pub core_codes: Vec<String>,
    pub parser_codes: Vec<String>,
}

impl Default for TaxonomySection {
    fn default() -> Self {
        Self {
            core_codes: [
                "TS2307", "TS7016", "TS2305", "TS2613", "TS2614", "TS2339", "TS2345", "TS2322",
                "TS2554", "TS2769", "TS2353", "TS2741", "TS7053",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            parser_codes: ["TS1005", "TS1109", "TS1128", "TS1131", "TS1160", "TS1434"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BaselineSource {
    #[default]
    Stub,
    Adapter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSection {
    pub source: BaselineSource,
    pub adapter_command: Vec<String>,
    pub adapter_timeout_secs: u64,
}

impl Default for BaselineSection {
    fn default() -> Self {
        Self {
            source: BaselineSource::Stub,
            adapter_command: Vec::new(),
            adapter_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSection {
    /// Model file produced by `stubsearch train`.
    pub model: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    pub keep_injection: bool,
    pub log_diagnostics_limit: usize,
    pub write_patches: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("stubsearch-out"),
            keep_injection: false,
            log_diagnostics_limit: 50,
            write_patches: true,
        }
    }
}
