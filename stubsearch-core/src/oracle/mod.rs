//! The type checker as a black-box oracle, and the on-disk layout that
//! injects candidate declarations into a project.

pub mod tsc;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::OracleError;

pub use tsc::TscOracle;

/// Output of one checker invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleRun {
    /// `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl OracleRun {
    /// Wall time in whole milliseconds, saturating at `u64::MAX`.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Runs the checker over a project with a given configuration file.
///
/// Implementations must kill the checker when `timeout` elapses and report
/// `timed_out = true` rather than an error.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    async fn check(
        &self,
        project: &Path,
        tsconfig: &Path,
        timeout: Duration,
    ) -> Result<OracleRun, OracleError>;
}

pub const BASE_TSCONFIG: &str = "tsconfig.json";
pub const OVERLAY_TSCONFIG: &str = "tsconfig.stubsearch.json";
pub const INJECTED_PACKAGE: &str = "__stubsearch_injected__";
const INJECTION_DIR: &str = ".stubsearch";
const TYPE_ROOT: &str = "./.stubsearch/types";
const DEFAULT_TYPE_ROOT: &str = "./node_modules/@types";

/// Where injected declarations live for one project run. Exactly one
/// declaration file exists per project; each trial overwrites it.
#[derive(Debug, Clone)]
pub struct InjectionLayout {
    project: PathBuf,
}

impl InjectionLayout {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn base_tsconfig(&self) -> PathBuf {
        self.project.join(BASE_TSCONFIG)
    }

    pub fn overlay_tsconfig(&self) -> PathBuf {
        self.project.join(OVERLAY_TSCONFIG)
    }

    pub fn declaration_path(&self) -> PathBuf {
        self.project
            .join(INJECTION_DIR)
            .join("types")
            .join(INJECTED_PACKAGE)
            .join("index.d.ts")
    }

    pub fn has_tsconfig(&self) -> bool {
        self.base_tsconfig().is_file()
    }

    /// Write the overlay configuration extending the project's own.
    pub fn prepare(&self) -> Result<(), OracleError> {
        let base = self.base_tsconfig();
        let raw = std::fs::read_to_string(&base)?;
        let parsed: Value = serde_json::from_str(&strip_jsonc(&raw)).map_err(|e| OracleError::Tsconfig {
            path: base.display().to_string(),
            message: e.to_string(),
        })?;
        let overlay = overlay_config(&parsed);
        let text = serde_json::to_string_pretty(&overlay).map_err(|e| OracleError::Tsconfig {
            path: self.overlay_tsconfig().display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(self.overlay_tsconfig(), text + "\n")?;
        if let Some(parent) = self.declaration_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(project = %self.project.display(), "Injection layout prepared");
        Ok(())
    }

    /// Overwrite the injected declaration file.
    pub fn write_declaration(&self, text: &str) -> Result<(), OracleError> {
        let path = self.declaration_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Remove the overlay and injected files. Missing files are fine.
    pub fn cleanup(&self) -> Result<(), OracleError> {
        match std::fs::remove_file(self.overlay_tsconfig()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match std::fs::remove_dir_all(self.project.join(INJECTION_DIR)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Overlay `compilerOptions` for a parsed base config: the injected type
/// root goes first; `types` is only pinned when the base pins it.
fn overlay_config(base: &Value) -> Value {
    let options = base.get("compilerOptions");
    let mut type_roots = vec![Value::from(TYPE_ROOT)];
    match options.and_then(|o| o.get("typeRoots")).and_then(Value::as_array) {
        Some(roots) => type_roots.extend(roots.iter().filter(|r| r.is_string()).cloned()),
        None => type_roots.push(Value::from(DEFAULT_TYPE_ROOT)),
    }

    let mut compiler_options = json!({ "typeRoots": type_roots });
    if let Some(types) = options.and_then(|o| o.get("types")).and_then(Value::as_array) {
        let mut types: Vec<Value> = types.iter().filter(|t| t.is_string()).cloned().collect();
        if !types.iter().any(|t| t == INJECTED_PACKAGE) {
            types.push(Value::from(INJECTED_PACKAGE));
        }
        compiler_options["types"] = Value::from(types);
    }
    json!({
        "extends": format!("./{BASE_TSCONFIG}"),
        "compilerOptions": compiler_options,
    })
}

/// Remove `//` and `/* */` comments and trailing commas, leaving string
/// literals untouched.
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ',' => {
                // Drop the comma if only whitespace separates it from a closer.
                let rest: String = chars.clone().take_while(|c| c.is_whitespace()).collect();
                let closer = chars.clone().nth(rest.chars().count());
                if !matches!(closer, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
