// Integration test utilities: fixture projects and an in-process oracle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stubsearch_core::config::SearchConfig;
use stubsearch_core::error::OracleError;
use stubsearch_core::oracle::{BASE_TSCONFIG, InjectionLayout, Oracle, OracleRun};
use stubsearch_core::pipeline::ProjectSearch;
use stubsearch_core::store::ProjectRecord;

/// A temporary TypeScript project with a root `tsconfig.json`.
#[derive(Debug)]
pub struct TestProject {
    pub dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        std::fs::write(
            dir.path().join(BASE_TSCONFIG),
            "{\n  \"compilerOptions\": {\n    \"strict\": true,\n    \"noEmit\": true, // checked only\n  },\n  \"include\": [\"src\"],\n}\n",
        )
        .expect("write tsconfig");
        Self { dir }
    }

    /// Project with one source file at `src/index.ts`.
    pub fn with_source(source: &str) -> Self {
        let project = Self::new();
        project.write("src/index.ts", source);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source dir");
        }
        std::fs::write(&path, contents).expect("write source");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// One checker diagnostic line as `tsc --pretty false` prints it.
pub fn diag_line(file: &str, line: usize, col: usize, code: &str, message: &str) -> String {
    format!("{file}({line},{col}): error {code}: {message}\n")
}

type Responder = dyn Fn(&str) -> String + Send + Sync;

/// Oracle that answers from the injected declaration text instead of
/// running a checker. The un-injected run always gets `baseline`.
pub struct ScriptedOracle {
    baseline: String,
    respond: Box<Responder>,
    seen: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ScriptedOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOracle")
            .field("baseline", &self.baseline)
            .finish_non_exhaustive()
    }
}

impl ScriptedOracle {
    /// `respond` maps injected text to checker stdout; empty output means a
    /// clean exit.
    pub fn new(baseline: impl Into<String>, respond: impl Fn(&str) -> String + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            baseline: baseline.into(),
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Injected texts in the order the oracle saw them.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn check(&self, project: &Path, tsconfig: &Path, _timeout: Duration) -> Result<OracleRun, OracleError> {
        let stdout = if tsconfig.file_name().is_some_and(|n| n == BASE_TSCONFIG) {
            self.baseline.clone()
        } else {
            let text = std::fs::read_to_string(InjectionLayout::new(project).declaration_path())?;
            let out = (self.respond)(&text);
            self.seen.lock().expect("seen lock").push(text);
            out
        };
        Ok(OracleRun {
            exit_code: Some(if stdout.is_empty() { 0 } else { 2 }),
            stdout,
            ..OracleRun::default()
        })
    }
}

/// Defaults with every output under `out` and early stops disabled, so
/// tests see the whole candidate queue.
pub fn exhaustive_config(out: &Path) -> SearchConfig {
    let mut config = SearchConfig::default();
    config.output.dir = out.to_path_buf();
    config.selection.stop_on_improve = false;
    config.selection.tie_streak = None;
    config
}

/// Run one project search to completion.
pub async fn search(project: &Path, oracle: Arc<ScriptedOracle>, config: SearchConfig) -> ProjectRecord {
    ProjectSearch::new(Arc::new(config), oracle)
        .run(project)
        .await
        .expect("project search")
}
