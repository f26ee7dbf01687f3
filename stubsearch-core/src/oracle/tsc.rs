//! `tsc` as a subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use super::{Oracle, OracleRun};
use crate::config::OracleSection;
use crate::error::OracleError;

/// Invokes the checker with `--noEmit --pretty false -p <tsconfig>`.
#[derive(Debug, Clone)]
pub struct TscOracle {
    command: Vec<String>,
    prefer_local: bool,
}

impl TscOracle {
    pub fn new(config: &OracleSection) -> Self {
        Self {
            command: config.command.clone(),
            prefer_local: config.prefer_local,
        }
    }

    /// Program and leading arguments for `project`: the project's own
    /// compiler when present and preferred, else the configured command.
    pub fn program_for(&self, project: &Path) -> (PathBuf, Vec<String>) {
        let local = project.join("node_modules").join(".bin").join("tsc");
        if self.prefer_local && local.is_file() {
            return (local, Vec::new());
        }
        match self.command.split_first() {
            Some((program, args)) => (PathBuf::from(program), args.to_vec()),
            None => (PathBuf::from("tsc"), Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Oracle for TscOracle {
    fn name(&self) -> &str {
        "tsc"
    }

    async fn check(
        &self,
        project: &Path,
        tsconfig: &Path,
        timeout: Duration,
    ) -> Result<OracleRun, OracleError> {
        let (program, mut args) = self.program_for(project);
        args.extend([
            "--noEmit".to_string(),
            "--pretty".to_string(),
            "false".to_string(),
            "-p".to_string(),
            tsconfig.display().to_string(),
        ]);

        let start = Instant::now();
        let child = Command::new(&program)
            .args(&args)
            .current_dir(project)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    OracleError::Unavailable {
                        command: program.display().to_string(),
                        reason: e.to_string(),
                    }
                }
                _ => OracleError::Process(format!("cannot start {}: {e}", program.display())),
            })?;

        // Dropping the pending future drops the child, which kills it.
        let Ok(output) = tokio::time::timeout(timeout, child.wait_with_output()).await else {
            warn!(project = %project.display(), timeout_secs = timeout.as_secs(), "Oracle timed out");
            return Ok(OracleRun {
                exit_code: None,
                timed_out: true,
                duration: start.elapsed(),
                ..OracleRun::default()
            });
        };
        let output = output.map_err(|e| OracleError::Process(e.to_string()))?;

        let run = OracleRun {
            exit_code: output.status.code(),
            timed_out: false,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };
        debug!(
            project = %project.display(),
            exit_code = ?run.exit_code,
            duration_ms = run.duration_ms(),
            "Oracle finished"
        );
        Ok(run)
    }
}
