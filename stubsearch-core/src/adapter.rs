//! External baseline adapter: a command that turns import facts into
//! declaration text, spoken to over stdin/stdout JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::BaselineSection;
use crate::error::AdapterError;
use crate::types::ModuleStubInfo;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdapterModule {
    default_import: bool,
    namespace_import: bool,
    named: Vec<String>,
    type_named: Vec<String>,
    members: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Serialize)]
struct AdapterRequest {
    project: String,
    modules: BTreeMap<String, AdapterModule>,
}

#[derive(Debug, Deserialize)]
struct AdapterResponse {
    ok: bool,
    dts: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BaselineAdapter {
    command: Vec<String>,
    timeout: Duration,
}

impl BaselineAdapter {
    pub fn new(config: &BaselineSection) -> Self {
        Self {
            command: config.adapter_command.clone(),
            timeout: Duration::from_secs(config.adapter_timeout_secs),
        }
    }

    /// Ask the adapter for declaration text covering `modules`.
    pub async fn generate(
        &self,
        project: &Path,
        modules: &[String],
        infos: &BTreeMap<String, ModuleStubInfo>,
    ) -> Result<String, AdapterError> {
        let request = build_request(project, modules, infos);
        let input = serde_json::to_vec(&request).map_err(|e| AdapterError::Failed(e.to_string()))?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AdapterError::Failed("empty adapter command".into()))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::Failed(format!("cannot start {program}: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdapterError::Failed("adapter stdin unavailable".into()))?;
        let exchange = async move {
            stdin.write_all(&input).await?;
            drop(stdin);
            Ok::<_, std::io::Error>(child.wait_with_output().await?)
        };
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AdapterError::Timeout)?
            .map_err(|e| AdapterError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdapterError::Failed(format!(
                "exit {:?}: {}",
                output.status.code(),
                truncate(stderr.trim(), 2000)
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let dts = parse_response(stdout.trim())?;
        debug!(bytes = dts.len(), "Adapter produced declarations");
        Ok(dts)
    }
}

fn build_request(
    project: &Path,
    modules: &[String],
    infos: &BTreeMap<String, ModuleStubInfo>,
) -> AdapterRequest {
    let empty = ModuleStubInfo::default();
    let modules = modules
        .iter()
        .map(|name| {
            let info = infos.get(name).unwrap_or(&empty);
            (
                name.clone(),
                AdapterModule {
                    default_import: info.has_default_import,
                    namespace_import: info.has_namespace_import,
                    named: info.named_value_names.iter().cloned().collect(),
                    type_named: info.named_type_names.iter().cloned().collect(),
                    members: info.member_accesses_by_export_name.clone(),
                },
            )
        })
        .collect();
    AdapterRequest {
        project: project.display().to_string(),
        modules,
    }
}

fn parse_response(stdout: &str) -> Result<String, AdapterError> {
    let response: AdapterResponse =
        serde_json::from_str(if stdout.is_empty() { "{}" } else { stdout })
            .map_err(|e| AdapterError::InvalidOutput(e.to_string()))?;
    match response {
        AdapterResponse { ok: true, dts: Some(dts) } => Ok(dts),
        _ => Err(AdapterError::InvalidOutput(truncate(stdout, 2000).to_string())),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
