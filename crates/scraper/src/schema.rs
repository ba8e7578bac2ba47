//! Module schema extraction by shelling out to the IaC tool.
//!
//! The extractor runs `<binary> metadata dump -json` inside a module
//! directory and parses the declared variables and outputs from stdout.
//! Failures are reported as [`SchemaError`] so callers can record them on
//! the module document without failing the version.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use regindex_types::{ModuleOutput, ModuleVariable};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::error::SchemaError;

const DUMP_ARGS: &[&str] = &["metadata", "dump", "-json"];

/// Variables and outputs declared by one module directory.
#[derive(Debug, Default, PartialEq)]
pub struct ModuleSchema {
    pub variables: BTreeMap<String, ModuleVariable>,
    pub outputs: BTreeMap<String, ModuleOutput>,
}

#[derive(Deserialize)]
struct DumpOutput {
    #[serde(default)]
    variables: BTreeMap<String, ModuleVariable>,
    #[serde(default)]
    outputs: BTreeMap<String, ModuleOutput>,
}

/// Stages the extractor binary when it is not already installed.
#[async_trait]
pub trait BinaryProvisioner: Send + Sync {
    async fn provision(&self) -> std::result::Result<PathBuf, String>;
}

pub struct SchemaExtractor {
    binary: PathBuf,
    provisioner: Option<Box<dyn BinaryProvisioner>>,
    staged: OnceCell<PathBuf>,
}

impl SchemaExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            provisioner: None,
            staged: OnceCell::new(),
        }
    }

    /// Adds a fallback used when spawning `binary` fails with not-found. The
    /// provisioner runs at most once per process.
    pub fn with_provisioner(mut self, provisioner: Box<dyn BinaryProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Extracts the schema of the module rooted at `dir`.
    pub async fn extract(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<ModuleSchema, SchemaError> {
        let output = match self.run(&self.binary, dir, cancel).await {
            Err(SchemaError::Spawn(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                let Some(provisioner) = &self.provisioner else {
                    return Err(SchemaError::Spawn(err));
                };
                let staged = self
                    .staged
                    .get_or_try_init(|| async {
                        log::info!("schema extractor binary not found, provisioning");
                        provisioner.provision().await.map_err(SchemaError::Provisioning)
                    })
                    .await?
                    .clone();
                self.run(&staged, dir, cancel).await?
            }
            other => other?,
        };

        if !output.status.success() {
            let stderr = strip_ansi(&String::from_utf8_lossy(&output.stderr));
            return Err(SchemaError::ExtractorFailed {
                stderr: stderr.trim().to_string(),
            });
        }
        let dump: DumpOutput = serde_json::from_slice(&output.stdout)?;
        Ok(ModuleSchema {
            variables: dump.variables,
            outputs: dump.outputs,
        })
    }

    async fn run(
        &self,
        binary: &Path,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<std::process::Output, SchemaError> {
        let child = Command::new(binary)
            .args(DUMP_ARGS)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            output = child.wait_with_output() => Ok(output?),
            _ = cancel.cancelled() => Err(SchemaError::Cancelled),
        }
    }
}

/// Removes ANSI escape sequences the tool emits when it mistakes the pipe
/// for a terminal.
pub fn strip_ansi(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new("\x1b\\[[0-9;?]*[ -/]*[@-~]").unwrap_or_else(|_| unreachable!())
    });
    re.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_color_and_cursor_sequences() {
        let colored = "\x1b[31mError:\x1b[0m missing \x1b[1;4mrequired\x1b[0m block";
        assert_eq!(strip_ansi(colored), "Error: missing required block");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_ansi("no escapes here"), "no escapes here");
    }

    #[test]
    fn dump_output_parses_variables_and_outputs() {
        let json = r#"{
            "variables": {
                "region": {"type": "string", "description": "AWS region", "required": true},
                "tags": {"type": "map(string)", "default": {}}
            },
            "outputs": {
                "arn": {"description": "Resource ARN", "sensitive": false}
            }
        }"#;
        let dump: DumpOutput = serde_json::from_str(json).unwrap();
        assert_eq!(dump.variables.len(), 2);
        assert!(dump.variables["region"].required);
        assert_eq!(dump.outputs["arn"].description, "Resource ARN");
    }

    #[tokio::test]
    async fn missing_binary_without_provisioner_is_a_spawn_error() {
        let extractor = SchemaExtractor::new("/nonexistent/tool-binary");
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let err = extractor.extract(dir.path(), &cancel).await.unwrap_err();
        assert!(matches!(err, SchemaError::Spawn(_)));
    }
}
