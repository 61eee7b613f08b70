//! Providers declared by a `provider.toml` and backed by external commands
//!
//! Each tool runs a configured argv in the provider directory. The JSON
//! input is written to stdin and the JSON output is read from stdout.
//!
//! ```toml
//! name = "local-issues"
//! type = "issues"
//! capabilities = ["read"]
//! required_tokens = ["ISSUES_TOKEN"]
//!
//! [tools."issue.list"]
//! command = ["./issues.sh", "list"]
//!
//! [vendor.jira.transition]
//! command = ["./issues.sh", "transition"]
//! ```

use crate::error::{DaemonError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use workbench_sdk::provider::{ProviderManifest, ToolProvider, VENDOR_PREFIX};
use workbench_sdk::RouterError;

/// Manifest file looked up in each provider directory
pub const MANIFEST_FILE: &str = "provider.toml";

/// On-disk provider manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub required_tokens: Vec<String>,
    #[serde(default)]
    pub tools: IndexMap<String, CommandSpec>,
    #[serde(default)]
    pub vendor: IndexMap<String, IndexMap<String, CommandSpec>>,
}

/// How to run one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

/// A provider whose tools are external commands
#[derive(Debug, Clone)]
pub struct CommandProvider {
    dir: PathBuf,
    definition: CommandManifest,
    manifest: ProviderManifest,
}

impl CommandProvider {
    /// Load `<dir>/provider.toml`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path)?;
        let definition: CommandManifest = toml::from_str(&content)?;
        Self::from_manifest(dir, definition)
    }

    pub fn from_manifest(dir: &Path, definition: CommandManifest) -> Result<Self> {
        if definition.name.trim().is_empty() || definition.provider_type.trim().is_empty() {
            return Err(DaemonError::Config(format!(
                "{:?}: provider name and type must not be empty",
                dir.join(MANIFEST_FILE)
            )));
        }
        let specs = definition
            .tools
            .iter()
            .chain(definition.vendor.values().flat_map(|methods| methods.iter()));
        for (tool, spec) in specs {
            if spec.command.is_empty() {
                return Err(DaemonError::Config(format!(
                    "Provider '{}': tool '{}' has an empty command",
                    definition.name, tool
                )));
            }
        }

        let manifest = ProviderManifest {
            capabilities: definition.capabilities.clone(),
            required_tokens: definition.required_tokens.clone(),
            tools: definition.tools.keys().cloned().collect(),
            vendor_tools: definition
                .vendor
                .iter()
                .map(|(ns, methods)| (ns.clone(), methods.keys().cloned().collect()))
                .collect(),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            definition,
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn description(&self) -> Option<&str> {
        self.definition.description.as_deref()
    }

    async fn run(&self, procedure: &str, spec: &CommandSpec, input: Value) -> workbench_sdk::Result<Value> {
        let (program, args) = match spec.command.split_first() {
            Some(parts) => parts,
            None => {
                return Err(RouterError::handler(format!(
                    "Provider '{}': '{}' has no command",
                    self.definition.name, procedure
                )));
            }
        };
        let program = resolve_program(&self.dir, program);
        debug!(provider = %self.definition.name, procedure, program = %program.display(), "Running provider command");

        let mut child = Command::new(&program)
            .args(args)
            .envs(&spec.env)
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RouterError::handler(format!(
                    "Provider '{}': failed to start {:?}: {}",
                    self.definition.name, program, e
                ))
            })?;

        let payload = serde_json::to_vec(&input)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores its input may close stdin early
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(procedure, "Provider command closed stdin: {}", e);
            }
        }

        let output = child.wait_with_output().await.map_err(RouterError::from_error)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RouterError::handler(format!(
                "Provider '{}' failed on '{}' ({}): {}",
                self.definition.name,
                procedure,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout).map_err(|e| {
            RouterError::handler(format!(
                "Provider '{}' returned invalid JSON for '{}': {}",
                self.definition.name, procedure, e
            ))
        })
    }

    fn unsupported(&self, procedure: String) -> RouterError {
        RouterError::UnsupportedProcedure {
            provider: self.definition.name.clone(),
            procedure,
            supported: self.manifest.supported_procedures(),
        }
    }
}

/// Paths with a separator are relative to the provider directory
fn resolve_program(dir: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

#[async_trait]
impl ToolProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn provider_type(&self) -> &str {
        &self.definition.provider_type
    }

    fn manifest(&self) -> &ProviderManifest {
        &self.manifest
    }

    async fn call_tool(&self, tool: &str, input: Value) -> workbench_sdk::Result<Value> {
        match self.definition.tools.get(tool) {
            Some(spec) => self.run(tool, spec, input).await,
            None => Err(self.unsupported(tool.to_string())),
        }
    }

    async fn call_vendor(
        &self,
        namespace: &str,
        method: &str,
        input: Value,
    ) -> workbench_sdk::Result<Value> {
        let procedure = format!("{}.{}.{}", VENDOR_PREFIX, namespace, method);
        match self.definition.vendor.get(namespace).and_then(|m| m.get(method)) {
            Some(spec) => self.run(&procedure, spec, input).await,
            None => Err(self.unsupported(procedure)),
        }
    }
}
