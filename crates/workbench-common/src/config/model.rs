use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration from workbench.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchConfig {
    /// Workspace layout
    #[serde(default)]
    pub workspace: WorkspaceSection,

    /// Configured provider name per provider type
    #[serde(default)]
    pub providers: IndexMap<String, String>,

    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonSection,
}

impl WorkbenchConfig {
    /// Provider name configured for a provider type
    pub fn configured_provider(&self, provider_type: &str) -> Option<&str> {
        self.providers.get(provider_type).map(String::as_str)
    }
}

/// [workspace] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Display name, defaults to the root directory name
    pub name: Option<String>,
    /// Directories scanned for providers
    #[serde(default = "default_extension_dirs")]
    pub extension_dirs: Vec<String>,
    /// Linked repositories; each is scanned at `<repo>/.workbench/extensions`
    #[serde(default)]
    pub repo_dirs: Vec<String>,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            name: None,
            extension_dirs: default_extension_dirs(),
            repo_dirs: Vec::new(),
        }
    }
}

pub(crate) fn default_extension_dirs() -> Vec<String> {
    vec![".workbench/extensions".to_string()]
}

/// [daemon] section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Socket path override
    pub socket: Option<String>,
    /// Lock file path override
    pub lock: Option<String>,
    /// Per-call deadline; 0 or absent disables it
    pub call_timeout_ms: Option<u64>,
}

impl DaemonSection {
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_ms {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }
}
