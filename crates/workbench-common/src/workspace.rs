//! Workspace root and well-known paths

use crate::config::{WorkbenchConfig, discover_config};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name of the per-workspace state directory
pub const STATE_DIR: &str = ".workbench";
pub const LOCK_FILE: &str = "daemon.lock";
pub const SOCKET_FILE: &str = "daemon.sock";
pub const LOG_DIR: &str = "logs";

/// Loaded configuration plus the directory it applies to
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Directory containing workbench.toml (or the start directory)
    pub root: PathBuf,
    /// Path of the loaded config file, if one was found
    pub config_path: Option<PathBuf>,
    pub config: WorkbenchConfig,
}

impl WorkspaceContext {
    /// Find the workspace enclosing `start_dir`
    ///
    /// Without a workbench.toml anywhere above, `start_dir` is the root and
    /// defaults apply.
    pub fn discover(start_dir: &Path) -> crate::Result<Self> {
        match discover_config(start_dir) {
            Some(config_path) => Self::from_config_file(&config_path),
            None => {
                debug!(dir = %start_dir.display(), "No workbench.toml found, using defaults");
                Ok(Self::with_config(start_dir, WorkbenchConfig::default()))
            }
        }
    }

    /// Load a specific config file; its directory becomes the root
    pub fn from_config_file(config_path: &Path) -> crate::Result<Self> {
        let config = WorkbenchConfig::load(config_path)?;
        let root = config_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Config file has no parent directory"))?
            .to_path_buf();
        debug!(config = %config_path.display(), "Loaded workspace config");
        Ok(Self {
            root,
            config_path: Some(config_path.to_path_buf()),
            config,
        })
    }

    /// Use an in-memory config rooted at `root`
    pub fn with_config(root: &Path, config: WorkbenchConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config_path: None,
            config,
        }
    }

    /// Workspace display name
    pub fn name(&self) -> String {
        self.config
            .workspace
            .name
            .clone()
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "workspace".to_string())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        match &self.config.daemon.lock {
            Some(lock) => self.resolve(lock),
            None => self.state_dir().join(LOCK_FILE),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        match &self.config.daemon.socket {
            Some(socket) => self.resolve(socket),
            None => self.state_dir().join(SOCKET_FILE),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir().join(LOG_DIR)
    }

    /// Configured extension directories, resolved against the root
    pub fn extension_dirs(&self) -> Vec<PathBuf> {
        self.config
            .workspace
            .extension_dirs
            .iter()
            .map(|dir| self.resolve(dir))
            .collect()
    }

    /// Linked repository roots, resolved against the root
    pub fn repo_dirs(&self) -> Vec<PathBuf> {
        self.config
            .workspace
            .repo_dirs
            .iter()
            .map(|dir| self.resolve(dir))
            .collect()
    }

    pub fn configured_provider(&self, provider_type: &str) -> Option<&str> {
        self.config.configured_provider(provider_type)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.config.daemon.call_timeout()
    }

    /// Resolve a path relative to the workspace root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_path_relative_to_workspace(path.as_ref(), &self.root)
    }

    /// Ensure the `.workbench/` folder structure exists
    pub fn ensure_structure(&self) -> crate::Result<()> {
        let logs = self.log_dir();
        std::fs::create_dir_all(&logs)
            .with_context(|| format!("Failed to create {:?}", logs))?;
        Ok(())
    }
}

/// Resolve path relative to workspace root
pub fn resolve_path_relative_to_workspace(path: &Path, workspace_root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE_NAME;

    #[test]
    fn test_default_paths() {
        let ctx = WorkspaceContext::with_config(Path::new("/work/demo"), WorkbenchConfig::default());
        assert_eq!(ctx.lock_path(), PathBuf::from("/work/demo/.workbench/daemon.lock"));
        assert_eq!(ctx.socket_path(), PathBuf::from("/work/demo/.workbench/daemon.sock"));
        assert_eq!(ctx.log_dir(), PathBuf::from("/work/demo/.workbench/logs"));
        assert_eq!(
            ctx.extension_dirs(),
            vec![PathBuf::from("/work/demo/.workbench/extensions")]
        );
        assert_eq!(ctx.name(), "demo");
    }

    #[test]
    fn test_overrides_resolve_against_root() -> anyhow::Result<()> {
        let config = WorkbenchConfig::parse(
            r#"
[workspace]
name = "named"
repo_dirs = ["../shared", "/abs/repo"]

[daemon]
socket = "run/wb.sock"
lock = "/var/tmp/wb.lock"
"#,
        )?;
        let ctx = WorkspaceContext::with_config(Path::new("/work/demo"), config);
        assert_eq!(ctx.socket_path(), PathBuf::from("/work/demo/run/wb.sock"));
        assert_eq!(ctx.lock_path(), PathBuf::from("/var/tmp/wb.lock"));
        assert_eq!(
            ctx.repo_dirs(),
            vec![PathBuf::from("/work/demo/../shared"), PathBuf::from("/abs/repo")]
        );
        assert_eq!(ctx.name(), "named");
        Ok(())
    }

    #[test]
    fn test_discover_uses_config_directory_as_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[providers]\nci = \"mock\"\n",
        )?;
        let nested = dir.path().join("src");
        std::fs::create_dir_all(&nested)?;

        let ctx = WorkspaceContext::discover(&nested)?;
        assert_eq!(ctx.root, dir.path());
        assert_eq!(ctx.configured_provider("ci"), Some("mock"));
        Ok(())
    }

    #[test]
    fn test_ensure_structure_creates_log_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ctx = WorkspaceContext::with_config(dir.path(), WorkbenchConfig::default());
        ctx.ensure_structure()?;
        assert!(ctx.log_dir().is_dir());
        Ok(())
    }
}
