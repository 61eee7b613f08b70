//! Helpers for black-box tests of the `wb` binary

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use workbench_common::WorkspaceContext;

const BINARY: &str = "wb";
const DAEMON_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the `wb` binary (or cargo to build it) is available
pub fn cli_tests_available() -> bool {
    if CliTestContext::get_wb_binary().is_some() {
        return true;
    }
    CliTestContext::find_workspace_root().is_some()
        && Command::new("cargo").arg("--version").output().is_ok()
}

/// A temporary workspace plus an optional background daemon
#[derive(Debug)]
pub struct CliTestContext {
    pub temp_dir: TempDir,
    pub project_root: PathBuf,
    daemon: Option<Child>,
}

impl CliTestContext {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let project_root = temp_dir.path().to_path_buf();
        Ok(Self {
            temp_dir,
            project_root,
            daemon: None,
        })
    }

    /// Write workbench.toml at the project root
    pub fn write_config(&self, content: &str) -> Result<()> {
        std::fs::write(self.project_root.join("workbench.toml"), content)?;
        Ok(())
    }

    /// Write a file relative to the project root, creating parents
    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let file_path = self.project_root.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(())
    }

    pub fn socket_path(&self) -> Result<PathBuf> {
        Ok(WorkspaceContext::discover(&self.project_root)?.socket_path())
    }

    pub fn lock_path(&self) -> Result<PathBuf> {
        Ok(WorkspaceContext::discover(&self.project_root)?.lock_path())
    }

    /// Read a file relative to the project root
    pub fn read_file(&self, path: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.project_root.join(path))?)
    }

    /// Concatenated contents of the daemon's rolling log files
    pub fn daemon_log(&self) -> Result<String> {
        let log_dir = WorkspaceContext::discover(&self.project_root)?.log_dir();
        let mut content = String::new();
        if !log_dir.exists() {
            return Ok(content);
        }
        for entry in std::fs::read_dir(&log_dir)? {
            let path = entry?.path();
            let is_daemon_log = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("daemon.log"));
            if is_daemon_log {
                content.push_str(&std::fs::read_to_string(&path)?);
            }
        }
        Ok(content)
    }

    /// Wait until the daemon log contains `text`
    pub fn wait_for_daemon_log(&self, text: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.daemon_log()?.contains(text) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Find the workspace root by looking for Cargo.toml with [workspace]
    pub fn find_workspace_root() -> Option<PathBuf> {
        let start_dir = std::env::var("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .ok()?;

        let mut current = start_dir.as_path();
        loop {
            let cargo_toml = current.join("Cargo.toml");
            if let Ok(content) = std::fs::read_to_string(&cargo_toml) {
                if content.contains("[workspace]") {
                    return Some(current.to_path_buf());
                }
            }
            current = current.parent()?;
        }
    }

    /// Path to a built `wb` binary, release preferred
    pub fn get_wb_binary() -> Option<PathBuf> {
        let target_dir = std::env::var("CARGO_TARGET_DIR")
            .map(PathBuf::from)
            .ok()
            .or_else(|| Self::find_workspace_root().map(|root| root.join("target")))?;
        ["release", "debug"]
            .iter()
            .map(|profile| target_dir.join(profile).join(BINARY))
            .find(|path| path.exists())
    }

    fn command(&self) -> Result<Command> {
        let mut cmd = match Self::get_wb_binary() {
            Some(binary) => Command::new(binary),
            None => {
                let root = Self::find_workspace_root()
                    .ok_or_else(|| anyhow::anyhow!("Could not find workspace root"))?;
                let mut cargo = Command::new("cargo");
                cargo
                    .args(["run", "--quiet", "--bin", BINARY, "--manifest-path"])
                    .arg(root.join("Cargo.toml"))
                    .arg("--");
                cargo
            }
        };
        cmd.current_dir(&self.project_root);
        cmd.env("RUST_BACKTRACE", "1");
        cmd.env_remove("WORKBENCH_LOG");
        cmd.env_remove("RUST_LOG");
        Ok(cmd)
    }

    /// Run `wb` with `args` in the project root and capture its output
    pub fn execute_cli_command(&self, args: &[&str]) -> Result<CommandResult> {
        let output = self.command()?.args(args).output()?;
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            success: output.status.success(),
        })
    }

    /// Start `wb daemon start` in the background and wait for its socket
    pub fn start_daemon(&mut self) -> Result<()> {
        let socket = self.socket_path()?;
        let child = self
            .command()?
            .args(["daemon", "start"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.daemon = Some(child);

        let deadline = Instant::now() + DAEMON_START_TIMEOUT;
        while !socket_ready(&socket) {
            if Instant::now() >= deadline {
                anyhow::bail!("daemon socket {:?} did not appear", socket);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }

    /// Wait for the background daemon to exit, killing it after `timeout`
    pub fn wait_for_daemon_exit(&mut self, timeout: Duration) -> Result<bool> {
        let Some(child) = self.daemon.as_mut() else {
            return Ok(true);
        };
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if child.try_wait()?.is_some() {
                self.daemon = None;
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(false)
    }
}

fn socket_ready(socket: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(socket).is_ok()
}

impl Drop for CliTestContext {
    fn drop(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Captured result of one `wb` run
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

impl CommandResult {
    pub fn assert_success(&self) {
        assert!(
            self.success,
            "Command failed with exit code {}\nstdout: {}\nstderr: {}",
            self.exit_code, self.stdout, self.stderr
        );
    }

    pub fn assert_failure(&self) {
        assert!(
            !self.success,
            "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
            self.stdout, self.stderr
        );
    }

    pub fn assert_output_contains(&self, text: &str) {
        assert!(
            self.stdout.contains(text) || self.stderr.contains(text),
            "Output does not contain {:?}\nstdout: {}\nstderr: {}",
            text,
            self.stdout,
            self.stderr
        );
    }

    /// Parse stdout as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}
