//! Configuration module
//!
//! Handles loading and discovery of `workbench.toml`.

pub mod model;

use anyhow::Context;
use std::path::{Path, PathBuf};

pub use self::model::*;

/// File name searched for when discovering a workspace
pub const CONFIG_FILE_NAME: &str = "workbench.toml";

impl WorkbenchConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse TOML config: {:?}", path))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Walk up the directory tree to find workbench.toml
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    None
}
