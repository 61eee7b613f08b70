//! Assembly of the registry, modules and dispatcher for one workspace

use crate::modules;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use workbench_common::WorkspaceContext;
use workbench_daemon::{Dispatcher, ProviderRegistry};

/// Everything a command needs to call procedures in a workspace
pub struct Workbench {
    pub workspace: WorkspaceContext,
    pub dispatcher: Arc<Dispatcher>,
}

impl Workbench {
    /// Discover the workspace enclosing `start_dir` and wire it up
    pub fn load(start_dir: &Path, provider: Option<String>) -> anyhow::Result<Self> {
        let workspace =
            WorkspaceContext::discover(start_dir).context("Failed to load workspace configuration")?;
        Self::from_workspace(workspace, provider)
    }

    pub fn from_workspace(
        workspace: WorkspaceContext,
        provider: Option<String>,
    ) -> anyhow::Result<Self> {
        let registry = modules::mock::register(ProviderRegistry::builder())
            .discover(&workspace.extension_dirs(), &workspace.repo_dirs())
            .build();
        debug!(
            root = %workspace.root.display(),
            providers = registry.len(),
            failures = registry.report().failures.len(),
            "Provider registry built"
        );

        let mut dispatcher = Dispatcher::new(Arc::new(registry), workspace.root.clone())
            .configured(workspace.config.providers.clone())
            .explicit(provider);
        for router in modules::builtin(&workspace)? {
            dispatcher = dispatcher.module(router)?;
        }

        Ok(Self {
            workspace,
            dispatcher: Arc::new(dispatcher),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use workbench_sdk::ErrorKind;

    #[tokio::test]
    async fn test_mock_providers_serve_builtin_modules() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let app = Workbench::load(dir.path(), None)?;

        let out = app
            .dispatcher
            .dispatch("ci", "pr.get", json!({"number": 42}), None)
            .await?;
        assert_eq!(out.provider.as_deref(), Some("mock"));
        assert_eq!(out.result["title"], "Add provider discovery");
        Ok(())
    }

    #[tokio::test]
    async fn test_configured_provider_must_exist() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("workbench.toml"),
            "[providers]\nci = \"github\"\n",
        )?;
        let app = Workbench::load(dir.path(), None)?;

        let err = app
            .dispatcher
            .dispatch("ci", "pr.list", json!({}), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotFound);
        assert_eq!(err.to_string(), "Provider 'github' of type 'ci' not found");
        Ok(())
    }

    #[tokio::test]
    async fn test_discovered_command_provider_is_selectable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let provider_dir = dir.path().join(".workbench/extensions/local-issues");
        fs::create_dir_all(&provider_dir)?;
        fs::write(
            provider_dir.join("provider.toml"),
            r#"
name = "local-issues"
type = "issues"

[tools."issue.create"]
command = ["cat"]
"#,
        )?;
        let app = Workbench::load(dir.path(), Some("local-issues".to_string()))?;

        let out = app
            .dispatcher
            .dispatch("issues", "issue.create", json!({"title": "t"}), None)
            .await?;
        assert_eq!(out.provider.as_deref(), Some("local-issues"));
        assert_eq!(out.result, json!({"title": "t"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_only_mock_rejects_create() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let app = Workbench::load(dir.path(), None)?;

        let err = app
            .dispatcher
            .dispatch("issues", "issue.create", json!({"title": "t"}), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedProcedure);
        Ok(())
    }
}
