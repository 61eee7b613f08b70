//! `workspace` module: procedures that need no provider

use serde::Serialize;
use serde_json::Value;
use workbench_common::WorkspaceContext;
use workbench_daemon::ProviderContext;
use workbench_sdk::{FieldSpec, ProcedureContract, Result, Router, Schema};

pub const MODULE: &str = "workspace";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceInfo {
    name: String,
    root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    extension_dirs: Vec<String>,
    repo_dirs: Vec<String>,
    providers: indexmap::IndexMap<String, String>,
}

impl WorkspaceInfo {
    fn from_context(workspace: &WorkspaceContext) -> Self {
        let display = |paths: Vec<std::path::PathBuf>| {
            paths
                .into_iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
        };
        Self {
            name: workspace.name(),
            root: workspace.root.display().to_string(),
            config_path: workspace
                .config_path
                .as_ref()
                .map(|p| p.display().to_string()),
            extension_dirs: display(workspace.extension_dirs()),
            repo_dirs: display(workspace.repo_dirs()),
            providers: workspace.config.providers.clone(),
        }
    }
}

pub fn router(workspace: &WorkspaceContext) -> Result<Router<ProviderContext>> {
    let info = serde_json::to_value(WorkspaceInfo::from_context(workspace))?;

    Ok(Router::builder(MODULE)
        .register(
            ProcedureContract::new("echo", |input: Value, _ctx: ProviderContext| async move {
                Ok(input)
            })
            .input(
                Schema::object().field(
                    FieldSpec::string("text")
                        .required()
                        .describe("Text to echo back"),
                ),
            )
            .title("Echo")
            .description("Return the input unchanged")
            .idempotent()
            .example("Echo a greeting", serde_json::json!({"text": "hi"})),
        )?
        .register(
            ProcedureContract::new("info", move |_input: Value, _ctx: ProviderContext| {
                let info = info.clone();
                async move { Ok(info) }
            })
            .title("Workspace info")
            .description("Show the workspace root, config file and provider selection")
            .idempotent(),
        )?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workbench_common::config::WorkbenchConfig;

    fn ctx() -> ProviderContext {
        ProviderContext::new(None, "/ws")
    }

    #[tokio::test]
    async fn test_echo() -> anyhow::Result<()> {
        let workspace = WorkspaceContext::with_config(std::path::Path::new("/ws"), WorkbenchConfig::default());
        let router = router(&workspace)?;
        let out = router.call("echo", json!({"text": "hi"}), ctx()).await?;
        assert_eq!(out, json!({"text": "hi"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_info_reports_workspace() -> anyhow::Result<()> {
        let config = WorkbenchConfig::parse("[workspace]\nname = \"demo\"\n[providers]\nci = \"mock\"\n")?;
        let workspace = WorkspaceContext::with_config(std::path::Path::new("/ws"), config);
        let out = router(&workspace)?.call("info", json!({}), ctx()).await?;
        assert_eq!(out["name"], "demo");
        assert_eq!(out["root"], "/ws");
        assert_eq!(out["providers"]["ci"], "mock");
        assert!(out.get("configPath").is_none());
        Ok(())
    }
}
