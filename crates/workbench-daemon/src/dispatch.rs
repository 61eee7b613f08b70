//! Context resolution between a caller and the module routers
//!
//! A full procedure path is `<module>.<procedure>`. The dispatcher picks the
//! module router, resolves the provider the module's calls need, and hands
//! the handler a [`ProviderContext`].

use crate::providers::{ProviderKind, ProviderRegistry};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use workbench_sdk::{ProcedureDescription, Result, Router, RouterError, Service};

/// What a handler receives alongside its input
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Provider resolved for this call, if the module has a provider type
    pub provider: Option<Arc<ProviderKind>>,
    pub workspace_root: PathBuf,
}

impl ProviderContext {
    pub fn new(provider: Option<Arc<ProviderKind>>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            workspace_root: workspace_root.into(),
        }
    }

    /// The resolved provider, or a handler error when there is none
    pub fn provider(&self) -> Result<&ProviderKind> {
        self.provider
            .as_deref()
            .ok_or_else(|| RouterError::handler("No provider was resolved for this procedure"))
    }

    /// Forward a call to the resolved provider
    pub async fn call_tool(&self, procedure: &str, input: Value) -> Result<Value> {
        self.provider()?.call(procedure, input).await
    }
}

/// Result of a dispatched call and the provider that served it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatched {
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Routes `<module>.<procedure>` calls through provider resolution
pub struct Dispatcher {
    modules: IndexMap<String, Arc<Router<ProviderContext>>>,
    registry: Arc<ProviderRegistry>,
    configured: IndexMap<String, String>,
    explicit: Option<String>,
    workspace_root: PathBuf,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            modules: IndexMap::new(),
            registry,
            configured: IndexMap::new(),
            explicit: None,
            workspace_root: workspace_root.into(),
        }
    }

    /// Add a module router; the router name is the module name
    pub fn module(mut self, router: Router<ProviderContext>) -> Result<Self> {
        let name = router.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(RouterError::DuplicatePath(name));
        }
        self.modules.insert(name, Arc::new(router));
        Ok(self)
    }

    /// Provider names configured per provider type
    pub fn configured(mut self, configured: IndexMap<String, String>) -> Self {
        self.configured = configured;
        self
    }

    /// Provider name used for every call unless a call names its own
    pub fn explicit(mut self, name: Option<String>) -> Self {
        self.explicit = name;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn modules(&self) -> impl Iterator<Item = &Router<ProviderContext>> {
        self.modules.values().map(Arc::as_ref)
    }

    pub fn router(&self, module: &str) -> Option<&Router<ProviderContext>> {
        self.modules.get(module).map(Arc::as_ref)
    }

    /// Split `<module>.<procedure>` at the first dot
    pub fn split_path(full_path: &str) -> Result<(&str, &str)> {
        match full_path.split_once('.') {
            Some((module, path)) if !module.is_empty() && !path.is_empty() => Ok((module, path)),
            _ => Err(RouterError::UnknownProcedure(full_path.to_string())),
        }
    }

    /// Call `path` on `module`
    ///
    /// Checks run in order: contract lookup, provider resolution, input
    /// validation, tool support, then the handler and output validation.
    pub async fn dispatch(
        &self,
        module: &str,
        path: &str,
        input: Value,
        explicit: Option<&str>,
    ) -> Result<Dispatched> {
        let router = self
            .modules
            .get(module)
            .ok_or_else(|| RouterError::UnknownProcedure(format!("{}.{}", module, path)))?;
        let contract = router.contract(path)?;

        let provider = match router.provider_type() {
            Some(provider_type) => {
                let explicit = explicit.or(self.explicit.as_deref());
                let configured = self.configured.get(provider_type).map(String::as_str);
                Some(self.registry.resolve(provider_type, explicit, configured)?)
            }
            None => None,
        };

        let input = contract.validate_input(input)?;

        if let (Some(tool), Some(provider)) = (contract.tool(), provider.as_deref()) {
            self.registry.assert_supports(provider, tool)?;
        }

        let provider_name = provider.as_ref().map(|p| p.name().to_string());
        debug!(
            module,
            path,
            provider = provider_name.as_deref().unwrap_or("-"),
            "Dispatching procedure"
        );
        let ctx = ProviderContext::new(provider, self.workspace_root.clone());
        let result = contract.invoke(input, ctx).await?;

        Ok(Dispatched {
            result,
            provider: provider_name,
        })
    }

    /// Dispatch a full `<module>.<procedure>` path
    pub async fn dispatch_path(
        &self,
        full_path: &str,
        input: Value,
        explicit: Option<&str>,
    ) -> Result<Dispatched> {
        let (module, path) = Self::split_path(full_path)?;
        self.dispatch(module, path, input, explicit).await
    }

    /// Paths available under `module`, for error listings
    pub fn available(&self, module: &str) -> Vec<String> {
        self.modules
            .get(module)
            .map(|router| router.paths().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Service for Dispatcher {
    async fn call(&self, path: &str, input: Value) -> Result<Value> {
        Ok(self.dispatch_path(path, input, None).await?.result)
    }

    fn describe(&self) -> Vec<ProcedureDescription> {
        self.modules
            .iter()
            .flat_map(|(module, router)| {
                router.describe().into_iter().map(move |mut d| {
                    d.path = format!("{}.{}", module, d.path);
                    d
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use workbench_sdk::{ErrorKind, FieldSpec, ProcedureContract, Schema};

    fn ci_router(calls: Arc<AtomicUsize>) -> Router<ProviderContext> {
        let get_calls = Arc::clone(&calls);
        Router::builder("ci")
            .provider_type("ci")
            .register(
                ProcedureContract::new("pr.get", move |input, ctx: ProviderContext| {
                    get_calls.fetch_add(1, Ordering::SeqCst);
                    async move { ctx.call_tool("pr.get", input).await }
                })
                .input(Schema::object().field(FieldSpec::integer("number").required()))
                .requires_tool("pr.get"),
            )
            .and_then(|b| {
                b.register(
                    ProcedureContract::new("run.list", move |input, ctx: ProviderContext| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move { ctx.call_tool("run.list", input).await }
                    })
                    .requires_tool("run.list"),
                )
            })
            .expect("router builds")
            .build()
    }

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(
            ProviderRegistry::builder()
                .register(
                    MockProvider::new("ci", "mock")
                        .with_responder("pr.get", |input| Ok(json!({"number": input["number"]}))),
                )
                .register(MockProvider::new("ci", "other").with_tool("pr.get", json!({"other": true})))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_dispatch_resolves_provider() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(registry(), "/ws").module(ci_router(calls))?;

        let out = dispatcher.dispatch("ci", "pr.get", json!({"number": 7}), None).await?;
        assert_eq!(out.result, json!({"number": 7}));
        assert_eq!(out.provider.as_deref(), Some("mock"));

        let out = dispatcher
            .dispatch("ci", "pr.get", json!({"number": 7}), Some("other"))
            .await?;
        assert_eq!(out.provider.as_deref(), Some("other"));
        Ok(())
    }

    #[tokio::test]
    async fn test_configured_provider_is_used() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut configured = IndexMap::new();
        configured.insert("ci".to_string(), "other".to_string());
        let dispatcher = Dispatcher::new(registry(), "/ws")
            .module(ci_router(calls))?
            .configured(configured);

        let out = dispatcher.dispatch_path("ci.pr.get", json!({"number": 1}), None).await?;
        assert_eq!(out.result, json!({"other": true}));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_provider_fails_before_validation() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let empty = Arc::new(ProviderRegistry::builder().build());
        let dispatcher = Dispatcher::new(empty, "/ws").module(ci_router(Arc::clone(&calls)))?;

        let err = dispatcher.dispatch("ci", "pr.get", json!({}), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_tool_checked_after_validation() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(registry(), "/ws").module(ci_router(Arc::clone(&calls)))?;

        let err = dispatcher.dispatch("ci", "run.list", json!({"x": 1}), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = dispatcher.dispatch("ci", "run.list", json!({}), None).await.unwrap_err();
        match err {
            RouterError::UnsupportedProcedure { supported, .. } => {
                assert_eq!(supported, vec!["pr.get"])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_service_paths_and_describe() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(registry(), "/ws").module(ci_router(calls))?;
        let service: &dyn Service = &dispatcher;

        let paths: Vec<_> = service.describe().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["ci.pr.get", "ci.run.list"]);

        let err = service.call("nope.pr.get", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownProcedure);
        let err = service.call("ci", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownProcedure);
        Ok(())
    }
}
