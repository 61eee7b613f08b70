//! Immutable collections of procedure contracts

use crate::cli::CliShape;
use crate::contract::{ProcedureContract, ProcedureExample};
use crate::error::{Result, RouterError};
use crate::schema::FieldSpec;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Schema-derived description of one procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDescription {
    pub path: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ProcedureExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub input: Vec<FieldSpec>,
    pub cli: CliShape,
}

impl<C> From<&ProcedureContract<C>> for ProcedureDescription {
    fn from(contract: &ProcedureContract<C>) -> Self {
        let meta = contract.get_meta();
        Self {
            path: contract.path().to_string(),
            title: meta.title.clone(),
            description: meta.description.clone(),
            timeout_ms: meta.timeout_ms,
            idempotent: meta.idempotent,
            examples: meta.examples.clone(),
            tool: contract.tool().map(str::to_string),
            input: contract.input_schema().fields().to_vec(),
            cli: CliShape::from_schema(contract.input_schema()),
        }
    }
}

/// Builder collecting contracts before a router is frozen
pub struct RouterBuilder<C> {
    name: String,
    provider_type: Option<String>,
    contracts: IndexMap<String, ProcedureContract<C>>,
}

impl<C> RouterBuilder<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type: None,
            contracts: IndexMap::new(),
        }
    }

    /// Provider type resolved for calls into this router
    pub fn provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = Some(provider_type.into());
        self
    }

    /// Add a contract; paths must be unique
    pub fn register(mut self, contract: ProcedureContract<C>) -> Result<Self> {
        if self.contracts.contains_key(contract.path()) {
            return Err(RouterError::DuplicatePath(contract.path().to_string()));
        }
        self.contracts.insert(contract.path().to_string(), contract);
        Ok(self)
    }

    /// Nest another router's contracts under `prefix.`
    pub fn mount(mut self, prefix: &str, router: Router<C>) -> Result<Self> {
        for (_, contract) in router.contracts {
            self = self.register(contract.prefixed(prefix))?;
        }
        Ok(self)
    }

    pub fn build(self) -> Router<C> {
        debug!(
            router = %self.name,
            procedures = self.contracts.len(),
            "Router built"
        );
        Router {
            name: self.name,
            provider_type: self.provider_type,
            contracts: self.contracts,
        }
    }
}

/// A named, immutable mapping of paths to contracts
pub struct Router<C> {
    name: String,
    provider_type: Option<String>,
    contracts: IndexMap<String, ProcedureContract<C>>,
}

impl<C> std::fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("paths", &self.paths())
            .finish()
    }
}

impl<C> Router<C> {
    pub fn builder(name: impl Into<String>) -> RouterBuilder<C> {
        RouterBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider_type(&self) -> Option<&str> {
        self.provider_type.as_deref()
    }

    /// Look up a contract by exact path
    pub fn contract(&self, path: &str) -> Result<&ProcedureContract<C>> {
        self.contracts
            .get(path)
            .ok_or_else(|| RouterError::UnknownProcedure(path.to_string()))
    }

    /// Registered paths in registration order
    pub fn paths(&self) -> Vec<&str> {
        self.contracts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Describe every procedure from its schema alone
    pub fn describe(&self) -> Vec<ProcedureDescription> {
        self.contracts.values().map(ProcedureDescription::from).collect()
    }

    /// Look up, validate, run and check one procedure
    pub async fn call(&self, path: &str, input: Value, ctx: C) -> Result<Value> {
        let contract = self.contract(path)?;
        debug!(router = %self.name, path, "Calling procedure");
        contract.call(input, ctx).await
    }

    /// Bind a fixed context so the router can be served as a [`Service`]
    pub fn with_context(self, ctx: C) -> ContextRouter<C> {
        ContextRouter {
            router: Arc::new(self),
            ctx,
        }
    }
}

/// Transport-facing seam: anything that can answer `path + input`
#[async_trait]
pub trait Service: Send + Sync {
    async fn call(&self, path: &str, input: Value) -> Result<Value>;

    fn describe(&self) -> Vec<ProcedureDescription>;
}

/// A router paired with the context every call receives
pub struct ContextRouter<C> {
    router: Arc<Router<C>>,
    ctx: C,
}

impl<C> ContextRouter<C> {
    pub fn router(&self) -> &Router<C> {
        &self.router
    }
}

#[async_trait]
impl<C> Service for ContextRouter<C>
where
    C: Clone + Send + Sync + 'static,
{
    async fn call(&self, path: &str, input: Value) -> Result<Value> {
        self.router.call(path, input, self.ctx.clone()).await
    }

    fn describe(&self) -> Vec<ProcedureDescription> {
        self.router.describe()
    }
}

#[async_trait]
impl Service for Router<()> {
    async fn call(&self, path: &str, input: Value) -> Result<Value> {
        Router::call(self, path, input, ()).await
    }

    fn describe(&self) -> Vec<ProcedureDescription> {
        Router::describe(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    fn echo() -> ProcedureContract<()> {
        ProcedureContract::new("echo", |input, _ctx: ()| async move { Ok(input) })
            .input(Schema::object().field(FieldSpec::string("text").required()))
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let result = Router::builder("test")
            .register(echo())
            .and_then(|b| b.register(echo()));
        match result {
            Err(RouterError::DuplicatePath(path)) => assert_eq!(path, "echo"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("duplicate registration succeeded"),
        }
    }

    #[test]
    fn test_mount_prefixes_paths() -> anyhow::Result<()> {
        let inner = Router::builder("inner").register(echo())?.build();
        let outer = Router::builder("outer").mount("tools", inner)?.build();
        assert_eq!(outer.paths(), vec!["tools.echo"]);
        Ok(())
    }

    #[test]
    fn test_describe_preserves_registration_order() -> anyhow::Result<()> {
        let router = Router::builder("test")
            .register(ProcedureContract::new("b", |i, _c: ()| async move { Ok(i) }))?
            .register(ProcedureContract::new("a", |i, _c: ()| async move { Ok(i) }))?
            .build();
        let paths: Vec<_> = router.describe().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["b", "a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unit_router_is_a_service() -> anyhow::Result<()> {
        let router = Router::builder("test").register(echo())?.build();
        let service: &dyn Service = &router;
        let out = service.call("echo", json!({"text": "hi"})).await?;
        assert_eq!(out, json!({"text": "hi"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_context_router_passes_context() -> anyhow::Result<()> {
        let router = Router::builder("ctx")
            .register(ProcedureContract::new(
                "whoami",
                |_input, ctx: String| async move { Ok(json!({ "name": ctx })) },
            ))?
            .build()
            .with_context("ada".to_string());
        let out = router.call("whoami", Value::Null).await?;
        assert_eq!(out, json!({"name": "ada"}));
        Ok(())
    }
}
