//! In-memory provider with canned responses

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use workbench_sdk::provider::{ProviderManifest, ToolProvider, VENDOR_PREFIX};
use workbench_sdk::{Result, RouterError};

type Responder = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// A provider answering from registered responders and recording every call
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    provider_type: String,
    manifest: ProviderManifest,
    responders: IndexMap<String, Responder>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl MockProvider {
    pub fn new(provider_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type: provider_type.into(),
            manifest: ProviderManifest::default(),
            responders: IndexMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `tool` with a fixed value
    pub fn with_tool(self, tool: impl Into<String>, response: Value) -> Self {
        self.with_responder(tool, move |_| Ok(response.clone()))
    }

    /// Answer `tool` with a function of the input
    pub fn with_responder<F>(mut self, tool: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        let tool = tool.into();
        if !self.manifest.tools.contains(&tool) {
            self.manifest.tools.push(tool.clone());
        }
        self.responders.insert(tool, Arc::new(responder));
        self
    }

    /// Answer `vendor.<namespace>.<method>` with a fixed value
    pub fn with_vendor_tool(
        mut self,
        namespace: impl Into<String>,
        method: impl Into<String>,
        response: Value,
    ) -> Self {
        let namespace = namespace.into();
        let method = method.into();
        let key = format!("{}.{}.{}", VENDOR_PREFIX, namespace, method);
        self.manifest
            .vendor_tools
            .entry(namespace)
            .or_default()
            .push(method);
        let responder: Responder = Arc::new(move |_: &Value| -> Result<Value> { Ok(response.clone()) });
        self.responders.insert(key, responder);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.manifest.capabilities.push(capability.into());
        self
    }

    pub fn with_required_token(mut self, token: impl Into<String>) -> Self {
        self.manifest.required_tokens.push(token.into());
        self
    }

    /// Calls received so far as `(procedure, input)` pairs
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn respond(&self, procedure: String, input: Value) -> Result<Value> {
        let responder = self.responders.get(&procedure).cloned();
        let result = match &responder {
            Some(responder) => responder(&input),
            None => Err(RouterError::UnsupportedProcedure {
                provider: self.name.clone(),
                procedure: procedure.clone(),
                supported: self.manifest.supported_procedures(),
            }),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((procedure, input));
        }
        result
    }
}

#[async_trait]
impl ToolProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn manifest(&self) -> &ProviderManifest {
        &self.manifest
    }

    async fn call_tool(&self, tool: &str, input: Value) -> Result<Value> {
        self.respond(tool.to_string(), input)
    }

    async fn call_vendor(&self, namespace: &str, method: &str, input: Value) -> Result<Value> {
        self.respond(format!("{}.{}.{}", VENDOR_PREFIX, namespace, method), input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_canned_and_computed_responses() -> anyhow::Result<()> {
        let mock = MockProvider::new("ci", "mock")
            .with_tool("pr.list", json!([]))
            .with_responder("pr.get", |input| Ok(json!({"number": input["number"]})));

        assert_eq!(mock.call_tool("pr.list", json!({})).await?, json!([]));
        assert_eq!(
            mock.call_tool("pr.get", json!({"number": 4})).await?,
            json!({"number": 4})
        );
        assert_eq!(mock.calls().len(), 2);
        assert_eq!(mock.manifest().tools, vec!["pr.list", "pr.get"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_vendor_tools_are_declared() -> anyhow::Result<()> {
        let mock = MockProvider::new("ci", "mock").with_vendor_tool("github", "search", json!(1));
        assert!(mock.manifest().supports("vendor.github.search"));
        assert_eq!(mock.call_vendor("github", "search", Value::Null).await?, json!(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_is_unsupported() {
        let mock = MockProvider::new("ci", "mock").with_tool("pr.list", json!([]));
        let err = mock.call_tool("run.list", json!({})).await.unwrap_err();
        match err {
            RouterError::UnsupportedProcedure { supported, .. } => {
                assert_eq!(supported, vec!["pr.list"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
