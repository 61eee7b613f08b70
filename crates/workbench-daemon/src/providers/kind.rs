//! The closed set of provider backends held by the registry

use super::{CommandProvider, MockProvider};
use serde_json::Value;
use std::sync::Arc;
use workbench_sdk::provider::{ProviderManifest, ToolProvider, parse_vendor_path};
use workbench_sdk::Result;

/// Every provider shape the registry can hold
#[derive(Clone)]
pub enum ProviderKind {
    /// Declared by a `provider.toml` in an extension directory
    Command(CommandProvider),
    /// Canned responses
    Mock(MockProvider),
    /// Rust providers registered through a factory
    Native(Arc<dyn ToolProvider>),
}

impl std::fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Command(p) => f.debug_tuple("Command").field(p).finish(),
            ProviderKind::Mock(p) => f.debug_tuple("Mock").field(p).finish(),
            ProviderKind::Native(p) => f.debug_tuple("Native").field(&p.name()).finish(),
        }
    }
}

impl ProviderKind {
    fn inner(&self) -> &dyn ToolProvider {
        match self {
            ProviderKind::Command(p) => p,
            ProviderKind::Mock(p) => p,
            ProviderKind::Native(p) => p.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner().name()
    }

    pub fn provider_type(&self) -> &str {
        self.inner().provider_type()
    }

    pub fn manifest(&self) -> &ProviderManifest {
        self.inner().manifest()
    }

    /// Short label for where the provider came from
    pub fn source(&self) -> String {
        match self {
            ProviderKind::Command(p) => p.dir().display().to_string(),
            ProviderKind::Mock(_) => "mock".to_string(),
            ProviderKind::Native(_) => "native".to_string(),
        }
    }

    /// Call a procedure by path; `vendor.<ns>.<method>` goes to the vendor surface
    pub async fn call(&self, procedure: &str, input: Value) -> Result<Value> {
        let provider = self.inner();
        match parse_vendor_path(procedure) {
            Some((namespace, method)) => provider.call_vendor(namespace, method, input).await,
            None => provider.call_tool(procedure, input).await,
        }
    }

    /// Required tokens not present in the environment
    pub fn missing_tokens(&self) -> Vec<String> {
        self.manifest()
            .required_tokens
            .iter()
            .filter(|token| std::env::var_os(token.as_str()).is_none())
            .cloned()
            .collect()
    }
}

impl From<CommandProvider> for ProviderKind {
    fn from(provider: CommandProvider) -> Self {
        ProviderKind::Command(provider)
    }
}

impl From<MockProvider> for ProviderKind {
    fn from(provider: MockProvider) -> Self {
        ProviderKind::Mock(provider)
    }
}
