//! Provider-facing surface: manifests and the tool-calling trait
//!
//! A provider is a pluggable backend for one provider type (`ci`,
//! `issues`, `installer`, ...). The router never inspects a provider
//! beyond its manifest and the two call methods below.

use crate::error::{Result, RouterError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix that marks a vendor-namespaced procedure
pub const VENDOR_PREFIX: &str = "vendor";

/// Split `vendor.<namespace>.<method>` into its parts
pub fn parse_vendor_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(VENDOR_PREFIX)?.strip_prefix('.')?;
    let (namespace, method) = rest.split_once('.')?;
    if namespace.is_empty() || method.is_empty() {
        return None;
    }
    Some((namespace, method))
}

/// What a provider declares it can do
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderManifest {
    /// Free-form capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Environment tokens the provider needs to operate
    #[serde(default)]
    pub required_tokens: Vec<String>,
    /// Tool names, matching procedure paths (`pr.list`)
    #[serde(default)]
    pub tools: Vec<String>,
    /// Vendor extensions: namespace -> methods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vendor_tools: BTreeMap<String, Vec<String>>,
}

impl ProviderManifest {
    pub fn with_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Every procedure this provider answers, vendor tools included
    pub fn supported_procedures(&self) -> Vec<String> {
        let mut out = self.tools.clone();
        for (namespace, methods) in &self.vendor_tools {
            for method in methods {
                out.push(format!("{}.{}.{}", VENDOR_PREFIX, namespace, method));
            }
        }
        out
    }

    pub fn supports(&self, procedure: &str) -> bool {
        if let Some((namespace, method)) = parse_vendor_path(procedure) {
            return self
                .vendor_tools
                .get(namespace)
                .is_some_and(|methods| methods.iter().any(|m| m == method));
        }
        self.tools.iter().any(|t| t == procedure)
    }
}

/// A backend implementing tools for one provider type
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name (e.g., "github")
    fn name(&self) -> &str;

    /// Provider type (e.g., "ci")
    fn provider_type(&self) -> &str;

    fn manifest(&self) -> &ProviderManifest;

    /// Invoke a tool declared in the manifest
    async fn call_tool(&self, tool: &str, input: Value) -> Result<Value>;

    /// Invoke a vendor-namespaced method
    async fn call_vendor(&self, namespace: &str, method: &str, _input: Value) -> Result<Value> {
        Err(RouterError::UnsupportedProcedure {
            provider: self.name().to_string(),
            procedure: format!("{}.{}.{}", VENDOR_PREFIX, namespace, method),
            supported: self.manifest().supported_procedures(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ProviderManifest {
        let mut manifest = ProviderManifest::with_tools(["pr.list", "pr.get"]);
        manifest
            .vendor_tools
            .insert("github".into(), vec!["search".into()]);
        manifest
    }

    #[test]
    fn test_parse_vendor_path() {
        assert_eq!(parse_vendor_path("vendor.github.search"), Some(("github", "search")));
        assert_eq!(parse_vendor_path("vendor.github.search.code"), Some(("github", "search.code")));
        assert_eq!(parse_vendor_path("vendor.github"), None);
        assert_eq!(parse_vendor_path("vendors.github.search"), None);
        assert_eq!(parse_vendor_path("pr.list"), None);
    }

    #[test]
    fn test_supports_tools_and_vendor_tools() {
        let manifest = manifest();
        assert!(manifest.supports("pr.list"));
        assert!(manifest.supports("vendor.github.search"));
        assert!(!manifest.supports("run.list"));
        assert!(!manifest.supports("vendor.gitlab.search"));
    }

    #[test]
    fn test_supported_procedures_lists_vendor_paths() {
        assert_eq!(
            manifest().supported_procedures(),
            vec!["pr.list", "pr.get", "vendor.github.search"]
        );
    }

    #[test]
    fn test_manifest_json_uses_camel_case() {
        let mut manifest = ProviderManifest::default();
        manifest.required_tokens.push("GITHUB_TOKEN".into());
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["requiredTokens"][0], "GITHUB_TOKEN");
    }
}
