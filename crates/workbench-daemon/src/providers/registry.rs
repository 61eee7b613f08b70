//! Provider registry: explicit factories plus extension-directory discovery
//!
//! Providers are registered once at startup and indexed by
//! `(provider type, provider name)`. Discovery of one provider never aborts
//! discovery of the others: failures are logged and collected in a
//! [`DiscoveryReport`].

use super::command::{CommandProvider, MANIFEST_FILE};
use super::ProviderKind;
use crate::error::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use workbench_sdk::{RouterError, ToolProvider};

/// Extension directory inside a linked repository
pub const REPO_EXTENSION_DIR: &str = ".workbench/extensions";

/// Constructor for a provider registered at startup
pub type ProviderFactory = Box<dyn FnOnce() -> Result<ProviderKind> + Send>;

enum Pending {
    Factory {
        provider_type: String,
        name: String,
        factory: ProviderFactory,
    },
    Ready {
        provider: ProviderKind,
        source: String,
    },
}

/// One provider that could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryFailure {
    /// Directory or factory the failure came from
    pub source: String,
    pub error: String,
}

/// Outcome of building the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryReport {
    /// `(type, name)` of every registered provider, in order
    pub loaded: Vec<(String, String)>,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    fn fail(&mut self, source: impl Into<String>, error: impl ToString) {
        let failure = DiscoveryFailure {
            source: source.into(),
            error: error.to_string(),
        };
        warn!(source = %failure.source, "Skipping provider: {}", failure.error);
        self.failures.push(failure);
    }
}

/// Collects providers before the registry is frozen
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    pending: Vec<Pending>,
    report: DiscoveryReport,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider constructor under `(provider_type, name)`
    pub fn register_factory<F>(
        mut self,
        provider_type: impl Into<String>,
        name: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: FnOnce() -> Result<ProviderKind> + Send + 'static,
    {
        self.pending.push(Pending::Factory {
            provider_type: provider_type.into(),
            name: name.into(),
            factory: Box::new(factory),
        });
        self
    }

    /// Register an already constructed provider
    pub fn register(mut self, provider: impl Into<ProviderKind>) -> Self {
        let provider = provider.into();
        let source = provider.source();
        self.pending.push(Pending::Ready { provider, source });
        self
    }

    /// Scan extension directories and linked repositories for `provider.toml`
    ///
    /// Each immediate subdirectory holding a manifest is one provider.
    /// Missing directories are skipped silently.
    pub fn discover(mut self, extension_dirs: &[PathBuf], repo_dirs: &[PathBuf]) -> Self {
        let repo_extension_dirs = repo_dirs.iter().map(|repo| repo.join(REPO_EXTENSION_DIR));
        let dirs: Vec<PathBuf> = extension_dirs
            .iter()
            .cloned()
            .chain(repo_extension_dirs)
            .collect();
        for dir in dirs {
            self.scan_dir(&dir);
        }
        self
    }

    fn scan_dir(&mut self, dir: &Path) {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Extension directory not present");
            return;
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.report.fail(dir.display().to_string(), e);
                return;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.join(MANIFEST_FILE).is_file())
            .collect();
        // read_dir order is platform dependent
        candidates.sort();

        for candidate in candidates {
            match CommandProvider::load(&candidate) {
                Ok(provider) => {
                    debug!(provider = %provider_label(&provider), dir = %candidate.display(), "Discovered provider");
                    self.pending.push(Pending::Ready {
                        provider: ProviderKind::Command(provider),
                        source: candidate.display().to_string(),
                    });
                }
                Err(e) => self.report.fail(candidate.display().to_string(), e),
            }
        }
    }

    /// Run factories and freeze the registry
    pub fn build(self) -> ProviderRegistry {
        let mut report = self.report;
        let mut providers: IndexMap<String, IndexMap<String, Arc<ProviderKind>>> = IndexMap::new();

        for pending in self.pending {
            let (provider, source) = match pending {
                Pending::Factory {
                    provider_type,
                    name,
                    factory,
                } => {
                    let source = format!("factory {}/{}", provider_type, name);
                    match factory() {
                        Ok(provider) => (provider, source),
                        Err(e) => {
                            report.fail(source, e);
                            continue;
                        }
                    }
                }
                Pending::Ready { provider, source } => (provider, source),
            };

            let provider_type = provider.provider_type().to_string();
            let name = provider.name().to_string();
            let by_name = providers.entry(provider_type.clone()).or_default();
            if by_name.contains_key(&name) {
                report.fail(
                    source,
                    format!("duplicate provider '{}' of type '{}'", name, provider_type),
                );
                continue;
            }
            by_name.insert(name.clone(), Arc::new(provider));
            report.loaded.push((provider_type, name));
        }

        debug!(
            providers = report.loaded.len(),
            failures = report.failures.len(),
            "Provider registry built"
        );
        ProviderRegistry { providers, report }
    }
}

fn provider_label(provider: &CommandProvider) -> String {
    format!("{}/{}", provider.provider_type(), provider.name())
}

/// Summary of one registered provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    pub provider_type: String,
    pub source: String,
    pub supported: Vec<String>,
    pub capabilities: Vec<String>,
    pub missing_tokens: Vec<String>,
}

/// Read-only index of provider instances
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<String, IndexMap<String, Arc<ProviderKind>>>,
    report: DiscoveryReport,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Pick the provider for a call
    ///
    /// An explicit name wins over the configured one; without either the
    /// first registered provider of the type is used.
    pub fn resolve(
        &self,
        provider_type: &str,
        explicit: Option<&str>,
        configured: Option<&str>,
    ) -> std::result::Result<Arc<ProviderKind>, RouterError> {
        let by_name = self.providers.get(provider_type);
        let selected = match explicit.or(configured) {
            Some(name) => by_name.and_then(|m| m.get(name)),
            None => by_name.and_then(|m| m.values().next()),
        };
        selected.cloned().ok_or_else(|| RouterError::ProviderNotFound {
            provider_type: provider_type.to_string(),
            name: explicit.or(configured).map(str::to_string),
        })
    }

    /// Check that `provider` declares `procedure` in its manifest
    pub fn assert_supports(
        &self,
        provider: &ProviderKind,
        procedure: &str,
    ) -> std::result::Result<(), RouterError> {
        if provider.manifest().supports(procedure) {
            Ok(())
        } else {
            Err(RouterError::UnsupportedProcedure {
                provider: provider.name().to_string(),
                procedure: procedure.to_string(),
                supported: provider.manifest().supported_procedures(),
            })
        }
    }

    /// All providers of a type, in registration order
    pub fn providers_of(&self, provider_type: &str) -> Vec<Arc<ProviderKind>> {
        self.providers
            .get(provider_type)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers
            .values()
            .flat_map(|m| m.values())
            .map(|p| ProviderInfo {
                name: p.name().to_string(),
                provider_type: p.provider_type().to_string(),
                source: p.source(),
                supported: p.manifest().supported_procedures(),
                capabilities: p.manifest().capabilities.clone(),
                missing_tokens: p.missing_tokens(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaemonError;
    use crate::providers::MockProvider;
    use serde_json::json;
    use workbench_sdk::ErrorKind;

    fn mock(provider_type: &str, name: &str) -> MockProvider {
        MockProvider::new(provider_type, name).with_tool("pr.list", json!([]))
    }

    fn write_manifest(dir: &Path, content: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    #[test]
    fn test_resolve_selection_order() -> anyhow::Result<()> {
        let registry = ProviderRegistry::builder()
            .register(mock("ci", "first"))
            .register(mock("ci", "second"))
            .register(mock("ci", "third"))
            .build();

        assert_eq!(registry.resolve("ci", None, None)?.name(), "first");
        assert_eq!(registry.resolve("ci", None, Some("second"))?.name(), "second");
        assert_eq!(registry.resolve("ci", Some("third"), Some("second"))?.name(), "third");
        Ok(())
    }

    #[test]
    fn test_resolve_not_found() {
        let registry = ProviderRegistry::builder().register(mock("ci", "mock")).build();

        let err = registry.resolve("issues", None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotFound);

        let err = registry.resolve("ci", None, Some("github")).unwrap_err();
        assert_eq!(err.to_string(), "Provider 'github' of type 'ci' not found");
    }

    #[test]
    fn test_assert_supports_lists_supported() -> anyhow::Result<()> {
        let registry = ProviderRegistry::builder().register(mock("ci", "mock")).build();
        let provider = registry.resolve("ci", None, None)?;

        registry.assert_supports(&provider, "pr.list")?;
        let err = registry.assert_supports(&provider, "run.list").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Provider 'mock' does not support 'run.list' (supported: pr.list)"
        );
        Ok(())
    }

    #[test]
    fn test_factories_run_in_order_and_failures_are_collected() {
        let registry = ProviderRegistry::builder()
            .register_factory("ci", "broken", || {
                Err(DaemonError::Config("missing token".into()))
            })
            .register_factory("ci", "mock", || Ok(mock("ci", "mock").into()))
            .register(mock("ci", "mock"))
            .build();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.report().loaded, vec![("ci".to_string(), "mock".to_string())]);
        let failures = &registry.report().failures;
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].source, "factory ci/broken");
        assert!(failures[1].error.contains("duplicate provider"));
    }

    #[test]
    fn test_discover_skips_broken_manifests() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let extensions = root.path().join("extensions");
        write_manifest(
            &extensions.join("a-good"),
            "name = \"good\"\ntype = \"issues\"\n[tools.\"issue.list\"]\ncommand = [\"cat\"]\n",
        )?;
        write_manifest(&extensions.join("b-broken"), "name = ")?;
        std::fs::create_dir_all(extensions.join("c-no-manifest"))?;

        let repo = root.path().join("repo");
        write_manifest(
            &repo.join(REPO_EXTENSION_DIR).join("linked"),
            "name = \"linked\"\ntype = \"ci\"\n",
        )?;

        let registry = ProviderRegistry::builder()
            .discover(
                &[extensions.clone(), root.path().join("missing")],
                &[repo],
            )
            .build();

        assert_eq!(
            registry.report().loaded,
            vec![
                ("issues".to_string(), "good".to_string()),
                ("ci".to_string(), "linked".to_string()),
            ]
        );
        assert_eq!(registry.report().failures.len(), 1);
        assert!(registry.report().failures[0].source.ends_with("b-broken"));
        assert_eq!(registry.providers_of("issues").len(), 1);
        Ok(())
    }

    #[test]
    fn test_list_describes_providers() {
        let registry = ProviderRegistry::builder()
            .register(mock("ci", "mock").with_capability("read"))
            .build();
        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].supported, vec!["pr.list"]);
        assert_eq!(list[0].capabilities, vec!["read"]);
        assert_eq!(list[0].source, "mock");
    }
}
