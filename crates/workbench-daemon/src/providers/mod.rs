//! Provider implementations and the registry that selects between them

pub mod command;
pub mod kind;
pub mod mock;
pub mod registry;

pub use command::{CommandManifest, CommandProvider, CommandSpec};
pub use kind::ProviderKind;
pub use mock::MockProvider;
pub use registry::{
    DiscoveryFailure, DiscoveryReport, ProviderFactory, ProviderInfo, ProviderRegistry,
    ProviderRegistryBuilder,
};
